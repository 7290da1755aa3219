use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use server_api::ApiContext;
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod rate_limit;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use rate_limit::RateLimitConfig;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let rate_limit = RateLimitConfig {
        max_requests: settings.rate_limit_max_requests,
        window: settings.rate_limit_window(),
    };
    let state = Arc::new(AppState::new(ApiContext { storage }, rate_limit));
    spawn_rate_limit_pruner(state.clone());
    let app = build_router(state);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        max_requests = rate_limit.max_requests,
        window_secs = rate_limit.window.as_secs(),
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_rate_limit_pruner(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.rate_limit.window);
        loop {
            ticker.tick().await;
            let pruned = state.limiter.prune(&state.rate_limit, Instant::now()).await;
            if pruned > 0 {
                debug!(pruned, "idle rate limit buckets dropped");
            }
        }
    });
}

fn build_router(state: Arc<AppState>) -> Router {
    let lists = Router::new()
        .route("/lists", get(api::http_list_lists).post(api::http_create_list))
        .route(
            "/lists/:list_id",
            get(api::http_get_list)
                .put(api::http_update_list)
                .delete(api::http_delete_list),
        )
        .route(
            "/lists/:list_id/items",
            get(api::http_list_items)
                .post(api::http_add_item)
                .put(api::http_reorder_items),
        )
        .route("/lists/:list_id/items/:item_id", delete(api::http_remove_item))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::enforce_rate_limit,
        ));

    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/login", post(api::http_login))
        .merge(lists)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
