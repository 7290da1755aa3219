use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared::{
    domain::{ItemId, ListId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        AddListItemRequest, CreateListRequest, ListItemResponse, ListItemsResponse,
        ListResponse, ListsResponse, LoginRequest, LoginResponse, MessageResponse,
        ReorderListItemsRequest, SuccessResponse, UpdateListRequest,
    },
};
use tracing::{error, warn};

use crate::app_state::AppState;

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ViewerQuery {
    user_id: Option<i64>,
}

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    if err.code == ErrorCode::Internal {
        error!(message = %err.message, "request failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::Internal, "Internal server error")),
        );
    }
    (status_for(err.code), Json(err))
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| reject(ApiError::new(ErrorCode::Validation, rejection.body_text())))
}

fn acting_user(query: Result<Query<UserQuery>, QueryRejection>) -> ApiResult<UserId> {
    query
        .map(|Query(q)| UserId(q.user_id))
        .map_err(|_| reject(ApiError::new(ErrorCode::Unauthorized, "Unauthorized")))
}

/// Per-user request budget for the `/lists` routes; anonymous readers share
/// one bucket.
pub(crate) async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let viewer = Query::<ViewerQuery>::try_from_uri(request.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();
    let key = match viewer.user_id {
        Some(user_id) => format!("user:{user_id}"),
        None => "anonymous".to_string(),
    };

    if !state.limiter.allow(&key, &state.rate_limit).await {
        warn!(%key, path = %request.uri().path(), "rate limit exceeded");
        return reject(ApiError::new(
            ErrorCode::RateLimited,
            "Too many requests, slow down",
        ))
        .into_response();
    }

    next.run(request).await
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

pub(crate) async fn http_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let req = parse_json(payload)?;
    let user_id = server_api::login(&state.api, &req).await.map_err(reject)?;
    Ok(Json(LoginResponse { user_id: user_id.0 }))
}

pub(crate) async fn http_list_lists(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<ListsResponse>> {
    let user_id = acting_user(query)?;
    let lists = server_api::list_lists(&state.api, user_id)
        .await
        .map_err(reject)?;
    Ok(Json(ListsResponse { lists }))
}

pub(crate) async fn http_create_list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<CreateListRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ListResponse>)> {
    let user_id = acting_user(query)?;
    let req = parse_json(payload)?;
    let list = server_api::create_list(&state.api, user_id, req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(ListResponse { list })))
}

pub(crate) async fn http_get_list(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let user_id = acting_user(query)?;
    let list = server_api::get_list(&state.api, user_id, &ListId(list_id))
        .await
        .map_err(reject)?;
    Ok(Json(ListResponse { list }))
}

pub(crate) async fn http_update_list(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<UpdateListRequest>, JsonRejection>,
) -> ApiResult<Json<ListResponse>> {
    let user_id = acting_user(query)?;
    let req = parse_json(payload)?;
    let list = server_api::update_list(&state.api, user_id, &ListId(list_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(ListResponse { list }))
}

pub(crate) async fn http_delete_list(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = acting_user(query)?;
    server_api::delete_list(&state.api, user_id, &ListId(list_id))
        .await
        .map_err(reject)?;
    Ok(Json(MessageResponse {
        message: "List deleted successfully".into(),
    }))
}

pub(crate) async fn http_list_items(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<ViewerQuery>, QueryRejection>,
) -> ApiResult<Json<ListItemsResponse>> {
    let viewer = query
        .map(|Query(q)| q.user_id.map(UserId))
        .map_err(|_| reject(ApiError::new(ErrorCode::Unauthorized, "Unauthorized")))?;
    let items = server_api::list_items(&state.api, viewer, &ListId(list_id))
        .await
        .map_err(reject)?;
    Ok(Json(ListItemsResponse { items }))
}

pub(crate) async fn http_add_item(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<AddListItemRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ListItemResponse>)> {
    let user_id = acting_user(query)?;
    let req = parse_json(payload)?;
    let item = server_api::add_item(&state.api, user_id, &ListId(list_id), req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(ListItemResponse { item })))
}

pub(crate) async fn http_reorder_items(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<ReorderListItemsRequest>, JsonRejection>,
) -> ApiResult<Json<ListItemsResponse>> {
    let user_id = acting_user(query)?;
    let req = parse_json(payload)?;
    let items = server_api::reorder_items(&state.api, user_id, &ListId(list_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(ListItemsResponse { items }))
}

pub(crate) async fn http_remove_item(
    State(state): State<Arc<AppState>>,
    Path((list_id, item_id)): Path<(String, String)>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let user_id = acting_user(query)?;
    server_api::remove_item(&state.api, user_id, &ListId(list_id), &ItemId(item_id))
        .await
        .map_err(reject)?;
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
