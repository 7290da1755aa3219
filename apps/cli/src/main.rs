use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ListItemsController, ListItemsSnapshot, ListsClient, ListsController};
use shared::{
    domain::{ItemId, ListId, MediaType, UserId},
    protocol::{CreateListRequest, UpdateListRequest},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "watchlist", about = "Manage movie and TV watchlists")]
struct Cli {
    #[arg(long, env = "WATCHLIST_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long, env = "WATCHLIST_USER_ID")]
    user_id: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers the username if needed and prints its user id.
    Login { username: String },
    Lists,
    CreateList {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        public: bool,
    },
    UpdateList {
        list_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        public: Option<bool>,
    },
    DeleteList { list_id: String },
    Items { list_id: String },
    Add {
        list_id: String,
        tmdb_id: i64,
        #[arg(long, value_parser = parse_media_type, default_value = "movie")]
        media_type: MediaType,
        #[arg(long)]
        notes: Option<String>,
    },
    Remove { list_id: String, item_id: String },
    /// Moves an item into the position currently held by another.
    Move {
        list_id: String,
        active_id: String,
        over_id: String,
    },
}

fn parse_media_type(raw: &str) -> Result<MediaType, String> {
    MediaType::parse(raw).ok_or_else(|| format!("expected 'movie' or 'tv', got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let cli = Cli::parse();

    if let Command::Login { username } = &cli.command {
        let client = ListsClient::login(&cli.server_url, username).await?;
        println!("user_id={}", client.user_id().0);
        return Ok(());
    }

    let user_id = cli
        .user_id
        .map(UserId)
        .context("--user-id or WATCHLIST_USER_ID is required")?;
    let client = ListsClient::new(&cli.server_url, user_id)?;
    info!(server_url = %cli.server_url, user_id = user_id.0, "client ready");

    match cli.command {
        Command::Login { .. } => {}
        Command::Lists => {
            let controller = load_lists_controller(&client).await?;
            print_json(&controller.snapshot().lists)?;
        }
        Command::CreateList {
            name,
            description,
            public,
        } => {
            let list = load_lists_controller(&client)
                .await?
                .create_list(CreateListRequest {
                    name,
                    description,
                    is_public: public,
                })
                .await?;
            print_json(&list)?;
        }
        Command::UpdateList {
            list_id,
            name,
            description,
            clear_description,
            public,
        } => {
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let list = load_lists_controller(&client)
                .await?
                .update_list(
                    &ListId(list_id),
                    UpdateListRequest {
                        name,
                        description,
                        is_public: public,
                    },
                )
                .await?;
            print_json(&list)?;
        }
        Command::DeleteList { list_id } => {
            load_lists_controller(&client)
                .await?
                .remove_list(&ListId(list_id.clone()))
                .await?;
            println!("deleted list {list_id}");
        }
        Command::Items { list_id } => {
            let controller = load_controller(&client, list_id).await?;
            print_items(&controller.snapshot());
        }
        Command::Add {
            list_id,
            tmdb_id,
            media_type,
            notes,
        } => {
            let controller = load_controller(&client, list_id).await?;
            let item = controller.add_item(tmdb_id, media_type, notes).await?;
            println!("added {} as {}", item.tmdb_id, item.id);
            print_items(&controller.snapshot());
        }
        Command::Remove { list_id, item_id } => {
            let controller = load_controller(&client, list_id).await?;
            controller.remove_item(&ItemId(item_id)).await?;
            print_items(&controller.snapshot());
        }
        Command::Move {
            list_id,
            active_id,
            over_id,
        } => {
            let controller = load_controller(&client, list_id).await?;
            controller
                .reorder_items(&ItemId(active_id), &ItemId(over_id))
                .await?;
            print_items(&controller.snapshot());
        }
    }

    Ok(())
}

async fn load_lists_controller(client: &ListsClient) -> Result<ListsController> {
    let controller = ListsController::new(Arc::new(client.clone()));
    controller.load().await?;
    Ok(controller)
}

async fn load_controller(client: &ListsClient, list_id: String) -> Result<ListItemsController> {
    let controller = ListItemsController::new(ListId(list_id), Arc::new(client.items_store()));
    controller.load().await?;
    Ok(controller)
}

fn print_items(snapshot: &ListItemsSnapshot) {
    if snapshot.items.is_empty() {
        println!("(empty)");
    }
    for item in &snapshot.items {
        let notes = item.notes.as_deref().unwrap_or("");
        println!(
            "{:>3}  {:<36}  {:<5} {:>8}  {notes}",
            item.sort_order,
            item.id.as_str(),
            item.media_type.as_str(),
            item.tmdb_id
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
