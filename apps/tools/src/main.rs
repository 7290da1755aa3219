use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::{ListId, UserId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/watchlist.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
    },
    CreateList {
        owner_user_id: i64,
        name: String,
        #[arg(long)]
        public: bool,
    },
    DumpItems {
        list_id: String,
    },
    /// Rewrites a list's positions to 0..n in their current order.
    Renumber {
        list_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username } => {
            let user_id = storage.create_user(username.trim()).await?;
            println!("user_id={}", user_id.0);
        }
        Command::CreateList {
            owner_user_id,
            name,
            public,
        } => {
            let list = storage
                .create_list(UserId(owner_user_id), name.trim(), None, public)
                .await?;
            println!("created list_id={}", list.id);
        }
        Command::DumpItems { list_id } => {
            let list_id = ListId(list_id);
            if storage.get_list(&list_id).await?.is_none() {
                bail!("list {list_id} does not exist");
            }
            for item in storage.list_items(&list_id).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    item.sort_order, item.id, item.media_type, item.tmdb_id
                );
            }
        }
        Command::Renumber { list_id } => {
            let updated = storage.renumber_items(&ListId(list_id.clone())).await?;
            println!("renumbered {updated} items in list {list_id}");
        }
    }

    Ok(())
}
