use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{ItemId, List, ListId, ListItem, MediaType, UserId};

const LIST_COLUMNS: &str = "id, user_id, name, description, is_public, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, list_id, tmdb_id, media_type, notes, sort_order, added_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Field changes for [`Storage::update_list`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ListPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertItemOutcome {
    Inserted(ListItem),
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionUpdateOutcome {
    Applied,
    UnknownItem(ItemId),
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `sqlite::memory:` is a separate database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn create_list(
        &self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
        is_public: bool,
    ) -> Result<List> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO lists (id, user_id, name, description, is_public, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(ListId::generate().0)
        .bind(owner.0)
        .bind(name)
        .bind(description)
        .bind(is_public)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert list")?;
        list_from_row(&row)
    }

    pub async fn list_lists_for_user(&self, owner: UserId) -> Result<Vec<List>> {
        let rows = sqlx::query(&format!(
            "SELECT {LIST_COLUMNS} FROM lists WHERE user_id = ? ORDER BY updated_at DESC, id ASC"
        ))
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(list_from_row).collect()
    }

    pub async fn get_list(&self, list_id: &ListId) -> Result<Option<List>> {
        let row = sqlx::query(&format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?"))
            .bind(list_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(list_from_row).transpose()
    }

    /// Applies `patch` when `owner` owns the list. Returns `None` otherwise.
    pub async fn update_list(
        &self,
        list_id: &ListId,
        owner: UserId,
        patch: ListPatch,
    ) -> Result<Option<List>> {
        let Some(current) = self.get_list(list_id).await? else {
            return Ok(None);
        };
        if current.user_id != owner {
            return Ok(None);
        }

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let is_public = patch.is_public.unwrap_or(current.is_public);

        let row = sqlx::query(&format!(
            "UPDATE lists SET name = ?, description = ?, is_public = ?, updated_at = ?
             WHERE id = ? AND user_id = ?
             RETURNING {LIST_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(is_public)
        .bind(Utc::now())
        .bind(list_id.as_str())
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(list_from_row).transpose()
    }

    /// Deletes the list and its items. Returns `false` when nothing owned by
    /// `owner` matched.
    pub async fn delete_list(&self, list_id: &ListId, owner: UserId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let owned = sqlx::query("SELECT 1 FROM lists WHERE id = ? AND user_id = ?")
            .bind(list_id.as_str())
            .bind(owner.0)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !owned {
            return Ok(false);
        }

        let removed_items = sqlx::query("DELETE FROM list_items WHERE list_id = ?")
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await
            .context("failed to delete list items")?
            .rows_affected();
        sqlx::query("DELETE FROM lists WHERE id = ? AND user_id = ?")
            .bind(list_id.as_str())
            .bind(owner.0)
            .execute(&mut *tx)
            .await
            .context("failed to delete list")?;
        tx.commit().await?;

        debug!(%list_id, removed_items, "list deleted");
        Ok(true)
    }

    pub async fn list_items(&self, list_id: &ListId) -> Result<Vec<ListItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM list_items
             WHERE list_id = ?
             ORDER BY sort_order ASC, added_at ASC"
        ))
        .bind(list_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    pub async fn find_item(
        &self,
        list_id: &ListId,
        tmdb_id: i64,
        media_type: MediaType,
    ) -> Result<Option<ListItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM list_items
             WHERE list_id = ? AND tmdb_id = ? AND media_type = ?"
        ))
        .bind(list_id.as_str())
        .bind(tmdb_id)
        .bind(media_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    /// Appends an item after the current highest `sort_order` and bumps the
    /// list's `updated_at`.
    pub async fn insert_item(
        &self,
        list_id: &ListId,
        tmdb_id: i64,
        media_type: MediaType,
        notes: Option<&str>,
    ) -> Result<InsertItemOutcome> {
        let mut tx = self.pool.begin().await?;
        let next_sort_order: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM list_items WHERE list_id = ?",
        )
        .bind(list_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "INSERT INTO list_items (id, list_id, tmdb_id, media_type, notes, sort_order, added_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(list_id, tmdb_id, media_type) DO NOTHING
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(ItemId::generate().0)
        .bind(list_id.as_str())
        .bind(tmdb_id)
        .bind(media_type.as_str())
        .bind(notes)
        .bind(next_sort_order)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .context("failed to insert list item")?;

        let Some(row) = row else {
            return Ok(InsertItemOutcome::Duplicate);
        };
        let item = item_from_row(&row)?;
        touch_list(&mut *tx, list_id).await?;
        tx.commit().await?;
        Ok(InsertItemOutcome::Inserted(item))
    }

    /// Removes an item and closes the gap it leaves in the ordering.
    pub async fn delete_item(&self, list_id: &ListId, item_id: &ItemId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM list_items WHERE id = ? AND list_id = ?")
            .bind(item_id.as_str())
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await
            .context("failed to delete list item")?
            .rows_affected();
        if removed == 0 {
            return Ok(false);
        }

        reindex_items(&mut *tx, list_id).await?;
        touch_list(&mut *tx, list_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Applies every position in a single transaction. Nothing is written when
    /// any id does not belong to the list.
    pub async fn update_positions(
        &self,
        list_id: &ListId,
        positions: &[(ItemId, u32)],
    ) -> Result<PositionUpdateOutcome> {
        let mut tx = self.pool.begin().await?;
        for (item_id, sort_order) in positions {
            let updated = sqlx::query(
                "UPDATE list_items SET sort_order = ? WHERE id = ? AND list_id = ?",
            )
            .bind(i64::from(*sort_order))
            .bind(item_id.as_str())
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to update sort order of item {item_id}"))?
            .rows_affected();
            if updated == 0 {
                tx.rollback().await?;
                return Ok(PositionUpdateOutcome::UnknownItem(item_id.clone()));
            }
        }
        touch_list(&mut *tx, list_id).await?;
        tx.commit().await?;
        Ok(PositionUpdateOutcome::Applied)
    }

    /// Rewrites `sort_order` as `0..n` keeping the current relative order.
    pub async fn renumber_items(&self, list_id: &ListId) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let count = reindex_items(&mut *tx, list_id).await?;
        touch_list(&mut *tx, list_id).await?;
        tx.commit().await?;
        Ok(count)
    }
}

async fn touch_list(conn: &mut SqliteConnection, list_id: &ListId) -> Result<()> {
    sqlx::query("UPDATE lists SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(list_id.as_str())
        .execute(&mut *conn)
        .await
        .context("failed to bump list updated_at")?;
    Ok(())
}

async fn reindex_items(conn: &mut SqliteConnection, list_id: &ListId) -> Result<usize> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM list_items WHERE list_id = ? ORDER BY sort_order ASC, added_at ASC",
    )
    .bind(list_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE list_items SET sort_order = ? WHERE id = ?")
            .bind(position as i64)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(ids.len())
}

fn list_from_row(row: &SqliteRow) -> Result<List> {
    Ok(List {
        id: ListId(row.try_get::<String, _>("id")?),
        user_id: UserId(row.try_get::<i64, _>("user_id")?),
        name: row.try_get::<String, _>("name")?,
        description: row.try_get::<Option<String>, _>("description")?,
        is_public: row.try_get::<bool, _>("is_public")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<ListItem> {
    let raw_media_type = row.try_get::<String, _>("media_type")?;
    let media_type = MediaType::parse(&raw_media_type)
        .ok_or_else(|| anyhow!("unknown media type '{raw_media_type}' in list_items"))?;
    let raw_sort_order = row.try_get::<i64, _>("sort_order")?;
    let sort_order = u32::try_from(raw_sort_order)
        .with_context(|| format!("sort_order {raw_sort_order} out of range"))?;

    Ok(ListItem {
        id: ItemId(row.try_get::<String, _>("id")?),
        list_id: ListId(row.try_get::<String, _>("list_id")?),
        tmdb_id: row.try_get::<i64, _>("tmdb_id")?,
        media_type,
        notes: row.try_get::<Option<String>, _>("notes")?,
        sort_order,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
    })
}

/// Creates the directory holding a file-backed SQLite database. In-memory and
/// non-SQLite urls are left alone.
pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
