use shared::{
    domain::{ItemId, List, ListId, ListItem, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        AddListItemRequest, CreateListRequest, LoginRequest, ReorderListItemsRequest,
        UpdateListRequest,
    },
};
use storage::{InsertItemOutcome, ListPatch, PositionUpdateOutcome, Storage};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn login(ctx: &ApiContext, req: &LoginRequest) -> Result<UserId, ApiError> {
    req.validate()?;
    ctx.storage
        .create_user(req.username.trim())
        .await
        .map_err(internal)
}

pub async fn list_lists(ctx: &ApiContext, user_id: UserId) -> Result<Vec<List>, ApiError> {
    ctx.storage
        .list_lists_for_user(user_id)
        .await
        .map_err(internal)
}

pub async fn create_list(
    ctx: &ApiContext,
    user_id: UserId,
    req: CreateListRequest,
) -> Result<List, ApiError> {
    req.validate()?;
    let description = normalize_optional_text(req.description);
    let list = ctx
        .storage
        .create_list(
            user_id,
            req.name.trim(),
            description.as_deref(),
            req.is_public,
        )
        .await
        .map_err(internal)?;
    info!(list_id = %list.id, user_id = user_id.0, "list created");
    Ok(list)
}

/// Returns the list when the caller owns it or it is public.
pub async fn get_list(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
) -> Result<List, ApiError> {
    let list = load_list(ctx, list_id).await?;
    if list.user_id != user_id && !list.is_public {
        return Err(ApiError::new(ErrorCode::NotFound, "List not found"));
    }
    Ok(list)
}

pub async fn update_list(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
    req: UpdateListRequest,
) -> Result<List, ApiError> {
    req.validate()?;
    let patch = ListPatch {
        name: req.name.map(|name| name.trim().to_string()),
        description: req.description.map(normalize_optional_text),
        is_public: req.is_public,
    };
    ctx.storage
        .update_list(list_id, user_id, patch)
        .await
        .map_err(internal)?
        .ok_or_else(list_access_denied)
}

pub async fn delete_list(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_list(list_id, user_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(list_access_denied());
    }
    info!(%list_id, user_id = user_id.0, "list deleted");
    Ok(())
}

/// Items of a list ordered by `sort_order`. Private lists are readable only by
/// their owner; `viewer` is `None` for anonymous callers.
pub async fn list_items(
    ctx: &ApiContext,
    viewer: Option<UserId>,
    list_id: &ListId,
) -> Result<Vec<ListItem>, ApiError> {
    let list = load_list(ctx, list_id).await?;
    if !list.is_public && viewer != Some(list.user_id) {
        return Err(ApiError::new(ErrorCode::Unauthorized, "Unauthorized"));
    }
    ctx.storage.list_items(list_id).await.map_err(internal)
}

pub async fn add_item(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
    req: AddListItemRequest,
) -> Result<ListItem, ApiError> {
    ensure_owned_list(ctx, user_id, list_id).await?;
    req.validate()?;

    let existing = ctx
        .storage
        .find_item(list_id, req.tmdb_id, req.media_type)
        .await
        .map_err(internal)?;
    if existing.is_some() {
        return Err(duplicate_item());
    }

    let notes = normalize_optional_text(req.notes);
    let outcome = ctx
        .storage
        .insert_item(list_id, req.tmdb_id, req.media_type, notes.as_deref())
        .await
        .map_err(internal)?;
    match outcome {
        InsertItemOutcome::Inserted(item) => {
            info!(
                %list_id,
                item_id = %item.id,
                tmdb_id = item.tmdb_id,
                media_type = %item.media_type,
                sort_order = item.sort_order,
                "list item added"
            );
            Ok(item)
        }
        InsertItemOutcome::Duplicate => Err(duplicate_item()),
    }
}

/// Applies every position in `req` and returns the list re-read in its new
/// order.
pub async fn reorder_items(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
    req: ReorderListItemsRequest,
) -> Result<Vec<ListItem>, ApiError> {
    ensure_owned_list(ctx, user_id, list_id).await?;
    req.validate()?;

    let positions: Vec<(ItemId, u32)> = req
        .items
        .into_iter()
        .map(|position| (position.id, position.sort_order))
        .collect();
    let outcome = ctx
        .storage
        .update_positions(list_id, &positions)
        .await
        .map_err(internal)?;
    if let PositionUpdateOutcome::UnknownItem(item_id) = outcome {
        warn!(%list_id, %item_id, "reorder referenced an item outside the list");
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("Item {item_id} not found in list"),
        ));
    }

    let items = ctx.storage.list_items(list_id).await.map_err(internal)?;
    info!(%list_id, item_count = items.len(), "list items reordered");
    Ok(items)
}

pub async fn remove_item(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
    item_id: &ItemId,
) -> Result<(), ApiError> {
    ensure_owned_list(ctx, user_id, list_id).await?;
    let removed = ctx
        .storage
        .delete_item(list_id, item_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::new(ErrorCode::NotFound, "Item not found"));
    }
    info!(%list_id, %item_id, "list item removed");
    Ok(())
}

async fn load_list(ctx: &ApiContext, list_id: &ListId) -> Result<List, ApiError> {
    ctx.storage
        .get_list(list_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "List not found"))
}

async fn ensure_owned_list(
    ctx: &ApiContext,
    user_id: UserId,
    list_id: &ListId,
) -> Result<List, ApiError> {
    let list = ctx
        .storage
        .get_list(list_id)
        .await
        .map_err(internal)?
        .ok_or_else(list_access_denied)?;
    if list.user_id != user_id {
        return Err(list_access_denied());
    }
    Ok(list)
}

fn normalize_optional_text(text: Option<String>) -> Option<String> {
    text.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn list_access_denied() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "List not found or access denied")
}

fn duplicate_item() -> ApiError {
    ApiError::new(ErrorCode::Conflict, "Item already exists in this list")
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
