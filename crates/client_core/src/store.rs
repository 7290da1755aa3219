use async_trait::async_trait;
use shared::{
    domain::{ItemId, List, ListId, ListItem, UserId},
    protocol::{AddListItemRequest, CreateListRequest, ReorderListItemsRequest, UpdateListRequest},
};

use crate::error::ControllerError;

/// Durable, authoritative copy of a list's items.
#[async_trait]
pub trait ListItemStore: Send + Sync {
    /// Items ordered by `sort_order` ascending.
    async fn list_items(&self, list_id: &ListId) -> Result<Vec<ListItem>, ControllerError>;

    async fn add_item(
        &self,
        list_id: &ListId,
        request: AddListItemRequest,
    ) -> Result<ListItem, ControllerError>;

    async fn remove_item(&self, list_id: &ListId, item_id: &ItemId)
        -> Result<(), ControllerError>;

    /// Applies every position in `request`. Partial application on failure is
    /// the store's concern.
    async fn update_positions(
        &self,
        list_id: &ListId,
        request: ReorderListItemsRequest,
    ) -> Result<(), ControllerError>;
}

/// Durable copy of one user's lists.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// User the store acts as; provisional lists are attributed to it.
    fn owner(&self) -> UserId;

    /// The owner's lists, most recently updated first.
    async fn fetch_lists(&self) -> Result<Vec<List>, ControllerError>;

    async fn create_list(&self, request: CreateListRequest) -> Result<List, ControllerError>;

    async fn update_list(
        &self,
        list_id: &ListId,
        request: UpdateListRequest,
    ) -> Result<List, ControllerError>;

    async fn delete_list(&self, list_id: &ListId) -> Result<(), ControllerError>;
}
