use async_trait::async_trait;
use reqwest::Method;
use shared::{
    domain::{ItemId, ListId, ListItem},
    protocol::{
        AddListItemRequest, ListItemResponse, ListItemsResponse, ReorderListItemsRequest,
        SuccessResponse,
    },
};
use tracing::debug;

use crate::{
    error::ControllerError,
    store::ListItemStore,
    transport::{send_json, HttpTransport},
};

/// `ListItemStore` backed by the list server's `/lists/:id/items` routes.
#[derive(Clone)]
pub struct HttpListItemStore {
    transport: HttpTransport,
}

impl HttpListItemStore {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ListItemStore for HttpListItemStore {
    async fn list_items(&self, list_id: &ListId) -> Result<Vec<ListItem>, ControllerError> {
        let request = self
            .transport
            .request(Method::GET, &["lists", list_id.as_str(), "items"]);
        let response: ListItemsResponse = send_json(request).await?;
        Ok(response.items)
    }

    async fn add_item(
        &self,
        list_id: &ListId,
        request: AddListItemRequest,
    ) -> Result<ListItem, ControllerError> {
        debug!(%list_id, tmdb_id = request.tmdb_id, "POST list item");
        let request = self
            .transport
            .request(Method::POST, &["lists", list_id.as_str(), "items"])
            .json(&request);
        let response: ListItemResponse = send_json(request).await?;
        Ok(response.item)
    }

    async fn remove_item(&self, list_id: &ListId, item_id: &ItemId) -> Result<(), ControllerError> {
        let request = self.transport.request(
            Method::DELETE,
            &["lists", list_id.as_str(), "items", item_id.as_str()],
        );
        let _: SuccessResponse = send_json(request).await?;
        Ok(())
    }

    async fn update_positions(
        &self,
        list_id: &ListId,
        request: ReorderListItemsRequest,
    ) -> Result<(), ControllerError> {
        debug!(%list_id, positions = request.items.len(), "PUT list item positions");
        let request = self
            .transport
            .request(Method::PUT, &["lists", list_id.as_str(), "items"])
            .json(&request);
        let _: ListItemsResponse = send_json(request).await?;
        Ok(())
    }
}
