use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{ItemId, ListId, ListItem, MediaType},
    protocol::{AddListItemRequest, ReorderListItemsRequest},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::ControllerError,
    ordering::{move_item, renumber},
    store::ListItemStore,
};

/// Observable state of one list's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListItemsSnapshot {
    pub items: Vec<ListItem>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub last_error: Option<String>,
}

/// Optimistic controller for the items of a single list.
///
/// Every mutation is applied to the local snapshot before the store is
/// called, then either reconciled with the store's answer or rolled back.
/// Mutations and refetches run one at a time in call order; a queued call
/// sees the state its predecessor settled on.
pub struct ListItemsController {
    list_id: ListId,
    store: Arc<dyn ListItemStore>,
    state: watch::Sender<ListItemsSnapshot>,
    gate: Mutex<()>,
}

impl ListItemsController {
    pub fn new(list_id: ListId, store: Arc<dyn ListItemStore>) -> Self {
        let (state, _) = watch::channel(ListItemsSnapshot::default());
        Self {
            list_id,
            store,
            state,
            gate: Mutex::new(()),
        }
    }

    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    pub fn snapshot(&self) -> ListItemsSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListItemsSnapshot> {
        self.state.subscribe()
    }

    /// Initial load.
    pub async fn load(&self) -> Result<(), ControllerError> {
        self.refetch(false).await
    }

    /// Replaces the local items with the store's copy. `force_refresh` marks
    /// the fetch as an explicit refresh rather than a first load.
    pub async fn refetch(&self, force_refresh: bool) -> Result<(), ControllerError> {
        let _turn = self.gate.lock().await;

        self.state.send_modify(|state| {
            if force_refresh {
                state.is_refreshing = true;
            } else {
                state.is_loading = true;
            }
            state.last_error = None;
        });

        match self.store.list_items(&self.list_id).await {
            Ok(items) => {
                debug!(list_id = %self.list_id, item_count = items.len(), "list items fetched");
                self.state.send_modify(|state| {
                    state.items = items;
                    state.is_loading = false;
                    state.is_refreshing = false;
                });
                Ok(())
            }
            Err(err) => {
                warn!(list_id = %self.list_id, error = %err, "failed to fetch list items");
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.is_refreshing = false;
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Appends a provisional item, then swaps it for the store's durable item.
    pub async fn add_item(
        &self,
        tmdb_id: i64,
        media_type: MediaType,
        notes: Option<String>,
    ) -> Result<ListItem, ControllerError> {
        let request = AddListItemRequest {
            tmdb_id,
            media_type,
            notes,
        };
        if let Err(err) = request.validate() {
            return Err(self.record_error(ControllerError::Validation(err.message)));
        }

        let _turn = self.gate.lock().await;

        let provisional_id = ItemId::provisional();
        self.state.send_modify(|state| {
            let provisional = ListItem {
                id: provisional_id.clone(),
                list_id: self.list_id.clone(),
                tmdb_id: request.tmdb_id,
                media_type: request.media_type,
                notes: request.notes.clone(),
                sort_order: state.items.len() as u32,
                added_at: Utc::now(),
            };
            state.items.push(provisional);
        });

        match self.store.add_item(&self.list_id, request).await {
            Ok(item) => {
                info!(
                    list_id = %self.list_id,
                    item_id = %item.id,
                    sort_order = item.sort_order,
                    "list item added"
                );
                self.state.send_modify(|state| {
                    match state.items.iter().position(|i| i.id == provisional_id) {
                        Some(index) => state.items[index] = item.clone(),
                        None => state.items.push(item.clone()),
                    }
                });
                Ok(item)
            }
            Err(err) => {
                warn!(list_id = %self.list_id, tmdb_id, error = %err, "add rolled back");
                self.state.send_modify(|state| {
                    state.items.retain(|i| !i.is_provisional());
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Removes the item locally, then asks the store to delete it. Remaining
    /// items keep their `sort_order` until the next refetch.
    pub async fn remove_item(&self, item_id: &ItemId) -> Result<(), ControllerError> {
        let _turn = self.gate.lock().await;

        let mut removed = None;
        self.state.send_if_modified(|state| {
            let index = state.items.iter().position(|i| &i.id == item_id);
            removed = index.map(|index| (index, state.items.remove(index)));
            removed.is_some()
        });
        let Some((index, removed)) = removed else {
            return Err(self.record_error(ControllerError::NotFound(format!(
                "item {item_id} not found"
            ))));
        };

        match self.store.remove_item(&self.list_id, item_id).await {
            Ok(()) => {
                info!(list_id = %self.list_id, %item_id, "list item removed");
                Ok(())
            }
            Err(err) => {
                warn!(list_id = %self.list_id, %item_id, error = %err, "remove rolled back");
                // The gate held the rest of the list still, so the old slot is exact.
                self.state.send_modify(|state| {
                    let index = index.min(state.items.len());
                    state.items.insert(index, removed);
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Moves `active_id` into the slot held by `over_id` and renumbers every
    /// item. Moving an item onto itself does nothing.
    pub async fn reorder_items(
        &self,
        active_id: &ItemId,
        over_id: &ItemId,
    ) -> Result<(), ControllerError> {
        if active_id == over_id {
            return Ok(());
        }

        let _turn = self.gate.lock().await;

        let snapshot = self.state.borrow().items.clone();
        let from = snapshot.iter().position(|i| &i.id == active_id);
        let to = snapshot.iter().position(|i| &i.id == over_id);
        let (Some(from), Some(to)) = (from, to) else {
            return Err(self.record_error(ControllerError::NotFound("items not found".into())));
        };

        let mut reordered = snapshot.clone();
        move_item(&mut reordered, from, to);
        renumber(&mut reordered);
        let request = ReorderListItemsRequest::from_items(&reordered);
        self.state.send_modify(|state| state.items = reordered);

        match self.store.update_positions(&self.list_id, request).await {
            Ok(()) => {
                info!(list_id = %self.list_id, %active_id, from, to, "list items reordered");
                Ok(())
            }
            Err(err) => {
                warn!(list_id = %self.list_id, %active_id, error = %err, "reorder rolled back");
                self.state.send_modify(|state| {
                    state.items = snapshot;
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    pub fn clear_error(&self) {
        self.state
            .send_if_modified(|state| state.last_error.take().is_some());
    }

    fn record_error(&self, err: ControllerError) -> ControllerError {
        debug!(list_id = %self.list_id, error = %err, "precondition failed");
        self.state
            .send_modify(|state| state.last_error = Some(err.to_string()));
        err
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
