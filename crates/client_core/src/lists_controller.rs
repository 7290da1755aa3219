use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{List, ListId},
    protocol::{CreateListRequest, UpdateListRequest},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{error::ControllerError, store::ListStore};

/// Observable state of the signed-in user's lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListsSnapshot {
    pub lists: Vec<List>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub last_error: Option<String>,
}

/// Optimistic controller for the lists owned by one user.
///
/// Works like [`crate::ListItemsController`]: each mutation shows up locally
/// first and is reconciled or rolled back once the store answers, one call
/// at a time. Each mutation clears the previous `last_error` when it starts.
pub struct ListsController {
    store: Arc<dyn ListStore>,
    state: watch::Sender<ListsSnapshot>,
    gate: Mutex<()>,
}

impl ListsController {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        let (state, _) = watch::channel(ListsSnapshot::default());
        Self {
            store,
            state,
            gate: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> ListsSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListsSnapshot> {
        self.state.subscribe()
    }

    pub async fn load(&self) -> Result<(), ControllerError> {
        self.refetch(false).await
    }

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

        match self.store.fetch_lists().await {
            Ok(lists) => {
                debug!(list_count = lists.len(), "lists fetched");
                self.state.send_modify(|state| {
                    state.lists = lists;
                    state.is_loading = false;
                    state.is_refreshing = false;
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch lists");
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.is_refreshing = false;
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Puts a provisional list at the front, then swaps in the stored list.
    pub async fn create_list(&self, request: CreateListRequest) -> Result<List, ControllerError> {
        if let Err(err) = request.validate() {
            return Err(self.record_error(ControllerError::Validation(err.message)));
        }

        let _turn = self.gate.lock().await;

        let now = Utc::now();
        let provisional = List {
            id: ListId::provisional(),
            user_id: self.store.owner(),
            name: request.name.clone(),
            description: request.description.clone(),
            is_public: request.is_public,
            created_at: now,
            updated_at: now,
        };
        let provisional_id = provisional.id.clone();
        self.state.send_modify(|state| {
            state.lists.insert(0, provisional);
            state.last_error = None;
        });

        match self.store.create_list(request).await {
            Ok(list) => {
                info!(list_id = %list.id, name = %list.name, "list created");
                self.state.send_modify(|state| {
                    match state.lists.iter().position(|l| l.id == provisional_id) {
                        Some(index) => state.lists[index] = list.clone(),
                        None => state.lists.insert(0, list.clone()),
                    }
                });
                Ok(list)
            }
            Err(err) => {
                warn!(error = %err, "create list rolled back");
                self.state.send_modify(|state| {
                    state.lists.retain(|l| !l.is_provisional());
                    state.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Merges `request` into the local list, then takes the stored version.
    pub async fn update_list(
        &self,
        list_id: &ListId,
        request: UpdateListRequest,
    ) -> Result<List, ControllerError> {
        if let Err(err) = request.validate() {
            return Err(self.record_error(ControllerError::Validation(err.message)));
        }

        let _turn = self.gate.lock().await;

        let original = self
            .state
            .borrow()
            .lists
            .iter()
            .find(|l| &l.id == list_id)
            .cloned();
        let Some(original) = original else {
            return Err(self.record_error(ControllerError::NotFound("List not found".into())));
        };

        let mut merged = original.clone();
        if let Some(name) = &request.name {
            merged.name = name.clone();
        }
        if let Some(description) = &request.description {
            merged.description = description.clone();
        }
        if let Some(is_public) = request.is_public {
            merged.is_public = is_public;
        }
        merged.updated_at = Utc::now();
        self.replace(list_id, merged, None);

        match self.store.update_list(list_id, request).await {
            Ok(list) => {
                info!(%list_id, "list updated");
                self.replace(list_id, list.clone(), None);
                Ok(list)
            }
            Err(err) => {
                warn!(%list_id, error = %err, "update list rolled back");
                self.replace(list_id, original, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Drops the list locally, then deletes it from the store.
    pub async fn remove_list(&self, list_id: &ListId) -> Result<(), ControllerError> {
        let _turn = self.gate.lock().await;

        let mut removed = None;
        self.state.send_if_modified(|state| {
            let index = state.lists.iter().position(|l| &l.id == list_id);
            removed = index.map(|index| state.lists.remove(index));
            if removed.is_some() {
                state.last_error = None;
            }
            removed.is_some()
        });
        let Some(removed) = removed else {
            return Err(self.record_error(ControllerError::NotFound("List not found".into())));
        };

        match self.store.delete_list(list_id).await {
            Ok(()) => {
                info!(%list_id, "list deleted");
                Ok(())
            }
            Err(err) => {
                warn!(%list_id, error = %err, "delete list rolled back");
                self.state.send_modify(|state| {
                    state.lists.push(removed);
                    state
                        .lists
                        .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
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

    fn replace(&self, list_id: &ListId, list: List, error: Option<String>) {
        self.state.send_modify(|state| {
            if let Some(slot) = state.lists.iter_mut().find(|l| &l.id == list_id) {
                *slot = list;
            }
            state.last_error = error;
        });
    }

    fn record_error(&self, err: ControllerError) -> ControllerError {
        debug!(error = %err, "precondition failed");
        self.state
            .send_modify(|state| state.last_error = Some(err.to_string()));
        err
    }
}

#[cfg(test)]
#[path = "tests/lists_controller_tests.rs"]
mod tests;
