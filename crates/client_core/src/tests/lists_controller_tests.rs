use super::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration};
use shared::{domain::UserId, error::ErrorCode};
use tokio::sync::oneshot;

const OWNER: UserId = UserId(9);

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreCall {
    Fetch,
    Create(String),
    Update(ListId),
    Delete(ListId),
}

struct Pause {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// In-memory list store that can fail or hold its next call open.
#[derive(Default)]
struct FakeListStore {
    lists: Mutex<Vec<List>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_next: Mutex<Option<ControllerError>>,
    pause_next: Mutex<Option<Pause>>,
}

impl FakeListStore {
    fn with_lists(lists: Vec<List>) -> Arc<Self> {
        Arc::new(Self {
            lists: Mutex::new(lists),
            ..Self::default()
        })
    }

    async fn fail_next(&self, err: ControllerError) {
        *self.fail_next.lock().await = Some(err);
    }

    async fn pause_next(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.pause_next.lock().await = Some(Pause {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    async fn begin(&self, call: StoreCall) -> Result<(), ControllerError> {
        self.calls.lock().await.push(call);
        let pause = self.pause_next.lock().await.take();
        if let Some(pause) = pause {
            let _ = pause.entered.send(());
            let _ = pause.release.await;
        }
        match self.fail_next.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ListStore for FakeListStore {
    fn owner(&self) -> UserId {
        OWNER
    }

    async fn fetch_lists(&self) -> Result<Vec<List>, ControllerError> {
        self.begin(StoreCall::Fetch).await?;
        let mut lists = self.lists.lock().await.clone();
        lists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(lists)
    }

    async fn create_list(&self, request: CreateListRequest) -> Result<List, ControllerError> {
        self.begin(StoreCall::Create(request.name.clone())).await?;
        let now = Utc::now();
        let list = List {
            id: ListId::from(format!("stored-{}", request.name.to_lowercase())),
            user_id: OWNER,
            name: request.name,
            description: request.description,
            is_public: request.is_public,
            created_at: now,
            updated_at: now,
        };
        self.lists.lock().await.push(list.clone());
        Ok(list)
    }

    async fn update_list(
        &self,
        list_id: &ListId,
        request: UpdateListRequest,
    ) -> Result<List, ControllerError> {
        self.begin(StoreCall::Update(list_id.clone())).await?;
        let mut lists = self.lists.lock().await;
        let list = lists
            .iter_mut()
            .find(|l| &l.id == list_id)
            .ok_or_else(|| ControllerError::RemoteRejected {
                code: ErrorCode::NotFound,
                message: "List not found".into(),
            })?;
        if let Some(name) = request.name {
            list.name = name;
        }
        if let Some(description) = request.description {
            list.description = description;
        }
        if let Some(is_public) = request.is_public {
            list.is_public = is_public;
        }
        list.updated_at = Utc::now();
        Ok(list.clone())
    }

    async fn delete_list(&self, list_id: &ListId) -> Result<(), ControllerError> {
        self.begin(StoreCall::Delete(list_id.clone())).await?;
        self.lists.lock().await.retain(|l| &l.id != list_id);
        Ok(())
    }
}

fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

/// List last updated `minutes_ago` minutes before the base time.
fn list(id: &str, minutes_ago: i64) -> List {
    let at = base_time() - ChronoDuration::minutes(minutes_ago);
    List {
        id: ListId::from(id),
        user_id: OWNER,
        name: id.to_uppercase(),
        description: None,
        is_public: false,
        created_at: at,
        updated_at: at,
    }
}

async fn loaded_controller(lists: Vec<List>) -> (Arc<ListsController>, Arc<FakeListStore>) {
    let store = FakeListStore::with_lists(lists);
    let controller = Arc::new(ListsController::new(store.clone()));
    controller.load().await.expect("load");
    store.calls.lock().await.clear();
    (controller, store)
}

fn ids(snapshot: &ListsSnapshot) -> Vec<&str> {
    snapshot.lists.iter().map(|l| l.id.as_str()).collect()
}

fn forbidden() -> ControllerError {
    ControllerError::RemoteRejected {
        code: ErrorCode::Forbidden,
        message: "Forbidden".into(),
    }
}

fn rename(name: &str) -> UpdateListRequest {
    UpdateListRequest {
        name: Some(name.into()),
        description: None,
        is_public: None,
    }
}

#[tokio::test]
async fn load_orders_lists_most_recent_first() {
    let (controller, _store) = loaded_controller(vec![list("old", 30), list("new", 1)]).await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot), vec!["new", "old"]);
    assert!(!snapshot.is_loading && !snapshot.is_refreshing);
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn failed_refetch_keeps_lists_and_reports_error() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;
    store
        .fail_next(ControllerError::NetworkFailure("connection reset".into()))
        .await;

    controller.refetch(true).await.expect_err("refetch fails");
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot), vec!["a"]);
    assert!(!snapshot.is_refreshing);
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("connection reset")));
}

#[tokio::test]
async fn create_shows_provisional_list_first_then_stored_list() {
    let (controller, store) = loaded_controller(vec![list("a", 5)]).await;
    let (entered, release) = store.pause_next().await;

    let task = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .create_list(CreateListRequest {
                    name: "Horror".into(),
                    description: Some("October".into()),
                    is_public: true,
                })
                .await
        }
    });
    entered.await.expect("create started");

    let pending = controller.snapshot();
    assert_eq!(pending.lists.len(), 2);
    assert!(pending.lists[0].is_provisional());
    assert_eq!(pending.lists[0].name, "Horror");
    assert_eq!(pending.lists[0].user_id, OWNER);
    assert_eq!(pending.lists[1].id.as_str(), "a");

    release.send(()).expect("release");
    let created = task.await.expect("join").expect("create");
    assert_eq!(created.id.as_str(), "stored-horror");
    assert_eq!(ids(&controller.snapshot()), vec!["stored-horror", "a"]);
}

#[tokio::test]
async fn rejected_create_drops_provisional_list() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;
    store.fail_next(forbidden()).await;

    let err = controller
        .create_list(CreateListRequest {
            name: "Drama".into(),
            description: None,
            is_public: false,
        })
        .await
        .expect_err("rejected");
    assert_eq!(err, forbidden());

    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot), vec!["a"]);
    assert_eq!(snapshot.last_error.as_deref(), Some("Forbidden"));
}

#[tokio::test]
async fn invalid_create_changes_nothing_and_skips_store() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;

    let err = controller
        .create_list(CreateListRequest {
            name: " ".into(),
            description: None,
            is_public: false,
        })
        .await
        .expect_err("blank name");
    assert!(matches!(err, ControllerError::Validation(_)));
    assert_eq!(ids(&controller.snapshot()), vec!["a"]);
    assert!(controller.snapshot().last_error.is_some());
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn update_merges_locally_before_store_answers() {
    let (controller, store) = loaded_controller(vec![list("a", 0), list("b", 10)]).await;
    let (entered, release) = store.pause_next().await;

    let task = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .update_list(
                    &ListId::from("b"),
                    UpdateListRequest {
                        name: None,
                        description: Some(Some("weekend picks".into())),
                        is_public: Some(true),
                    },
                )
                .await
        }
    });
    entered.await.expect("update started");

    let pending = controller.snapshot();
    let merged = &pending.lists[1];
    assert_eq!(merged.name, "B");
    assert_eq!(merged.description.as_deref(), Some("weekend picks"));
    assert!(merged.is_public);
    assert!(merged.updated_at > list("b", 10).updated_at);

    release.send(()).expect("release");
    let stored = task.await.expect("join").expect("update");
    assert_eq!(controller.snapshot().lists[1], stored);
    assert_eq!(store.calls().await, vec![StoreCall::Update(ListId::from("b"))]);
}

#[tokio::test]
async fn rejected_update_restores_original_list() {
    let (controller, store) = loaded_controller(vec![list("a", 0), list("b", 10)]).await;
    let before = controller.snapshot().lists;
    store.fail_next(forbidden()).await;

    controller
        .update_list(&ListId::from("b"), rename("Renamed"))
        .await
        .expect_err("rejected");

    let after = controller.snapshot();
    assert_eq!(after.lists, before);
    assert_eq!(after.last_error.as_deref(), Some("Forbidden"));
}

#[tokio::test]
async fn update_of_unknown_list_fails_without_store_call() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;

    let err = controller
        .update_list(&ListId::from("ghost"), rename("Anything"))
        .await
        .expect_err("unknown");
    assert_eq!(err, ControllerError::NotFound("List not found".into()));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn remove_of_absent_list_fails_without_store_call() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;

    let err = controller
        .remove_list(&ListId::from("ghost"))
        .await
        .expect_err("absent");
    assert!(matches!(err, ControllerError::NotFound(_)));
    assert_eq!(ids(&controller.snapshot()), vec!["a"]);
    assert!(controller.snapshot().last_error.is_some());
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn remove_hides_list_while_delete_is_in_flight() {
    let (controller, store) = loaded_controller(vec![list("a", 0), list("b", 5)]).await;
    let (entered, release) = store.pause_next().await;

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.remove_list(&ListId::from("a")).await }
    });
    entered.await.expect("delete started");
    assert_eq!(ids(&controller.snapshot()), vec!["b"]);

    release.send(()).expect("release");
    task.await.expect("join").expect("remove");
    assert_eq!(ids(&controller.snapshot()), vec!["b"]);
    assert_eq!(store.calls().await, vec![StoreCall::Delete(ListId::from("a"))]);
}

#[tokio::test]
async fn rejected_remove_reinserts_by_most_recent_update() {
    let (controller, store) =
        loaded_controller(vec![list("a", 0), list("b", 5), list("c", 20)]).await;
    let before = controller.snapshot().lists;
    store.fail_next(forbidden()).await;

    controller
        .remove_list(&ListId::from("b"))
        .await
        .expect_err("rejected");

    let after = controller.snapshot();
    assert_eq!(after.lists, before);
    assert_eq!(ids(&after), vec!["a", "b", "c"]);
    assert!(after.last_error.is_some());
}

#[tokio::test]
async fn new_mutation_and_clear_error_reset_last_error() {
    let (controller, store) = loaded_controller(vec![list("a", 0), list("b", 5)]).await;
    store.fail_next(forbidden()).await;
    controller
        .remove_list(&ListId::from("a"))
        .await
        .expect_err("rejected");
    assert!(controller.snapshot().last_error.is_some());

    controller
        .update_list(&ListId::from("b"), rename("Better"))
        .await
        .expect("update");
    assert_eq!(controller.snapshot().last_error, None);

    store.fail_next(forbidden()).await;
    controller
        .update_list(&ListId::from("b"), rename("Worse"))
        .await
        .expect_err("rejected");
    let lists = controller.snapshot().lists;
    controller.clear_error();
    let cleared = controller.snapshot();
    assert_eq!(cleared.last_error, None);
    assert_eq!(cleared.lists, lists);
}

#[tokio::test]
async fn queued_create_waits_for_pending_remove() {
    let (controller, store) = loaded_controller(vec![list("a", 0)]).await;
    let (entered, release) = store.pause_next().await;

    let remove = tokio::spawn({
        let controller = controller.clone();
        async move { controller.remove_list(&ListId::from("a")).await }
    });
    entered.await.expect("delete in flight");

    let create = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .create_list(CreateListRequest {
                    name: "Queued".into(),
                    description: None,
                    is_public: false,
                })
                .await
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(store.calls().await.len(), 1, "create must wait for the gate");
    assert!(controller.snapshot().lists.is_empty());

    release.send(()).expect("release");
    remove.await.expect("join").expect("remove");
    create.await.expect("join").expect("create");
    assert_eq!(ids(&controller.snapshot()), vec!["stored-queued"]);
}
