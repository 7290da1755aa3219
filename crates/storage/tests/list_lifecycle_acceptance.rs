use shared::domain::{ItemId, ListItem, MediaType};
use storage::{InsertItemOutcome, PositionUpdateOutcome, Storage};

fn ids(items: &[ListItem]) -> Vec<ItemId> {
    items.iter().map(|item| item.id.clone()).collect()
}

#[tokio::test]
async fn add_reorder_remove_keeps_positions_dense_acceptance() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = storage.create_user("acceptance-owner").await.expect("user");
    let list = storage
        .create_list(owner, "Acceptance", None, false)
        .await
        .expect("list");

    let mut added = Vec::new();
    for (tmdb_id, media_type) in [(550, MediaType::Movie), (1399, MediaType::Tv), (603, MediaType::Movie)] {
        match storage
            .insert_item(&list.id, tmdb_id, media_type, None)
            .await
            .expect("insert")
        {
            InsertItemOutcome::Inserted(item) => added.push(item),
            InsertItemOutcome::Duplicate => panic!("fresh list cannot hold duplicates"),
        }
    }

    // Move the first item to the end: [B, C, A].
    let reordered = [
        (added[1].id.clone(), 0),
        (added[2].id.clone(), 1),
        (added[0].id.clone(), 2),
    ];
    let outcome = storage
        .update_positions(&list.id, &reordered)
        .await
        .expect("reorder");
    assert_eq!(outcome, PositionUpdateOutcome::Applied);
    let items = storage.list_items(&list.id).await.expect("items");
    assert_eq!(
        ids(&items),
        vec![added[1].id.clone(), added[2].id.clone(), added[0].id.clone()]
    );

    assert!(storage
        .delete_item(&list.id, &added[2].id)
        .await
        .expect("delete"));
    let items = storage.list_items(&list.id).await.expect("items");
    let orders: Vec<u32> = items.iter().map(|item| item.sort_order).collect();
    assert_eq!(orders, vec![0, 1]);
    assert_eq!(ids(&items), vec![added[1].id.clone(), added[0].id.clone()]);

    assert!(storage.delete_list(&list.id, owner).await.expect("delete list"));
    assert!(storage.list_items(&list.id).await.expect("items").is_empty());
}
