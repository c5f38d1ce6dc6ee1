//! Integration tests for the feed tree lifecycle: assembly from storage,
//! read-state propagation, clearing, re-parenting and account deletion.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use pretty_assertions::assert_eq;

use roost::storage::{Database, ReadStatus};
use roost::tree::{EventBus, FeedsModel, ItemId, ItemKind, TreeEvent};
use roost::CoreError;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

/// One account: category "News" holding feed "Daily" (2 unread), plus
/// top-level feed "Blog" (1 unread).
struct Seeded {
    account: i64,
    category: i64,
    daily: i64,
    blog: i64,
}

async fn seed_account(db: &Database, name: &str) -> Seeded {
    let account = db.create_account(name).await.unwrap();
    let category = db.create_category(account, None, "News").await.unwrap();
    let daily = db
        .insert_feed(
            account,
            Some(category),
            "Daily",
            &format!("https://{name}.example.com/daily"),
        )
        .await
        .unwrap();
    let blog = db
        .insert_feed(
            account,
            None,
            "Blog",
            &format!("https://{name}.example.com/blog"),
        )
        .await
        .unwrap();

    db.insert_message(account, daily, "one", None).await.unwrap();
    db.insert_message(account, daily, "two", None).await.unwrap();
    db.insert_message(account, blog, "three", None).await.unwrap();

    Seeded {
        account,
        category,
        daily,
        blog,
    }
}

async fn load_model(db: &Database) -> FeedsModel {
    FeedsModel::load(db, EventBus::new()).await.unwrap()
}

fn unread_of(model: &FeedsModel, id: ItemId) -> i64 {
    model.item(id).map(|i| i.unread).unwrap_or(-1)
}

// ============================================================================
// Assembly
// ============================================================================

#[tokio::test]
async fn test_model_assembly_mirrors_storage() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let model = load_model(&db).await;

    let sr = model
        .find(seeded.account, ItemKind::ServiceRoot, seeded.account)
        .unwrap();
    let category = model
        .find(seeded.account, ItemKind::Category, seeded.category)
        .unwrap();
    let daily = model
        .find(seeded.account, ItemKind::Feed, seeded.daily)
        .unwrap();
    let blog = model
        .find(seeded.account, ItemKind::Feed, seeded.blog)
        .unwrap();
    let bin = model.find(seeded.account, ItemKind::Bin, 0).unwrap();

    // Structure: category and blog and bin under the account, daily
    // inside the category
    assert_eq!(model.item(category).unwrap().parent(), Some(sr));
    assert_eq!(model.item(daily).unwrap().parent(), Some(category));
    assert_eq!(model.item(blog).unwrap().parent(), Some(sr));
    assert_eq!(model.item(bin).unwrap().parent(), Some(sr));

    // Counts aggregate upward
    assert_eq!(unread_of(&model, daily), 2);
    assert_eq!(unread_of(&model, category), 2);
    assert_eq!(unread_of(&model, blog), 1);
    assert_eq!(unread_of(&model, sr), 3);
}

#[tokio::test]
async fn test_two_accounts_assemble_independently() {
    let db = test_db().await;
    let a = seed_account(&db, "alpha").await;
    let b = seed_account(&db, "beta").await;
    let model = load_model(&db).await;

    let sr_a = model.find(a.account, ItemKind::ServiceRoot, a.account).unwrap();
    let sr_b = model.find(b.account, ItemKind::ServiceRoot, b.account).unwrap();
    assert_eq!(unread_of(&model, sr_a), 3);
    assert_eq!(unread_of(&model, sr_b), 3);
    assert_eq!(unread_of(&model, model.root()), 6);
}

// ============================================================================
// Read-State Propagation
// ============================================================================

#[tokio::test]
async fn test_marking_a_feed_marks_the_whole_account_read() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let daily = model
        .find(seeded.account, ItemKind::Feed, seeded.daily)
        .unwrap();

    model
        .mark_item_read(&db, daily, ReadStatus::Read)
        .await
        .unwrap();

    // The transaction is account-wide, so the sibling feed goes read too
    let blog = model
        .find(seeded.account, ItemKind::Feed, seeded.blog)
        .unwrap();
    assert_eq!(unread_of(&model, daily), 0);
    assert_eq!(unread_of(&model, blog), 0);
    assert_eq!(unread_of(&model, model.root()), 0);

    for message in db.undeleted_messages(seeded.account).await.unwrap() {
        assert!(message.is_read);
    }
}

#[tokio::test]
async fn test_marking_the_root_spans_every_account() {
    let db = test_db().await;
    let a = seed_account(&db, "alpha").await;
    let b = seed_account(&db, "beta").await;
    let mut model = load_model(&db).await;

    let root = model.root();
    model
        .mark_item_read(&db, root, ReadStatus::Read)
        .await
        .unwrap();

    assert_eq!(unread_of(&model, root), 0);
    for account in [a.account, b.account] {
        for message in db.undeleted_messages(account).await.unwrap() {
            assert!(message.is_read);
        }
    }
}

#[tokio::test]
async fn test_mark_unread_round_trip() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let sr = model
        .find(seeded.account, ItemKind::ServiceRoot, seeded.account)
        .unwrap();

    model.mark_item_read(&db, sr, ReadStatus::Read).await.unwrap();
    assert_eq!(unread_of(&model, sr), 0);

    model
        .mark_item_read(&db, sr, ReadStatus::Unread)
        .await
        .unwrap();
    assert_eq!(unread_of(&model, sr), 3);
}

#[tokio::test]
async fn test_bin_refuses_read_state_transitions() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let bin = model.find(seeded.account, ItemKind::Bin, 0).unwrap();

    let err = model
        .mark_item_read(&db, bin, ReadStatus::Read)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unsupported {
            kind: ItemKind::Bin,
            ..
        }
    ));
}

#[tokio::test]
async fn test_failed_transaction_leaves_counts_untouched() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let sr = model
        .find(seeded.account, ItemKind::ServiceRoot, seeded.account)
        .unwrap();

    db.close().await;

    let err = model
        .mark_item_read(&db, sr, ReadStatus::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Transaction(_)));

    // No commit happened, so the model still shows the pre-failure counts
    assert_eq!(unread_of(&model, sr), 3);
}

#[tokio::test]
async fn test_events_fire_after_mutation_completes() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let mut model = FeedsModel::load(&db, bus).await.unwrap();
    let sr = model
        .find(seeded.account, ItemKind::ServiceRoot, seeded.account)
        .unwrap();
    // Drain assembly-time events
    while rx.try_recv().is_ok() {}

    model.mark_item_read(&db, sr, ReadStatus::Read).await.unwrap();

    // By the time the notification exists, the counts are already fresh
    match rx.try_recv() {
        Ok(TreeEvent::ItemDataChanged(items)) => {
            assert!(items.contains(&sr));
            assert_eq!(unread_of(&model, sr), 0);
        }
        other => panic!("expected ItemDataChanged first, got {other:?}"),
    }
    match rx.try_recv() {
        Ok(TreeEvent::ReloadMessageList { mark_read }) => assert!(mark_read),
        other => panic!("expected ReloadMessageList second, got {other:?}"),
    }
}

// ============================================================================
// Clearing
// ============================================================================

#[tokio::test]
async fn test_clearing_a_category_purges_only_its_feeds() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let category = model
        .find(seeded.account, ItemKind::Category, seeded.category)
        .unwrap();

    let purged = model.mark_item_cleared(&db, category).await.unwrap();
    assert_eq!(purged, 2, "both messages of the category's feed");

    let remaining = db.undeleted_messages(seeded.account).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].feed_id, seeded.blog);

    let blog = model
        .find(seeded.account, ItemKind::Feed, seeded.blog)
        .unwrap();
    assert_eq!(unread_of(&model, category), 0);
    assert_eq!(unread_of(&model, blog), 1);
}

#[tokio::test]
async fn test_clearing_an_empty_subtree_purges_nothing() {
    let db = test_db().await;
    let account = db.create_account("Empty").await.unwrap();
    let category = db.create_category(account, None, "Bare").await.unwrap();
    let mut model = load_model(&db).await;
    let target = model.find(account, ItemKind::Category, category).unwrap();

    let purged = model.mark_item_cleared(&db, target).await.unwrap();
    assert_eq!(purged, 0);
}

// ============================================================================
// Re-parenting
// ============================================================================

#[tokio::test]
async fn test_reassign_feed_persists_and_splices() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let blog = model
        .find(seeded.account, ItemKind::Feed, seeded.blog)
        .unwrap();
    let category = model
        .find(seeded.account, ItemKind::Category, seeded.category)
        .unwrap();

    model.reassign(&db, blog, category).await.unwrap();

    assert_eq!(model.item(blog).unwrap().parent(), Some(category));
    assert_eq!(unread_of(&model, category), 3);

    // The move survives a reload, so it was persisted
    let reloaded = load_model(&db).await;
    let blog2 = reloaded
        .find(seeded.account, ItemKind::Feed, seeded.blog)
        .unwrap();
    let category2 = reloaded
        .find(seeded.account, ItemKind::Category, seeded.category)
        .unwrap();
    assert_eq!(reloaded.item(blog2).unwrap().parent(), Some(category2));
}

#[tokio::test]
async fn test_reassign_rejects_cross_account_moves() {
    let db = test_db().await;
    let a = seed_account(&db, "alpha").await;
    let b = seed_account(&db, "beta").await;
    let mut model = load_model(&db).await;
    let feed = model.find(a.account, ItemKind::Feed, a.blog).unwrap();
    let foreign = model
        .find(b.account, ItemKind::Category, b.category)
        .unwrap();

    let err = model.reassign(&db, feed, foreign).await.unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));

    assert_ne!(model.item(feed).unwrap().parent(), Some(foreign));
}

#[tokio::test]
async fn test_reassign_rejects_own_subtree_cycle() {
    let db = test_db().await;
    let account = db.create_account("Nest").await.unwrap();
    let outer = db.create_category(account, None, "Outer").await.unwrap();
    let inner = db
        .create_category(account, Some(outer), "Inner")
        .await
        .unwrap();
    let mut model = load_model(&db).await;
    let outer_id = model.find(account, ItemKind::Category, outer).unwrap();
    let inner_id = model.find(account, ItemKind::Category, inner).unwrap();

    let err = model.reassign(&db, outer_id, inner_id).await.unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
}

// ============================================================================
// Account Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_account_removes_storage_and_subtree() {
    let db = test_db().await;
    let a = seed_account(&db, "alpha").await;
    let b = seed_account(&db, "beta").await;
    let mut model = load_model(&db).await;
    let sr_a = model.find(a.account, ItemKind::ServiceRoot, a.account).unwrap();

    model.delete_account(&db, sr_a).await.unwrap();

    // Storage: every scoped row is gone, the other account is untouched
    let accounts = db.get_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, b.account);
    assert!(db.get_categories(a.account).await.unwrap().is_empty());
    assert!(db.get_feeds(a.account).await.unwrap().is_empty());
    assert!(db.undeleted_messages(a.account).await.unwrap().is_empty());

    // Tree: the handle went stale and the totals dropped
    assert!(matches!(model.item_for_index(sr_a), Err(CoreError::Lookup)));
    assert_eq!(unread_of(&model, model.root()), 3);
}

#[tokio::test]
async fn test_failed_cascade_names_the_step_and_keeps_the_subtree() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let sr = model
        .find(seeded.account, ItemKind::ServiceRoot, seeded.account)
        .unwrap();

    db.close().await;

    let err = model.delete_account(&db, sr).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Cascade {
            step: "messages",
            ..
        }
    ));

    // The subtree is only dropped on full cascade success
    assert!(model.item(sr).is_some());
    assert_eq!(unread_of(&model, model.root()), 3);
}

#[tokio::test]
async fn test_delete_account_refuses_non_service_root_targets() {
    let db = test_db().await;
    let seeded = seed_account(&db, "alpha").await;
    let mut model = load_model(&db).await;
    let daily = model
        .find(seeded.account, ItemKind::Feed, seeded.daily)
        .unwrap();

    let err = model.delete_account(&db, daily).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Unsupported {
            kind: ItemKind::Feed,
            ..
        }
    ));
    assert!(model.item(daily).is_some(), "nothing was removed");
}
