//! Persisted view state: expansion records and the saved sort.
//!
//! Expansion is keyed by logical identity hash, not by handle, so the
//! state survives model reconstruction. Sort is restored before the
//! expansion records are applied; the expansion requests then resolve
//! against the already-sorted projection.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;

use crate::prefs::Settings;
use crate::storage::Database;

use super::events::{EventBus, TreeEvent};
use super::item::ItemId;
use super::model::FeedsModel;
use super::proxy::{FeedsProxy, SortState};

/// Settle window between a structural change and the follow-up expand,
/// long enough for the projection to rebuild first.
pub const EXPAND_SETTLE_DELAY: Duration = Duration::from_millis(100);

const SORT_KEY: &str = "gui.feeds_sort";

fn expand_key(identity: &str) -> String {
    format!("expand.{identity}")
}

// ============================================================================
// Expand States
// ============================================================================

/// In-memory expansion flags for the current model generation.
pub struct ExpandStates {
    states: HashMap<ItemId, bool>,
}

impl ExpandStates {
    /// Resolve persisted records against a freshly loaded model. A saved
    /// record always wins; a container with no record defaults to
    /// expanded when it has children.
    pub fn load(model: &FeedsModel, settings: &Settings) -> Self {
        let mut states = HashMap::new();
        for id in model.live_items() {
            let Some(item) = model.item(id) else { continue };
            if !item.kind.allows_children() {
                continue;
            }
            let saved = model
                .identity_hash(id)
                .and_then(|hash| settings.get_bool(&expand_key(&hash)));
            states.insert(id, saved.unwrap_or(!item.children().is_empty()));
        }
        Self { states }
    }

    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.states.get(&id).copied().unwrap_or(false)
    }

    pub fn set_expanded(&mut self, id: ItemId, expanded: bool) {
        self.states.insert(id, expanded);
    }

    pub fn toggle(&mut self, id: ItemId) {
        let current = self.is_expanded(id);
        self.states.insert(id, !current);
    }

    /// Persist the records of one subtree in a single walk. Called on an
    /// explicit save request, never per-toggle.
    pub async fn save_subtree(
        &self,
        model: &FeedsModel,
        settings: &mut Settings,
        db: &Database,
        root: ItemId,
    ) -> Result<()> {
        for id in model.subtree(root) {
            let Some(expanded) = self.states.get(&id) else {
                continue;
            };
            if let Some(hash) = model.identity_hash(id) {
                settings.set_bool(db, &expand_key(&hash), *expanded).await?;
            }
        }
        Ok(())
    }
}

/// Request an expand of `item` after the settle delay.
pub fn schedule_expand(bus: EventBus, item: ItemId) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(EXPAND_SETTLE_DELAY).await;
        bus.publish(TreeEvent::ItemExpandRequested {
            items: vec![item],
            expand: true,
        });
    })
}

// ============================================================================
// View State
// ============================================================================

/// Restore the saved sort, then resolve the expansion records. Order
/// matters: expansion applies to rows of the restored sort.
pub fn restore_view_state(
    model: &FeedsModel,
    proxy: &mut FeedsProxy,
    settings: &Settings,
) -> ExpandStates {
    match settings.get_json::<SortState>(SORT_KEY) {
        Some(sort) => proxy.set_sort(model, sort),
        None => proxy.rebuild(model),
    }
    ExpandStates::load(model, settings)
}

/// Persist the sort and every expansion record.
pub async fn save_view_state(
    model: &FeedsModel,
    proxy: &FeedsProxy,
    states: &ExpandStates,
    settings: &mut Settings,
    db: &Database,
) -> Result<()> {
    settings.set_json(db, SORT_KEY, &proxy.sort_state()).await?;
    states.save_subtree(model, settings, db, model.root()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ItemKind, SortColumn, SortOrder};
    use pretty_assertions::assert_eq;

    fn sample() -> (FeedsModel, ItemId, ItemId) {
        let mut model = FeedsModel::new(EventBus::new());
        let root = model.root();
        let sr = model
            .insert_item(root, ItemKind::ServiceRoot, 1, 1, "Account")
            .unwrap();
        let cat = model
            .insert_item(sr, ItemKind::Category, 10, 1, "Tech")
            .unwrap();
        model.insert_item(cat, ItemKind::Feed, 100, 1, "LWN").unwrap();
        (model, sr, cat)
    }

    #[test]
    fn test_items_with_children_default_expanded() {
        let (model, sr, cat) = sample();
        let states = ExpandStates::load(&model, &Settings::empty());

        assert!(states.is_expanded(sr));
        assert!(states.is_expanded(cat));
    }

    #[test]
    fn test_leaf_items_carry_no_record() {
        let (model, _, cat) = sample();
        let feed = model.item(cat).unwrap().children()[0];
        let states = ExpandStates::load(&model, &Settings::empty());

        assert!(!states.is_expanded(feed));
    }

    #[tokio::test]
    async fn test_saved_record_wins_over_childless_default() {
        let db = Database::open(":memory:").await.unwrap();
        let mut settings = Settings::empty();

        // A category whose children were all removed: default would be
        // collapsed, but an explicit saved record still applies
        let mut model = FeedsModel::new(EventBus::new());
        let root = model.root();
        let sr = model
            .insert_item(root, ItemKind::ServiceRoot, 1, 1, "Account")
            .unwrap();
        let cat = model
            .insert_item(sr, ItemKind::Category, 10, 1, "Tech")
            .unwrap();
        let hash = model.identity_hash(cat).unwrap();
        settings
            .set_bool(&db, &expand_key(&hash), true)
            .await
            .unwrap();

        let states = ExpandStates::load(&model, &settings);
        assert!(states.is_expanded(cat), "saved record beats the default");
        assert!(states.is_expanded(sr), "has a child, so defaults expanded");
    }

    #[tokio::test]
    async fn test_saved_state_survives_model_rebuild() {
        let db = Database::open(":memory:").await.unwrap();
        let mut settings = Settings::empty();

        let (model, _, cat) = sample();
        let mut states = ExpandStates::load(&model, &settings);
        states.set_expanded(cat, false);
        states
            .save_subtree(&model, &mut settings, &db, model.root())
            .await
            .unwrap();

        // A rebuilt model hands out different handles for the same items
        let (rebuilt, sr2, cat2) = sample();
        let restored = ExpandStates::load(&rebuilt, &settings);
        assert!(restored.is_expanded(sr2));
        assert!(!restored.is_expanded(cat2), "collapse persisted by identity");
    }

    #[tokio::test]
    async fn test_restore_applies_sort_before_expansion() {
        let db = Database::open(":memory:").await.unwrap();
        let mut settings = Settings::empty();
        let saved = SortState {
            column: SortColumn::UnreadCount,
            order: SortOrder::Descending,
        };
        settings.set_json(&db, SORT_KEY, &saved).await.unwrap();

        let (model, _, _) = sample();
        let mut proxy = FeedsProxy::new(model.events(), false);
        restore_view_state(&model, &mut proxy, &settings);

        assert_eq!(proxy.sort_state(), saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_expand_waits_out_the_settle_delay() {
        let (model, sr, _) = sample();
        let bus = model.events();
        let mut rx = bus.subscribe();

        let handle = schedule_expand(bus, sr);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "fires only after the delay");

        tokio::time::advance(EXPAND_SETTLE_DELAY).await;
        handle.await.unwrap();
        match rx.try_recv() {
            Ok(TreeEvent::ItemExpandRequested { items, expand }) => {
                assert_eq!(items, vec![sr]);
                assert!(expand);
            }
            other => panic!("expected expand request, got {other:?}"),
        }
    }
}
