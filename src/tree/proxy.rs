//! Filtered, sorted projection of the item tree.
//!
//! The proxy owns a flat list of visible rows in display order and maps
//! rows to model handles in both directions. Source mutations invalidate
//! only the affected rows: a removal splices rows out in place, and a
//! filter change diffs old against new visibility, so untouched rows keep
//! their relative order and the view keeps its perceived scroll position.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

use super::events::{EventBus, TreeEvent};
use super::item::{ItemId, ItemKind};
use super::model::FeedsModel;

// ============================================================================
// Sort State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortColumn {
    #[default]
    Title,
    UnreadCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Active sort column and direction. Persisted under `gui.feeds_sort`
/// separately from expansion state, and restored first, because expansion
/// restoration resolves indices in the already-sorted projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub column: SortColumn,
    pub order: SortOrder,
}

// ============================================================================
// Proxy
// ============================================================================

pub struct FeedsProxy {
    rows: Vec<ItemId>,
    row_of: HashMap<ItemId, usize>,
    hide_read: bool,
    sort: SortState,
    selected: Option<ItemId>,
    bus: EventBus,
}

impl FeedsProxy {
    pub fn new(bus: EventBus, hide_read: bool) -> Self {
        Self {
            rows: Vec::new(),
            row_of: HashMap::new(),
            hide_read,
            sort: SortState::default(),
            selected: None,
            bus,
        }
    }

    // ========================================================================
    // Row Mapping
    // ========================================================================

    /// Visible items in display order.
    pub fn rows(&self) -> &[ItemId] {
        &self.rows
    }

    /// Map a model handle to its proxy row, if visible.
    pub fn row_of(&self, id: ItemId) -> Option<usize> {
        self.row_of.get(&id).copied()
    }

    /// Map a proxy row back to its model handle.
    pub fn item_at(&self, row: usize) -> Option<ItemId> {
        self.rows.get(row).copied()
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn selected(&self) -> Option<ItemId> {
        self.selected
    }

    pub fn hide_read(&self) -> bool {
        self.hide_read
    }

    // ========================================================================
    // Projection Control
    // ========================================================================

    /// Recompute the whole projection. Called once after model load or
    /// sort restore; incremental paths below handle everything else.
    pub fn rebuild(&mut self, model: &FeedsModel) {
        self.rows = self.compute_projection(model);
        self.reindex();
    }

    /// Change the comparator and re-sort.
    pub fn set_sort(&mut self, model: &FeedsModel, sort: SortState) {
        self.sort = sort;
        self.rebuild(model);
    }

    /// Toggle the read filter and re-evaluate visibility.
    pub fn set_hide_read(&mut self, model: &FeedsModel, hide_read: bool) {
        self.hide_read = hide_read;
        self.invalidate_read_filter(model);
    }

    /// Move the selection. The selected item (and its ancestors) are
    /// exempt from the read filter, so the filter is re-evaluated on every
    /// selection change.
    pub fn set_selected(&mut self, model: &FeedsModel, selected: Option<ItemId>) {
        self.selected = selected;
        self.invalidate_read_filter(model);
    }

    /// Re-evaluate the read filter. Items that just became visible get an
    /// expand-after-filter-in request so the view can expand them once the
    /// projection has settled.
    pub fn invalidate_read_filter(&mut self, model: &FeedsModel) {
        let fresh = self.compute_projection(model);

        let newly_visible: Vec<ItemId> = fresh
            .iter()
            .copied()
            .filter(|id| !self.row_of.contains_key(id))
            .collect();

        self.rows = fresh;
        self.reindex();

        for id in newly_visible {
            self.bus.publish(TreeEvent::ExpandAfterFilterIn(id));
        }
    }

    /// Splice out the rows of a removed subtree. Surviving rows keep
    /// their relative order; only indices after the removed block shift.
    pub fn source_removed(&mut self, removed: &[ItemId]) {
        self.rows.retain(|id| !removed.contains(id));
        if let Some(selected) = self.selected {
            if removed.contains(&selected) {
                self.selected = None;
            }
        }
        self.reindex();
    }

    /// Recompute after an insertion or re-parenting in the source model.
    /// The projection comparator is stable, so pre-existing rows keep
    /// their relative order and only the moved block lands elsewhere.
    pub fn source_changed(&mut self, model: &FeedsModel) {
        self.rows = self.compute_projection(model);
        self.reindex();
    }

    // ========================================================================
    // Drop Targets
    // ========================================================================

    /// Resolve the target of a drop at `row`.
    ///
    /// A drop directly onto a category or ServiceRoot targets that item;
    /// feeds are leaves and refuse drops. An ambiguous drop between rows
    /// (`between == true`) targets the nearest ancestor category (or the
    /// account root) of the row at the drop position.
    pub fn drop_target(
        &self,
        model: &FeedsModel,
        row: usize,
        between: bool,
    ) -> Result<ItemId, CoreError> {
        let id = self.item_at(row).ok_or(CoreError::Lookup)?;
        let item = model.item_for_index(id)?;

        if between {
            return self.nearest_container(model, item.index());
        }
        match item.kind {
            ItemKind::Category | ItemKind::ServiceRoot => Ok(item.index()),
            kind => Err(CoreError::Unsupported {
                action: "receiving dropped items",
                kind,
            }),
        }
    }

    fn nearest_container(&self, model: &FeedsModel, id: ItemId) -> Result<ItemId, CoreError> {
        let mut current = id;
        loop {
            let item = model.item_for_index(current)?;
            match item.kind {
                ItemKind::Category | ItemKind::ServiceRoot => return Ok(current),
                ItemKind::Root => {
                    return Err(CoreError::Unsupported {
                        action: "receiving dropped items",
                        kind: ItemKind::Root,
                    })
                }
                _ => match item.parent() {
                    Some(parent) => current = parent,
                    None => return Err(CoreError::Lookup),
                },
            }
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn compute_projection(&self, model: &FeedsModel) -> Vec<ItemId> {
        let mut rows = Vec::new();
        self.project_children(model, model.root(), &mut rows);
        rows
    }

    fn project_children(&self, model: &FeedsModel, parent: ItemId, out: &mut Vec<ItemId>) {
        let Some(parent_item) = model.item(parent) else {
            return;
        };

        let mut children: Vec<ItemId> = parent_item
            .children()
            .iter()
            .copied()
            .filter(|&c| self.is_visible(model, c))
            .collect();
        children.sort_by(|&a, &b| self.compare(model, a, b));

        for child in children {
            out.push(child);
            self.project_children(model, child, out);
        }
    }

    /// Visibility under the read filter. ServiceRoots and bins never
    /// vanish; categories and feeds with zero unread are hidden unless
    /// they are the selected item or one of its ancestors.
    fn is_visible(&self, model: &FeedsModel, id: ItemId) -> bool {
        if !self.hide_read {
            return true;
        }
        let Some(item) = model.item(id) else {
            return false;
        };
        match item.kind {
            ItemKind::Root | ItemKind::ServiceRoot | ItemKind::Bin => true,
            ItemKind::Category | ItemKind::Feed => {
                item.unread > 0 || self.on_selection_path(model, id)
            }
        }
    }

    fn on_selection_path(&self, model: &FeedsModel, id: ItemId) -> bool {
        let Some(selected) = self.selected else {
            return false;
        };
        let mut current = Some(selected);
        while let Some(node) = current {
            if node == id {
                return true;
            }
            current = model.item(node).and_then(|i| i.parent());
        }
        false
    }

    fn compare(&self, model: &FeedsModel, a: ItemId, b: ItemId) -> Ordering {
        let (Some(ia), Some(ib)) = (model.item(a), model.item(b)) else {
            return Ordering::Equal;
        };

        let by_column = match self.sort.column {
            SortColumn::Title => ia.title.to_lowercase().cmp(&ib.title.to_lowercase()),
            SortColumn::UnreadCount => ia.unread.cmp(&ib.unread),
        };
        let directed = match self.sort.order {
            SortOrder::Ascending => by_column,
            SortOrder::Descending => by_column.reverse(),
        };
        // Stable tie-break independent of direction, so re-sorts cannot
        // shuffle equal rows
        directed
            .then_with(|| ia.title.cmp(&ib.title))
            .then_with(|| ia.storage_id.cmp(&ib.storage_id))
    }

    fn reindex(&mut self) {
        self.row_of = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();
    }
}
