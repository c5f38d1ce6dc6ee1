//! The item tree model.
//!
//! An arena of [`Item`]s rooted at a single Root sentinel. All mutation
//! goes through this type; observers learn about changes via the
//! [`EventBus`], strictly after the mutation has completed. Counts are
//! always recomputed from storage after a committed transaction, never
//! from a cached snapshot.

use std::collections::HashMap;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::storage::{Database, ReadStatus};

use super::events::{EventBus, TreeEvent};
use super::item::{Item, ItemId, ItemKind};

struct Slot {
    generation: u32,
    item: Option<Item>,
}

pub struct FeedsModel {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ItemId,
    bus: EventBus,
}

impl FeedsModel {
    // ========================================================================
    // Construction
    // ========================================================================

    pub fn new(bus: EventBus) -> Self {
        let mut model = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ItemId::UNDEFINED,
            bus,
        };
        model.root = model.allocate(Item {
            kind: ItemKind::Root,
            storage_id: 0,
            account_id: 0,
            title: "Root".to_string(),
            unread: 0,
            total: 0,
            index: ItemId::UNDEFINED,
            parent: None,
            children: Vec::new(),
        });
        model
    }

    /// Build the tree from storage: one ServiceRoot per account, its
    /// categories resolved iteratively by parent id, then its feeds, then
    /// a recycle bin. Loose rows (parent missing) are logged and skipped.
    pub async fn load(db: &Database, bus: EventBus) -> Result<Self> {
        let mut model = Self::new(bus);

        for account in db.get_accounts().await? {
            let root = model.root;
            let service_root = model.insert_item(
                root,
                ItemKind::ServiceRoot,
                account.id,
                account.id,
                &account.name,
            )?;

            // Categories: top-level first, then children of already-placed
            // categories, until a pass places nothing.
            let mut placed: HashMap<i64, ItemId> = HashMap::new();
            let mut remaining = db.get_categories(account.id).await?;
            loop {
                let mut next = Vec::new();
                let mut progressed = false;

                for row in remaining {
                    let parent = match row.parent_id {
                        None => Some(service_root),
                        Some(pid) => placed.get(&pid).copied(),
                    };
                    match parent {
                        Some(parent) => {
                            let node = model.insert_item(
                                parent,
                                ItemKind::Category,
                                row.id,
                                row.account_id,
                                &row.title,
                            )?;
                            placed.insert(row.id, node);
                            progressed = true;
                        }
                        None => next.push(row),
                    }
                }

                if next.is_empty() {
                    break;
                }
                if !progressed {
                    for row in &next {
                        tracing::warn!(category = %row.title, id = row.id, "category is loose, skipping it");
                    }
                    break;
                }
                remaining = next;
            }

            for feed in db.get_feeds(account.id).await? {
                let parent = match feed.category_id {
                    None => Some(service_root),
                    Some(cid) => placed.get(&cid).copied(),
                };
                match parent {
                    Some(parent) => {
                        model.insert_item(
                            parent,
                            ItemKind::Feed,
                            feed.id,
                            feed.account_id,
                            &feed.title,
                        )?;
                    }
                    None => {
                        tracing::warn!(feed = %feed.title, id = feed.id, "feed is loose, skipping it");
                    }
                }
            }

            model.insert_item(service_root, ItemKind::Bin, 0, account.id, "Recycle bin")?;

            model.refresh_account_counts(db, service_root).await?;
        }

        Ok(model)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn root(&self) -> ItemId {
        self.root
    }

    /// A clone of the event bus, for subscribing or sharing with a proxy.
    pub fn events(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.item.as_ref()
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.item.as_mut()
    }

    /// Resolve an index to its item. The undefined index resolves to the
    /// Root sentinel; a stale or foreign index is a `Lookup` error.
    pub fn item_for_index(&self, index: ItemId) -> Result<&Item, CoreError> {
        if index == ItemId::UNDEFINED {
            return self.item(self.root).ok_or(CoreError::Lookup);
        }
        self.item(index).ok_or(CoreError::Lookup)
    }

    /// Inverse of [`item_for_index`](Self::item_for_index).
    pub fn index_for_item(&self, item: &Item) -> ItemId {
        item.index()
    }

    /// Locate an item by logical identity. Used to resolve user-supplied
    /// references (CLI arguments) to handles.
    pub fn find(&self, account_id: i64, kind: ItemKind, storage_id: i64) -> Option<ItemId> {
        self.live_items().into_iter().find(|&id| {
            self.item(id).is_some_and(|item| {
                item.kind == kind && item.account_id == account_id && item.storage_id == storage_id
            })
        })
    }

    /// Handles of every live item, root included, in arena order.
    pub fn live_items(&self) -> Vec<ItemId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| {
                s.item.as_ref().map(|_| ItemId {
                    slot: slot as u32,
                    generation: s.generation,
                })
            })
            .collect()
    }

    /// Preorder walk of the subtree rooted at `id`, `id` included.
    pub fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(item) = self.item(node) {
                out.push(node);
                for &child in item.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Nearest enclosing ServiceRoot, `id` included. `None` for the Root
    /// and for stale handles.
    pub fn parent_service_root(&self, id: ItemId) -> Option<ItemId> {
        let mut current = id;
        loop {
            let item = self.item(current)?;
            if item.kind == ItemKind::ServiceRoot {
                return Some(current);
            }
            current = item.parent?;
        }
    }

    /// Stable identity hash: account + path of kind-tagged storage IDs,
    /// independent of in-memory handles. Survives reloads where items are
    /// reconstructed as different instances with the same logical identity.
    pub fn identity_hash(&self, id: ItemId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = id;
        let account_id = self.item(id)?.account_id;
        loop {
            let item = self.item(current)?;
            if item.kind == ItemKind::Root {
                break;
            }
            segments.push(format!("{}{}", item.kind.tag(), item.storage_id));
            match item.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();

        let path = format!("{}|{}", account_id, segments.join("/"));
        let digest = Sha256::digest(path.as_bytes());
        Some(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
    }

    // ========================================================================
    // Structural Mutation
    // ========================================================================

    /// Append a new item under `parent`.
    pub fn insert_item(
        &mut self,
        parent: ItemId,
        kind: ItemKind,
        storage_id: i64,
        account_id: i64,
        title: &str,
    ) -> Result<ItemId, CoreError> {
        let parent_item = self.item_for_index(parent)?;
        let parent_index = parent_item.index();
        if !parent_item.kind.allows_children() {
            return Err(CoreError::Unsupported {
                action: "adding child items",
                kind: parent_item.kind,
            });
        }

        let id = self.allocate(Item {
            kind,
            storage_id,
            account_id,
            title: title.to_string(),
            unread: 0,
            total: 0,
            index: ItemId::UNDEFINED,
            parent: Some(parent_index),
            children: Vec::new(),
        });
        if let Some(parent_item) = self.item_mut(parent_index) {
            parent_item.children.push(id);
        }
        Ok(id)
    }

    /// Detach and free the subtree rooted at `id`. Handles into it become
    /// stale. Detaching the Root is refused.
    pub fn remove_subtree(&mut self, id: ItemId) -> Result<(), CoreError> {
        if id == self.root || id == ItemId::UNDEFINED {
            return Err(CoreError::Unsupported {
                action: "removal",
                kind: ItemKind::Root,
            });
        }
        let item = self.item(id).ok_or(CoreError::Lookup)?;
        let parent = item.parent;

        if let Some(parent) = parent {
            if let Some(parent_item) = self.item_mut(parent) {
                parent_item.children.retain(|&c| c != id);
            }
        }
        for node in self.subtree(id) {
            if let Some(slot) = self.slots.get_mut(node.slot as usize) {
                slot.item = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(node.slot);
            }
        }
        Ok(())
    }

    /// Re-parent a feed or category onto a new category or ServiceRoot of
    /// the same account, persisting the move before touching the tree.
    /// Feeds are leaves and are rejected as targets. After the splice the
    /// moved item's validation event fires so the view can re-expand and
    /// re-select it at its new position.
    pub async fn reassign(
        &mut self,
        db: &Database,
        item_id: ItemId,
        new_parent_id: ItemId,
    ) -> Result<(), CoreError> {
        let item = self.item_for_index(item_id)?;
        let (kind, account_id, storage_id, old_parent) =
            (item.kind, item.account_id, item.storage_id, item.parent);

        let target = self.item_for_index(new_parent_id)?;
        let (target_kind, target_account, target_storage_id, resolved_target) = (
            target.kind,
            target.account_id,
            target.storage_id,
            target.index(),
        );

        if !matches!(kind, ItemKind::Feed | ItemKind::Category) {
            return Err(CoreError::Unsupported {
                action: "re-parenting",
                kind,
            });
        }
        if !matches!(target_kind, ItemKind::Category | ItemKind::ServiceRoot) {
            return Err(CoreError::Unsupported {
                action: "receiving dropped items",
                kind: target_kind,
            });
        }
        if target_account != account_id {
            return Err(CoreError::Unsupported {
                action: "re-parenting across accounts",
                kind,
            });
        }
        if self.subtree(item_id).contains(&resolved_target) {
            return Err(CoreError::Unsupported {
                action: "re-parenting into its own subtree",
                kind,
            });
        }

        let new_category = match target_kind {
            ItemKind::Category => Some(target_storage_id),
            _ => None,
        };
        match kind {
            ItemKind::Feed => db
                .move_feed_to_category(storage_id, new_category)
                .await
                .map_err(CoreError::Transaction)?,
            ItemKind::Category => db
                .move_category(storage_id, new_category)
                .await
                .map_err(CoreError::Transaction)?,
            _ => unreachable!("kind checked above"),
        }

        if let Some(old_parent) = old_parent {
            if let Some(parent_item) = self.item_mut(old_parent) {
                parent_item.children.retain(|&c| c != item_id);
            }
        }
        if let Some(target_item) = self.item_mut(resolved_target) {
            target_item.children.push(item_id);
        }
        if let Some(item) = self.item_mut(item_id) {
            item.parent = Some(resolved_target);
        }
        self.recompute_container_counts(self.root);

        self.bus.publish(TreeEvent::ItemReassignmentRequested {
            item: item_id,
            new_parent: resolved_target,
        });
        self.bus.publish(TreeEvent::ValidateAfterDragDrop(item_id));
        if let Some(service_root) = self.parent_service_root(resolved_target) {
            self.bus
                .publish(TreeEvent::ExpandStateSaveRequested(service_root));
        }
        Ok(())
    }

    // ========================================================================
    // Read-State Propagation
    // ========================================================================

    /// Apply a read/unread status to `target` and all descendant feeds by
    /// delegating to each affected ServiceRoot's whole-account transaction.
    ///
    /// Accounts are processed in order; the first failed transaction stops
    /// the operation and leaves that account's (and later accounts')
    /// counts untouched. Counts are only recomputed, from storage, after
    /// an account's commit.
    pub async fn mark_item_read(
        &mut self,
        db: &Database,
        target: ItemId,
        status: ReadStatus,
    ) -> Result<(), CoreError> {
        for service_root in self.affected_service_roots(target)? {
            let account_id = match self.item(service_root) {
                Some(item) => item.account_id,
                None => continue,
            };

            db.mark_account_read(account_id, status).await?;

            if let Err(e) = self.refresh_account_counts(db, service_root).await {
                tracing::warn!(account_id, error = %e, "count refresh failed after read-state commit");
            }
            self.bus
                .publish(TreeEvent::ItemDataChanged(self.subtree(service_root)));
            self.bus.publish(TreeEvent::ReloadMessageList {
                mark_read: status == ReadStatus::Read,
            });
        }
        Ok(())
    }

    /// Irreversibly purge all message rows of the feeds in `target`'s
    /// subtree. Confirmation is the caller's responsibility. Returns the
    /// number of purged rows.
    pub async fn mark_item_cleared(
        &mut self,
        db: &Database,
        target: ItemId,
    ) -> Result<u64, CoreError> {
        // Group the subtree's feeds by owning account
        let resolved = self.item_for_index(target)?.index();
        let mut feeds_by_account: HashMap<i64, Vec<i64>> = HashMap::new();
        for node in self.subtree(resolved) {
            if let Some(item) = self.item(node) {
                if item.kind == ItemKind::Feed {
                    feeds_by_account
                        .entry(item.account_id)
                        .or_default()
                        .push(item.storage_id);
                }
            }
        }

        let mut purged = 0;
        for (account_id, feed_ids) in feeds_by_account {
            purged += db.purge_messages(account_id, &feed_ids).await?;

            if let Some(service_root) = self.service_root_of_account(account_id) {
                if let Err(e) = self.refresh_account_counts(db, service_root).await {
                    tracing::warn!(account_id, error = %e, "count refresh failed after purge");
                }
                self.bus
                    .publish(TreeEvent::ItemDataChanged(self.subtree(service_root)));
            }
        }
        if purged > 0 {
            self.bus
                .publish(TreeEvent::ReloadMessageList { mark_read: true });
        }
        Ok(purged)
    }

    /// ServiceRoots whose accounts a read-state transition on `target`
    /// touches: every account under the Root, or the single enclosing
    /// account otherwise. Bins do not participate in read-state
    /// transitions.
    fn affected_service_roots(&self, target: ItemId) -> Result<Vec<ItemId>, CoreError> {
        let item = self.item_for_index(target)?;
        match item.kind {
            ItemKind::Bin => Err(CoreError::Unsupported {
                action: "read-state transitions",
                kind: ItemKind::Bin,
            }),
            ItemKind::Root => Ok(item
                .children
                .iter()
                .copied()
                .filter(|&c| self.item(c).is_some_and(|i| i.kind == ItemKind::ServiceRoot))
                .collect()),
            _ => {
                let index = item.index();
                Ok(self.parent_service_root(index).into_iter().collect())
            }
        }
    }

    fn service_root_of_account(&self, account_id: i64) -> Option<ItemId> {
        let root = self.item(self.root)?;
        root.children.iter().copied().find(|&c| {
            self.item(c)
                .is_some_and(|i| i.kind == ItemKind::ServiceRoot && i.account_id == account_id)
        })
    }

    // ========================================================================
    // Account Deletion
    // ========================================================================

    /// Delete an account: run the storage cascade, and only on full
    /// success drop the subtree from the tree and announce the removal.
    pub async fn delete_account(
        &mut self,
        db: &Database,
        target: ItemId,
    ) -> Result<(), CoreError> {
        let item = self.item_for_index(target)?;
        if item.kind != ItemKind::ServiceRoot {
            return Err(CoreError::Unsupported {
                action: "deletion",
                kind: item.kind,
            });
        }
        let (account_id, resolved) = (item.account_id, item.index());

        db.delete_account(account_id).await?;

        self.remove_subtree(resolved)?;
        self.recompute_container_counts(self.root);
        self.bus.publish(TreeEvent::ItemRemovalRequested(resolved));
        Ok(())
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Pull per-feed unread/total counts for one account from storage and
    /// re-aggregate every container on top of them.
    pub async fn refresh_account_counts(
        &mut self,
        db: &Database,
        service_root: ItemId,
    ) -> Result<()> {
        let account_id = self
            .item(service_root)
            .ok_or(CoreError::Lookup)?
            .account_id;

        let by_feed: HashMap<i64, (i64, i64)> = db
            .get_feed_counts(account_id)
            .await?
            .into_iter()
            .map(|c| (c.feed_id, (c.unread, c.total)))
            .collect();

        for node in self.subtree(service_root) {
            if let Some(item) = self.item_mut(node) {
                if item.kind == ItemKind::Feed {
                    let (unread, total) = by_feed.get(&item.storage_id).copied().unwrap_or((0, 0));
                    item.unread = unread;
                    item.total = total;
                }
            }
        }
        self.recompute_container_counts(self.root);
        Ok(())
    }

    /// Re-derive container counts as sums over children. Feeds keep their
    /// storage-derived values; bins carry none.
    pub(crate) fn recompute_container_counts(&mut self, id: ItemId) -> (i64, i64) {
        let (kind, unread, total, children) = match self.item(id) {
            Some(item) => (
                item.kind,
                item.unread,
                item.total,
                item.children.clone(),
            ),
            None => return (0, 0),
        };
        if !kind.allows_children() {
            return match kind {
                ItemKind::Feed => (unread, total),
                _ => (0, 0),
            };
        }

        let mut unread_sum = 0;
        let mut total_sum = 0;
        for child in children {
            let (u, t) = self.recompute_container_counts(child);
            unread_sum += u;
            total_sum += t;
        }
        if let Some(item) = self.item_mut(id) {
            item.unread = unread_sum;
            item.total = total_sum;
        }
        (unread_sum, total_sum)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn allocate(&mut self, mut item: Item) -> ItemId {
        let id = match self.free.pop() {
            Some(slot) => ItemId {
                slot,
                generation: self.slots[slot as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    item: None,
                });
                ItemId {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        item.index = id;
        self.slots[id.slot as usize].item = Some(item);
        id
    }
}
