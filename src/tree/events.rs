//! Change-notification channel for the tree.
//!
//! The model and proxy publish [`TreeEvent`]s; views subscribe and react.
//! Publishing is fire-and-forget over unbounded channels; a dropped
//! receiver prunes its subscription on the next publish. Publishers only
//! emit after the mutation that caused the event has fully completed, so a
//! subscriber reading the model inside its handler sees the new state.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::item::ItemId;

/// Notifications flowing from the tree to its observers.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// Data (titles, counts) of these items changed.
    ItemDataChanged(Vec<ItemId>),
    /// The open message list must reload. `mark_read` tells a read-items
    /// view whether it may need to hide newly-read rows.
    ReloadMessageList { mark_read: bool },
    /// The view should expand or collapse these items.
    ItemExpandRequested { items: Vec<ItemId>, expand: bool },
    /// Expansion state of the subtree should be persisted now.
    ExpandStateSaveRequested(ItemId),
    /// An item was re-parented.
    ItemReassignmentRequested { item: ItemId, new_parent: ItemId },
    /// An item left the tree. Carries the now-stale handle so observers
    /// can drop their references; resolving it yields a Lookup error.
    ItemRemovalRequested(ItemId),
    /// A drag-dropped item should be re-expanded and re-selected at its
    /// new position.
    ValidateAfterDragDrop(ItemId),
    /// A previously filtered-out item became visible; expand it after the
    /// settle delay.
    ExpandAfterFilterIn(ItemId),
}

/// Cloneable fan-out handle. The model and proxy each hold one.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<UnboundedSender<TreeEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> UnboundedReceiver<TreeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // A poisoned lock means a publisher panicked mid-retain; the list
        // itself is still usable.
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn publish(&self, event: TreeEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
