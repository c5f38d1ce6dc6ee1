//! The feed item tree: model, projection, events and view state.

mod events;
mod expand;
mod item;
mod model;
mod proxy;

pub use events::{EventBus, TreeEvent};
pub use expand::{
    restore_view_state, save_view_state, schedule_expand, ExpandStates, EXPAND_SETTLE_DELAY,
};
pub use item::{Item, ItemId, ItemKind};
pub use model::FeedsModel;
pub use proxy::{FeedsProxy, SortColumn, SortOrder, SortState};
