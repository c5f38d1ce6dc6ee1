//! roost: headless feed-tree and read-state core for a feed reader.
//!
//! The crate models the account → category → feed hierarchy of a feed
//! reader, a filtered/sorted projection of it, persisted selection and
//! expansion state, and transactional read-state propagation over a SQLite
//! message store. There is no rendering here: a front-end consumes the tree
//! through [`tree::FeedsModel`]/[`tree::FeedsProxy`] and subscribes to
//! [`tree::TreeEvent`]s.

pub mod config;
pub mod context;
pub mod error;
pub mod lock;
pub mod prefs;
pub mod skin;
pub mod storage;
pub mod tree;
pub mod util;

pub use context::CoreContext;
pub use error::CoreError;
