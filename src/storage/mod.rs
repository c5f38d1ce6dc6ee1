mod accounts;
mod categories;
mod feeds;
mod messages;
mod preferences;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    AccountRow, CategoryRow, DatabaseError, FeedCounts, FeedRow, Message, ReadStatus,
};
