use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of roost appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Read Status
// ============================================================================

/// Target state of a bulk read/unread transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Read,
    Unread,
}

impl ReadStatus {
    /// SQL representation of the `is_read` flag.
    pub(crate) fn as_flag(self) -> i64 {
        match self {
            ReadStatus::Read => 1,
            ReadStatus::Unread => 0,
        }
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Account row; one per configured service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
}

/// Category row, scoped by account. `parent_id` of `None` means the
/// category sits directly under the account root.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub account_id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
}

/// Feed row, scoped by account. `category_id` of `None` means the feed
/// sits directly under the account root.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedRow {
    pub id: i64,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub url: String,
}

/// Per-feed message counts, excluding soft- and hard-deleted rows.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct FeedCounts {
    pub feed_id: i64,
    pub unread: i64,
    pub total: i64,
}

/// Message row.
///
/// `is_deleted` is the soft-delete flag (row retained, pending a later
/// hard-delete pass); `is_pdeleted` marks rows the reaper has claimed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub account_id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub is_pdeleted: bool,
    pub created_at: i64,
}
