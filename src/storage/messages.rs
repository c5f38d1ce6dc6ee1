use anyhow::Result;
use chrono::Utc;

use super::schema::Database;
use super::types::{Message, ReadStatus};
use crate::error::CoreError;

impl Database {
    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Insert a message for a feed, returning its ID. Used by the (out of
    /// scope) fetch worker and by seeding code.
    pub async fn insert_message(
        &self,
        account_id: i64,
        feed_id: i64,
        title: &str,
        url: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now().timestamp();

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (account_id, feed_id, title, url, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(account_id)
        .bind(feed_id)
        .bind(title)
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Flip the read flag of a single message.
    pub async fn set_message_read(&self, message_id: i64, read: bool) -> Result<()> {
        sqlx::query("UPDATE messages SET is_read = ? WHERE id = ?")
            .bind(read)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-delete a message: the row is retained pending a later
    /// hard-delete pass.
    pub async fn soft_delete_message(&self, message_id: i64) -> Result<()> {
        sqlx::query("UPDATE messages SET is_deleted = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Read-State Propagation
    // ========================================================================

    /// Apply a read/unread status to every not-permanently-deleted message
    /// of one account, as a single all-or-nothing transaction.
    ///
    /// On success returns the number of rows touched. Begin, statement and
    /// commit failures are all reported uniformly as
    /// [`CoreError::Transaction`]; nothing is applied and the caller
    /// decides whether to retry the whole user action. Callers must only
    /// recompute in-memory counts after this returns `Ok`.
    pub async fn mark_account_read(
        &self,
        account_id: i64,
        status: ReadStatus,
    ) -> Result<u64, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::Transaction)?;

        let result = sqlx::query(
            "UPDATE messages SET is_read = ? WHERE is_pdeleted = 0 AND account_id = ?",
        )
        .bind(status.as_flag())
        .bind(account_id)
        .execute(&mut *tx)
        .await;

        let affected = match result {
            Ok(r) => r.rows_affected(),
            Err(e) => {
                tracing::debug!(account_id, error = %e, "read-state update failed, rolling back");
                // Rollback failure is subsumed by the statement failure
                let _ = tx.rollback().await;
                return Err(CoreError::Transaction(e));
            }
        };

        tx.commit().await.map_err(CoreError::Transaction)?;

        Ok(affected)
    }

    /// All messages of an account that are neither soft- nor
    /// hard-deleted, each row decoded exactly once.
    pub async fn undeleted_messages(&self, account_id: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, account_id, feed_id, title, url,
                   is_read, is_deleted, is_pdeleted, created_at
            FROM messages
            WHERE is_deleted = 0 AND is_pdeleted = 0 AND account_id = ?
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Irreversibly delete all message rows for a set of feeds within one
    /// account. One transaction per call; a rolled-back purge leaves every
    /// row in place.
    pub async fn purge_messages(
        &self,
        account_id: i64,
        feed_ids: &[i64],
    ) -> Result<u64, CoreError> {
        if feed_ids.is_empty() {
            return Ok(0);
        }

        // sqlx has no array binding for SQLite; build the placeholder list
        let placeholders = vec!["?"; feed_ids.len()].join(", ");
        let statement = format!(
            "DELETE FROM messages WHERE account_id = ? AND feed_id IN ({placeholders})"
        );

        let mut tx = self.pool.begin().await.map_err(CoreError::Transaction)?;

        let mut query = sqlx::query(&statement).bind(account_id);
        for feed_id in feed_ids {
            query = query.bind(feed_id);
        }
        let affected = match query.execute(&mut *tx).await {
            Ok(r) => r.rows_affected(),
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(CoreError::Transaction(e));
            }
        };

        tx.commit().await.map_err(CoreError::Transaction)?;

        Ok(affected)
    }

    /// Close the connection pool. Pending operations fail afterwards; used
    /// on shutdown and by failure-path tests.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
