use anyhow::Result;

use super::schema::Database;
use super::types::{FeedCounts, FeedRow};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed, or update its title/category if the URL already
    /// exists within the account. Returns the feed ID.
    pub async fn insert_feed(
        &self,
        account_id: i64,
        category_id: Option<i64>,
        title: &str,
        url: &str,
    ) -> Result<i64> {
        let clean_title = Self::sanitize_title(title)?;

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (account_id, category_id, title, url)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id, url) DO UPDATE SET
                title = excluded.title,
                category_id = excluded.category_id
            RETURNING id
        "#,
        )
        .bind(account_id)
        .bind(category_id)
        .bind(&clean_title)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Rename a feed.
    pub async fn rename_feed(&self, id: i64, new_title: &str) -> Result<()> {
        let clean_title = Self::sanitize_title(new_title)?;

        sqlx::query("UPDATE feeds SET title = ? WHERE id = ?")
            .bind(&clean_title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All feeds of one account as a flat list.
    pub async fn get_feeds(&self, account_id: i64) -> Result<Vec<FeedRow>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            "SELECT id, account_id, category_id, title, url FROM feeds WHERE account_id = ? ORDER BY title, id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Unread/total message counts for every feed of an account, in one
    /// aggregation. Soft- and hard-deleted messages are excluded from both
    /// counts, so the numbers match what a message list would show.
    pub async fn get_feed_counts(&self, account_id: i64) -> Result<Vec<FeedCounts>> {
        let rows = sqlx::query_as::<_, FeedCounts>(
            r#"
            SELECT
                f.id AS feed_id,
                COUNT(CASE WHEN m.is_read = 0 AND m.is_deleted = 0 AND m.is_pdeleted = 0 THEN 1 END) AS unread,
                COUNT(CASE WHEN m.is_deleted = 0 AND m.is_pdeleted = 0 THEN 1 END) AS total
            FROM feeds f
            LEFT JOIN messages m ON f.id = m.feed_id
            WHERE f.account_id = ?
            GROUP BY f.id
        "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
