use anyhow::Result;

use super::schema::Database;
use super::types::CategoryRow;

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Create a category under an account, optionally nested under another
    /// category of the same account. Returns its ID.
    pub async fn create_category(
        &self,
        account_id: i64,
        parent_id: Option<i64>,
        title: &str,
    ) -> Result<i64> {
        let clean_title = Self::sanitize_title(title)?;

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO categories (account_id, parent_id, title) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(account_id)
        .bind(parent_id)
        .bind(&clean_title)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Rename a category.
    pub async fn rename_category(&self, id: i64, new_title: &str) -> Result<()> {
        let clean_title = Self::sanitize_title(new_title)?;

        sqlx::query("UPDATE categories SET title = ? WHERE id = ?")
            .bind(&clean_title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All categories of one account as a flat list. The tree model builds
    /// the hierarchy from the parent_id relationships.
    pub async fn get_categories(&self, account_id: i64) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, account_id, parent_id, title FROM categories WHERE account_id = ? ORDER BY title, id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Persist a feed's re-parenting: move it into a category, or directly
    /// under the account root if `category_id` is `None`.
    pub async fn move_feed_to_category(
        &self,
        feed_id: i64,
        category_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE feeds SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a category's re-parenting within its account.
    pub async fn move_category(
        &self,
        category_id: i64,
        parent_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE categories SET parent_id = ? WHERE id = ?")
            .bind(parent_id)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
