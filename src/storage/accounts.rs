use anyhow::Result;

use super::schema::Database;
use super::types::AccountRow;
use crate::error::CoreError;
use crate::util::strip_control_chars;

impl Database {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Create a new account, returning its ID.
    pub async fn create_account(&self, name: &str) -> Result<i64> {
        let clean_name = Self::sanitize_title(name)?;

        let row: (i64,) = sqlx::query_as("INSERT INTO accounts (name) VALUES (?) RETURNING id")
            .bind(&clean_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// All configured accounts, in creation order.
    pub async fn get_accounts(&self) -> Result<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>("SELECT id, name FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Rename an account.
    pub async fn rename_account(&self, id: i64, new_name: &str) -> Result<()> {
        let clean_name = Self::sanitize_title(new_name)?;

        sqlx::query("UPDATE accounts SET name = ? WHERE id = ?")
            .bind(&clean_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete an account and everything scoped to it: messages, then feeds,
    /// then categories, then the account row itself.
    ///
    /// The cascade runs as four independent statements, NOT one
    /// transaction. A failed step aborts the cascade and leaves the earlier
    /// steps applied; the failure names the step so the user can report it.
    /// Callers must only drop the in-memory subtree after full success.
    pub async fn delete_account(&self, account_id: i64) -> Result<(), CoreError> {
        let steps: [(&'static str, &'static str); 4] = [
            ("messages", "DELETE FROM messages WHERE account_id = ?"),
            ("feeds", "DELETE FROM feeds WHERE account_id = ?"),
            ("categories", "DELETE FROM categories WHERE account_id = ?"),
            ("account", "DELETE FROM accounts WHERE id = ?"),
        ];

        for (step, statement) in steps {
            if let Err(source) = sqlx::query(statement)
                .bind(account_id)
                .execute(&self.pool)
                .await
            {
                tracing::warn!(account_id, step, error = %source, "account deletion cascade aborted");
                return Err(CoreError::Cascade { step, source });
            }
        }

        Ok(())
    }

    /// Shared title sanitization: strips control characters (ANSI escape
    /// injection prevention), trims whitespace, rejects empty names.
    pub(crate) fn sanitize_title(title: &str) -> Result<String> {
        let sanitized = strip_control_chars(title);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            anyhow::bail!("Title cannot be empty or whitespace-only");
        }
        Ok(trimmed.to_owned())
    }
}
