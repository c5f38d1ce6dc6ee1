//! Write-through settings store over the `user_preferences` table.
//!
//! Values round-trip as strings; keys use dotted groups (`gui.*` holds
//! sort state, `expand.*` holds per-item expansion records, `skin.*` the
//! selected skin). Reads are in-memory O(1); writes persist to the
//! database and update the in-memory map together.

use std::collections::HashMap;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::storage::Database;

/// In-memory mirror of the persisted key/value settings.
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Load every persisted preference into memory.
    pub async fn load(db: &Database) -> Result<Self> {
        let rows = db.get_preferences_by_prefix("").await?;
        Ok(Self {
            values: rows.into_iter().collect(),
        })
    }

    /// Empty settings, for fresh databases and tests.
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a boolean value; absent or unparseable keys yield `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Set a value: writes to the database and the in-memory map.
    pub async fn set(&mut self, db: &Database, key: &str, value: &str) -> Result<()> {
        db.set_preference(key, value).await?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Set a boolean value.
    pub async fn set_bool(&mut self, db: &Database, key: &str, value: bool) -> Result<()> {
        self.set(db, key, if value { "true" } else { "false" }).await
    }

    /// Deserialize a JSON-encoded structured value (e.g. sort state).
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed structured preference");
                None
            }
        }
    }

    /// Serialize and persist a structured value as JSON.
    pub async fn set_json<T: Serialize>(&mut self, db: &Database, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(db, key, &raw).await
    }
}
