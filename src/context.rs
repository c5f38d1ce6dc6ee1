//! Explicit dependency injection for the core.
//!
//! The original design reached for a global application singleton for the
//! database, settings and update lock; here every component receives this
//! context (or the individual handles) at construction instead.

use anyhow::Result;

use crate::config::Config;
use crate::lock::UpdateLock;
use crate::prefs::Settings;
use crate::storage::Database;

/// Handles shared by every core operation.
pub struct CoreContext {
    pub db: Database,
    pub settings: Settings,
    pub update_lock: UpdateLock,
}

impl CoreContext {
    /// Open the database named by the config (or the given fallback path),
    /// load settings and create the update lock.
    pub async fn init(config: &Config, fallback_db_path: &str) -> Result<Self> {
        let path = if config.database_path.is_empty() {
            fallback_db_path
        } else {
            config.database_path.as_str()
        };

        let db = Database::open(path).await?;
        let settings = Settings::load(&db).await?;

        Ok(Self {
            db,
            settings,
            update_lock: UpdateLock::new(),
        })
    }
}
