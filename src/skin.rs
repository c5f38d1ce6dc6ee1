//! Skin descriptors.
//!
//! A skin is a named folder carrying a `metadata.toml` descriptor plus a
//! raw stylesheet blob. Only descriptor loading and the fallback chain
//! live here; applying styles is the view's business.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::prefs::Settings;
use crate::storage::Database;

/// Skin loaded when nothing is selected and the config names none.
pub const DEFAULT_SKIN: &str = "plain";

const METADATA_FILE: &str = "metadata.toml";
const STYLESHEET_FILE: &str = "theme.css";
const SELECTED_KEY: &str = "skin.selected";

// Stylesheets reference bundled assets through this placeholder; it is
// rewritten to the skin folder's absolute path at load time.
const PATH_PLACEHOLDER: &str = "##";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SkinError {
    #[error("skin '{0}' not found in any skin folder")]
    NotFound(String),

    #[error("failed to read skin files: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid skin metadata: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("skin '{0}' has an incomplete descriptor")]
    Incomplete(String),
}

// ============================================================================
// Descriptor
// ============================================================================

#[derive(Debug, Deserialize)]
struct SkinMetadata {
    name: String,
    version: String,
    author: AuthorMetadata,
}

#[derive(Debug, Deserialize)]
struct AuthorMetadata {
    name: String,
    #[serde(default)]
    email: String,
}

/// A fully loaded skin.
#[derive(Debug, Clone)]
pub struct Skin {
    /// Folder name, the skin's stable identifier.
    pub folder_name: String,
    pub visible_name: String,
    pub author: String,
    pub email: String,
    pub version: String,
    /// Stylesheet blob with asset paths already resolved.
    pub raw_stylesheet: String,
}

// ============================================================================
// Factory
// ============================================================================

/// Locates and parses skins from the app base folder and the user folder,
/// searched in that order.
pub struct SkinFactory {
    folders: Vec<PathBuf>,
}

impl SkinFactory {
    pub fn new(base_folder: PathBuf, user_folder: PathBuf) -> Self {
        Self {
            folders: vec![base_folder, user_folder],
        }
    }

    /// Load the skin the settings select, falling back to `default_name`.
    /// Both failing is an error; the caller decides how fatal that is.
    pub fn load_current(
        &self,
        settings: &Settings,
        default_name: &str,
    ) -> Result<Skin, SkinError> {
        let mut names = Vec::new();
        if let Some(selected) = settings.get(SELECTED_KEY) {
            names.push(selected.to_string());
        }
        names.push(default_name.to_string());

        let mut last_err = SkinError::NotFound(default_name.to_string());
        for name in names {
            match self.skin_info(&name) {
                Ok(skin) => {
                    tracing::debug!(skin = %skin.folder_name, "skin loaded");
                    return Ok(skin);
                }
                Err(e) => {
                    tracing::warn!(skin = %name, error = %e, "failed to load skin");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Persist the selection for the next startup.
    pub async fn set_current(
        settings: &mut Settings,
        db: &Database,
        name: &str,
    ) -> anyhow::Result<()> {
        settings.set(db, SELECTED_KEY, name).await
    }

    /// Parse one skin by folder name, searching base then user folder.
    pub fn skin_info(&self, name: &str) -> Result<Skin, SkinError> {
        for base in &self.folders {
            let folder = base.join(name);
            let metadata_path = folder.join(METADATA_FILE);
            if !metadata_path.exists() {
                continue;
            }

            let metadata: SkinMetadata =
                toml::from_str(&std::fs::read_to_string(&metadata_path)?)?;
            if metadata.name.is_empty()
                || metadata.version.is_empty()
                || metadata.author.name.is_empty()
            {
                return Err(SkinError::Incomplete(name.to_string()));
            }

            return Ok(Skin {
                folder_name: name.to_string(),
                visible_name: metadata.name,
                author: metadata.author.name,
                email: metadata.author.email,
                version: metadata.version,
                raw_stylesheet: read_stylesheet(&folder),
            });
        }
        Err(SkinError::NotFound(name.to_string()))
    }

    /// Every parseable skin across both folders, base folder first.
    pub fn installed_skins(&self) -> Vec<Skin> {
        let mut skins = Vec::new();
        for base in &self.folders {
            let Ok(entries) = std::fs::read_dir(base) else {
                continue;
            };
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            names.sort();

            for name in names {
                if skins.iter().any(|s: &Skin| s.folder_name == name) {
                    continue;
                }
                if let Ok(skin) = self.skin_info(&name) {
                    skins.push(skin);
                }
            }
        }
        skins
    }
}

/// Missing stylesheet is not an error, an empty blob applies nothing.
fn read_stylesheet(folder: &Path) -> String {
    match std::fs::read_to_string(folder.join(STYLESHEET_FILE)) {
        Ok(raw) => raw.replace(PATH_PLACEHOLDER, &folder.to_string_lossy()),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_skin(base: &Path, folder: &str, visible: &str, css: Option<&str>) {
        let dir = base.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(METADATA_FILE),
            format!(
                "name = \"{visible}\"\nversion = \"1.0\"\n\n[author]\nname = \"Jo\"\nemail = \"jo@example.com\"\n"
            ),
        )
        .unwrap();
        if let Some(css) = css {
            std::fs::write(dir.join(STYLESHEET_FILE), css).unwrap();
        }
    }

    fn factory(base: &TempDir, user: &TempDir) -> SkinFactory {
        SkinFactory::new(base.path().to_path_buf(), user.path().to_path_buf())
    }

    #[test]
    fn test_skin_info_parses_descriptor() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skin(base.path(), "plain", "Plain", Some("body {}"));

        let skin = factory(&base, &user).skin_info("plain").unwrap();
        assert_eq!(skin.visible_name, "Plain");
        assert_eq!(skin.author, "Jo");
        assert_eq!(skin.version, "1.0");
        assert_eq!(skin.raw_stylesheet, "body {}");
    }

    #[test]
    fn test_stylesheet_placeholder_resolves_to_skin_folder() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skin(base.path(), "plain", "Plain", Some("url(##/bg.png)"));

        let skin = factory(&base, &user).skin_info("plain").unwrap();
        let expected = format!("url({}/bg.png)", base.path().join("plain").display());
        assert_eq!(skin.raw_stylesheet, expected);
    }

    #[test]
    fn test_base_folder_wins_over_user_folder() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skin(base.path(), "plain", "Base Plain", None);
        write_skin(user.path(), "plain", "User Plain", None);

        let skin = factory(&base, &user).skin_info("plain").unwrap();
        assert_eq!(skin.visible_name, "Base Plain");
    }

    #[tokio::test]
    async fn test_load_current_falls_back_to_default() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skin(base.path(), DEFAULT_SKIN, "Plain", None);

        // Settings select a skin that does not exist on disk
        let db = Database::open(":memory:").await.unwrap();
        let mut settings = Settings::empty();
        settings.set(&db, SELECTED_KEY, "missing").await.unwrap();

        let skin = factory(&base, &user)
            .load_current(&settings, DEFAULT_SKIN)
            .unwrap();
        assert_eq!(skin.folder_name, DEFAULT_SKIN);
    }

    #[test]
    fn test_missing_skin_is_not_found() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();

        let err = factory(&base, &user).skin_info("ghost").unwrap_err();
        assert!(matches!(err, SkinError::NotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_installed_skins_deduplicates_by_folder_name() {
        let base = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skin(base.path(), "plain", "Base Plain", None);
        write_skin(user.path(), "plain", "User Plain", None);
        write_skin(user.path(), "dark", "Dark", None);

        let skins = factory(&base, &user).installed_skins();
        let names: Vec<&str> = skins.iter().map(|s| s.visible_name.as_str()).collect();
        assert_eq!(names, vec!["Base Plain", "Dark"]);
    }
}
