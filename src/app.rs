use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 25;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_mailbox() -> String {
    "personal".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            user_id: None,
            page_size: DEFAULT_PAGE_SIZE,
            mailbox: default_mailbox(),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
    // TOML is the primary format. An older JSON state file is still read and rewritten as TOML.
    pub fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let cfg_dir = base.config_dir();
        Some(cfg_dir.join("nexus.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "example", "NexusCRM")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub fn load() -> Self {
        if let Some(path) = Self::toml_path() {
            match Self::load_from(&path) {
                Ok(Some(state)) => return state,
                Ok(None) => {}
                Err(e) => log::warn!("ignoring unreadable config {}: {e}", path.display()),
            }
        }

        if let Some(legacy) = Self::legacy_json_path() {
            if let Ok(bytes) = fs::read(&legacy) {
                if let Ok(state) = serde_json::from_slice::<AppState>(&bytes) {
                    log::info!("migrating {} to TOML", legacy.display());
                    if let Err(e) = state.save() {
                        log::warn!("could not write migrated config: {e}");
                    }
                    return state;
                }
            }
        }

        Self::new()
    }

    /// Reads a TOML state file. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&text)?))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path().ok_or_else(|| Error::Config("no config dir".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml)?;
        Ok(())
    }
}
