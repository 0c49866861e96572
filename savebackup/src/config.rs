use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SAVES_DIR_NAME: &str = "saves";
pub const TRAY_DIR_NAME: &str = "Tray";
pub const MODS_DIR_NAME: &str = "Mods";
pub const ACCOUNT_DATA_FILE: &str = "accountDataDB.package";
pub const BACKUP_ROOT_NAME: &str = "Sims 4 Backup";

const CONFIG_DIR_NAME: &str = "savebackup";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config directory is unavailable")]
    MissingConfigDir,
}

/// Persisted run settings. Loaded once before the run and written back once
/// afterwards; the sync core never touches the file mid-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub game_dir: PathBuf,
    pub backup_saves: bool,
    pub backup_tray: bool,
    pub backup_account_data: bool,
    pub backup_mods: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            game_dir: default_game_dir(),
            backup_saves: true,
            backup_tray: true,
            backup_account_data: true,
            backup_mods: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    SingleFile,
}

/// One named unit of local data eligible for backup. Immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedItem {
    pub name: &'static str,
    pub kind: ItemKind,
    pub enabled: bool,
}

impl Settings {
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("SAVEBACKUP_GAME_DIR") {
            self.game_dir = match dirs::home_dir() {
                Some(home) => expand_with_home(&value, &home),
                None => PathBuf::from(value),
            };
        }
        if let Some(value) = read_opt_bool_env("SAVEBACKUP_BACKUP_SAVES") {
            self.backup_saves = value;
        }
        if let Some(value) = read_opt_bool_env("SAVEBACKUP_BACKUP_TRAY") {
            self.backup_tray = value;
        }
        if let Some(value) = read_opt_bool_env("SAVEBACKUP_BACKUP_ACCOUNT_DATA") {
            self.backup_account_data = value;
        }
        if let Some(value) = read_opt_bool_env("SAVEBACKUP_BACKUP_MODS") {
            self.backup_mods = value;
        }
    }

    /// The fixed set of backup candidates, in processing order.
    pub fn tracked_items(&self) -> [TrackedItem; 4] {
        [
            TrackedItem {
                name: SAVES_DIR_NAME,
                kind: ItemKind::Folder,
                enabled: self.backup_saves,
            },
            TrackedItem {
                name: TRAY_DIR_NAME,
                kind: ItemKind::Folder,
                enabled: self.backup_tray,
            },
            TrackedItem {
                name: MODS_DIR_NAME,
                kind: ItemKind::Folder,
                enabled: self.backup_mods,
            },
            TrackedItem {
                name: ACCOUNT_DATA_FILE,
                kind: ItemKind::SingleFile,
                enabled: self.backup_account_data,
            },
        ]
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(value) = std::env::var("SAVEBACKUP_CONFIG") {
        return Ok(PathBuf::from(value));
    }
    let base = dirs::config_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn default_game_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(std::env::temp_dir)
        .join("Electronic Arts")
        .join("The Sims 4")
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_opt_bool_env(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_back_up_everything_except_mods() {
        let settings = Settings::default();
        assert!(settings.backup_saves);
        assert!(settings.backup_tray);
        assert!(settings.backup_account_data);
        assert!(!settings.backup_mods);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut settings = Settings::default();
        settings.game_dir = PathBuf::from("/tmp/sims");
        settings.backup_tray = false;

        settings.save(&path).unwrap();
        let loaded = Settings::load_or_default(&path).unwrap();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn persisted_format_uses_camel_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        Settings::default().save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"gameDir\""));
        assert!(raw.contains("\"backupSaves\""));
        assert!(raw.contains("\"backupAccountData\""));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded = Settings::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"backupSaves": false}"#).unwrap();

        let loaded = Settings::load_or_default(&path).unwrap();
        assert!(!loaded.backup_saves);
        assert!(loaded.backup_tray);
    }

    #[test]
    fn tracked_items_follow_enable_flags() {
        let mut settings = Settings::default();
        settings.backup_tray = false;
        let items = settings.tracked_items();

        let tray = items.iter().find(|i| i.name == TRAY_DIR_NAME).unwrap();
        assert!(!tray.enabled);
        assert_eq!(tray.kind, ItemKind::Folder);

        let account = items.iter().find(|i| i.name == ACCOUNT_DATA_FILE).unwrap();
        assert!(account.enabled);
        assert_eq!(account.kind, ItemKind::SingleFile);
    }

    #[test]
    fn expand_with_home_resolves_tilde_prefix() {
        let home = PathBuf::from("/home/player");
        assert_eq!(
            expand_with_home("~/Documents", &home),
            PathBuf::from("/home/player/Documents")
        );
        assert_eq!(expand_with_home("~", &home), home);
        assert_eq!(
            expand_with_home("/absolute", &home),
            PathBuf::from("/absolute")
        );
    }

    #[test]
    fn unset_bool_env_reads_as_none() {
        assert_eq!(read_opt_bool_env("SAVEBACKUP_DOES_NOT_EXIST_123"), None);
    }
}
