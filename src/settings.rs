use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::scan::CreditType;

const DATA_DIR_ENV: &str = "SCANFLOW_DATA_DIR";
const DEBUG_ENV: &str = "SCANFLOW_DEBUG";
const USER_ENV: &str = "SCANFLOW_USER";

/// Directory holding the database and settings file. `SCANFLOW_DATA_DIR`
/// overrides the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("scanflow"))
        .ok_or_else(|| anyhow!("no platform data directory; set {DATA_DIR_ENV}"))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// User whose session snapshot is recovered at startup.
pub fn recovery_user() -> Option<String> {
    std::env::var(USER_ENV)
        .ok()
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanSettings {
    /// Keep a crash-recovery snapshot of the active session on disk.
    pub persist_snapshots: bool,
    /// Applied to every new session while it is capturing.
    pub default_currency: Option<String>,
    pub default_credit_type: CreditType,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            persist_snapshots: true,
            default_currency: None,
            default_credit_type: CreditType::Normal,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    scan: ScanSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scan(&self) -> ScanSettings {
        match self.data.read() {
            Ok(guard) => guard.scan.clone(),
            Err(poisoned) => poisoned.into_inner().scan.clone(),
        }
    }

    pub fn update_scan(&self, settings: ScanSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.scan = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
