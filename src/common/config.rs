use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{ScanError, ScanResult};
use crate::scanner::debounce::{Intervals, RESCAN_CONFIRMATION_THRESHOLD, SCAN_DEBOUNCE_INTERVAL};
use crate::store::Identity;

const PREFS_FILE: &str = "prefs.json";
const DEFAULT_DATA_DIR: &str = ".qrscan";

// App mode
//------------------------------------------------------------------------------

/// Where history and profiles live for this session.
///
/// `Online` scopes every store operation to the signed-in user. `Offline` keeps
/// data in a device-local file under a fixed local identity and never asks for
/// a sign-in.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Online,
    Offline,
}

impl AppMode {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }

    /// File name of the datastore backing this mode.
    pub fn store_file(&self) -> &'static str {
        match self {
            Self::Online => "cloud.json",
            Self::Offline => "offline.json",
        }
    }
}

// Prefs
//------------------------------------------------------------------------------

/// Small key/value state persisted next to the datastore between sessions.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub user: Option<Identity>,
}

impl Prefs {
    pub fn load(data_dir: &Path) -> ScanResult<Option<Self>> {
        let path = data_dir.join(PREFS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let prefs = serde_json::from_str(&raw)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        Ok(Some(prefs))
    }

    pub fn save(&self, data_dir: &Path) -> ScanResult<()> {
        fs::create_dir_all(data_dir)?;
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| ScanError::Config(e.to_string()))?;
        fs::write(data_dir.join(PREFS_FILE), raw)?;
        Ok(())
    }

    pub fn clear(data_dir: &Path) -> ScanResult<()> {
        let path = data_dir.join(PREFS_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn mode(&self) -> AppMode {
        if self.offline {
            AppMode::Offline
        } else {
            AppMode::Online
        }
    }
}

// Config
//------------------------------------------------------------------------------

/// Session configuration, loaded once at session start and passed down to the
/// components that need it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub mode: AppMode,
    pub debounce_interval_ms: i64,
    pub rescan_threshold_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(DEFAULT_DATA_DIR)
    }
}

impl Config {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            mode: AppMode::Online,
            debounce_interval_ms: SCAN_DEBOUNCE_INTERVAL,
            rescan_threshold_ms: RESCAN_CONFIRMATION_THRESHOLD,
        }
    }

    /// Reads `.env` (if present) and the `QRSCAN_*` variables, then lets the
    /// persisted prefs override the mode.
    pub fn load() -> ScanResult<Self> {
        let _ = dotenvy::dotenv();
        let config = Self::from_vars(|k| std::env::var(k).ok())?;
        config.with_prefs()
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> ScanResult<Self> {
        let mut config = match var("QRSCAN_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => Self::with_data_dir(dir),
            _ => Self::default(),
        };
        if let Some(v) = var("QRSCAN_OFFLINE") {
            config.mode = if parse_flag(&v)? { AppMode::Offline } else { AppMode::Online };
        }
        if let Some(v) = var("QRSCAN_DEBOUNCE_MS") {
            config.debounce_interval_ms = parse_ms("QRSCAN_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = var("QRSCAN_RESCAN_MS") {
            config.rescan_threshold_ms = parse_ms("QRSCAN_RESCAN_MS", &v)?;
        }
        Ok(config)
    }

    pub fn with_prefs(mut self) -> ScanResult<Self> {
        match Prefs::load(&self.data_dir) {
            Ok(Some(prefs)) => {
                debug!(offline = prefs.offline, "Applying persisted prefs");
                self.mode = prefs.mode();
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable prefs: {e}"),
        }
        Ok(self)
    }

    pub fn intervals(&self) -> Intervals {
        Intervals { debounce_ms: self.debounce_interval_ms, rescan_ms: self.rescan_threshold_ms }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(self.mode.store_file())
    }
}

fn parse_flag(v: &str) -> ScanResult<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ScanError::Config(format!("QRSCAN_OFFLINE: not a flag: {other}"))),
    }
}

fn parse_ms(key: &str, v: &str) -> ScanResult<i64> {
    match v.trim().parse::<i64>() {
        Ok(ms) if ms >= 0 => Ok(ms),
        _ => Err(ScanError::Config(format!("{key}: expected milliseconds, got {v:?}"))),
    }
}

#[cfg(test)]
mod config_tests {
    use std::collections::HashMap;

    use super::{AppMode, Config, Prefs};
    use crate::store::Identity;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.mode, AppMode::Online);
        assert_eq!(config.debounce_interval_ms, 5000);
        assert_eq!(config.rescan_threshold_ms, 10000);
        assert_eq!(config.store_path(), std::path::Path::new(".qrscan/cloud.json"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_vars(vars(&[
            ("QRSCAN_DATA_DIR", "/tmp/qr"),
            ("QRSCAN_OFFLINE", "yes"),
            ("QRSCAN_DEBOUNCE_MS", "2500"),
            ("QRSCAN_RESCAN_MS", "7000"),
        ]))
        .unwrap();
        assert_eq!(config.mode, AppMode::Offline);
        assert_eq!(config.intervals().debounce_ms, 2500);
        assert_eq!(config.intervals().rescan_ms, 7000);
        assert_eq!(config.store_path(), std::path::Path::new("/tmp/qr/offline.json"));
    }

    #[test]
    fn test_bad_values() {
        assert!(Config::from_vars(vars(&[("QRSCAN_OFFLINE", "maybe")])).is_err());
        assert!(Config::from_vars(vars(&[("QRSCAN_DEBOUNCE_MS", "-5")])).is_err());
        assert!(Config::from_vars(vars(&[("QRSCAN_RESCAN_MS", "soon")])).is_err());
    }

    #[test]
    fn test_prefs_override_mode() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Prefs { offline: true, user: Some(Identity::new("u1", None)) };
        prefs.save(dir.path()).unwrap();

        let config = Config::with_data_dir(dir.path()).with_prefs().unwrap();
        assert_eq!(config.mode, AppMode::Offline);
        assert_eq!(Prefs::load(dir.path()).unwrap(), Some(prefs));

        Prefs::clear(dir.path()).unwrap();
        assert_eq!(Prefs::load(dir.path()).unwrap(), None);
        let config = Config::with_data_dir(dir.path()).with_prefs().unwrap();
        assert_eq!(config.mode, AppMode::Online);
    }
}
