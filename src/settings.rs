//! Runtime configuration.
//!
//! Resolved in layers: built-in defaults, then an optional JSON file named by
//! `STRESS_GAUGE_CONFIG`, then individual environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{session::DEFAULT_TTL_SECS, upload::UploadLimits};

pub const CONFIG_FILE_VAR: &str = "STRESS_GAUGE_CONFIG";
pub const MODEL_PATH_VAR: &str = "STRESS_GAUGE_MODEL_PATH";
pub const SESSION_DB_VAR: &str = "STRESS_GAUGE_SESSION_DB";
pub const SESSION_TTL_VAR: &str = "STRESS_GAUGE_SESSION_TTL_SECS";
pub const MAX_UPLOAD_VAR: &str = "STRESS_GAUGE_MAX_UPLOAD_BYTES";
pub const DEBUG_VAR: &str = "STRESS_GAUGE_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON pipeline artifact loaded once at startup.
    pub model_path: PathBuf,
    /// SQLite file for session payloads; `None` keeps them in memory.
    pub session_db_path: Option<PathBuf>,
    pub session_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/stress_pipeline.json"),
            session_db_path: None,
            session_ttl_secs: DEFAULT_TTL_SECS,
            max_upload_bytes: UploadLimits::default().max_bytes,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an injectable variable lookup.
    pub fn from_sources<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_VAR).filter(|v| !v.trim().is_empty()) {
            Some(path) => Self::from_file(Path::new(path.trim()))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config in {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MODEL_PATH_VAR) {
            self.model_path = PathBuf::from(value.trim());
        }
        if let Some(value) = lookup(SESSION_DB_VAR) {
            let value = value.trim();
            self.session_db_path = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        if let Some(value) = lookup(SESSION_TTL_VAR) {
            self.session_ttl_secs = value
                .trim()
                .parse()
                .with_context(|| format!("{SESSION_TTL_VAR} must be a whole number of seconds"))?;
        }
        if let Some(value) = lookup(MAX_UPLOAD_VAR) {
            self.max_upload_bytes = value
                .trim()
                .parse()
                .with_context(|| format!("{MAX_UPLOAD_VAR} must be a byte count"))?;
        }
        if let Some(value) = lookup(DEBUG_VAR) {
            let value = value.trim();
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_sources(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.session_ttl_secs, 3600);
        assert!(config.session_db_path.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_sources(lookup(&[
            (MODEL_PATH_VAR, "/srv/model.json"),
            (SESSION_DB_VAR, "/var/lib/stress/sessions.sqlite3"),
            (SESSION_TTL_VAR, " 120 "),
            (MAX_UPLOAD_VAR, "1024"),
            (DEBUG_VAR, "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(
            config.session_db_path,
            Some(PathBuf::from("/var/lib/stress/sessions.sqlite3"))
        );
        assert_eq!(config.session_ttl_secs, 120);
        assert_eq!(config.upload_limits().max_bytes, 1024);
        assert!(config.debug);
    }

    #[test]
    fn file_is_layered_under_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model_path": "from-file.json", "session_ttl_secs": 30, "debug": true }}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = AppConfig::from_sources(lookup(&[
            (CONFIG_FILE_VAR, path.as_str()),
            (SESSION_TTL_VAR, "90"),
        ]))
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("from-file.json"));
        assert_eq!(config.session_ttl_secs, 90);
        assert!(config.debug);
        assert_eq!(config.max_upload_bytes, AppConfig::default().max_upload_bytes);
    }

    #[test]
    fn empty_session_db_means_memory() {
        let config = AppConfig::from_sources(lookup(&[(SESSION_DB_VAR, "")])).unwrap();
        assert!(config.session_db_path.is_none());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = AppConfig::from_sources(lookup(&[(SESSION_TTL_VAR, "an hour")])).unwrap_err();
        assert!(err.to_string().contains(SESSION_TTL_VAR));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err =
            AppConfig::from_sources(lookup(&[(CONFIG_FILE_VAR, "/nonexistent/stress.json")]))
                .unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
