use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use crate::cutoff::{CutoffTime, DEFAULT_CUTOFF_TIME};
use crate::error::{Error, Result};

pub const DEFAULT_REDIRECT_URL: &str = "https://www.viedoc.com/login";

/// Admin-editable settings persisted across sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_redirect_url")]
    redirect_url: String,
    #[serde(default = "default_cutoff_time")]
    cutoff_time: String,
}

fn default_redirect_url() -> String {
    DEFAULT_REDIRECT_URL.to_string()
}

fn default_cutoff_time() -> String {
    DEFAULT_CUTOFF_TIME.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redirect_url: default_redirect_url(),
            cutoff_time: default_cutoff_time(),
        }
    }
}

impl Settings {
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn cutoff_time_str(&self) -> &str {
        &self.cutoff_time
    }

    /// Parsed cutoff; a hand-edited file with a bad value falls back to the default
    pub fn cutoff_time(&self) -> CutoffTime {
        self.cutoff_time.parse().unwrap_or_default()
    }

    pub fn set_redirect_url(&mut self, raw: &str) -> Result<()> {
        self.redirect_url = normalize_redirect_url(raw)?;
        Ok(())
    }

    pub fn set_cutoff_time(&mut self, raw: &str) -> Result<()> {
        let parsed: CutoffTime = raw.parse()?;
        self.cutoff_time = parsed.to_string();
        Ok(())
    }
}

/// Prefix `https://` when no http(s) scheme is given, then require an
/// absolute http(s) URL with a host
pub fn normalize_redirect_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl(raw.to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    let http_scheme = matches!(parsed.scheme(), "http" | "https");
    let has_host = parsed.host_str().is_some_and(|h| !h.is_empty());
    if !http_scheme || !has_host {
        return Err(Error::InvalidUrl(raw.to_string()));
    }

    Ok(candidate)
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "dsst") {
            pd.config_dir().join("settings.json")
        } else {
            PathBuf::from("dsst_settings.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "unreadable settings, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.redirect_url(), DEFAULT_REDIRECT_URL);
        assert_eq!(settings.cutoff_time_str(), "23:59");
        assert_eq!(settings.cutoff_time(), CutoffTime::default());
    }

    #[test]
    fn test_normalize_adds_https() {
        assert_eq!(
            normalize_redirect_url("example.com/form").unwrap(),
            "https://example.com/form"
        );
    }

    #[test]
    fn test_normalize_keeps_existing_scheme() {
        assert_eq!(
            normalize_redirect_url("HTTP://example.com").unwrap(),
            "HTTP://example.com"
        );
        assert_eq!(
            normalize_redirect_url("https://example.com/a?b=c").unwrap(),
            "https://example.com/a?b=c"
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_matches!(normalize_redirect_url(""), Err(Error::InvalidUrl(_)));
        assert_matches!(normalize_redirect_url("   "), Err(Error::InvalidUrl(_)));
        assert_matches!(normalize_redirect_url("not a url"), Err(Error::InvalidUrl(_)));
        assert_matches!(normalize_redirect_url("https://"), Err(Error::InvalidUrl(_)));
    }

    #[test]
    fn test_setters_leave_value_on_error() {
        let mut settings = Settings::default();
        assert!(settings.set_redirect_url("exa mple").is_err());
        assert_eq!(settings.redirect_url(), DEFAULT_REDIRECT_URL);
        assert!(settings.set_cutoff_time("25:00").is_err());
        assert_eq!(settings.cutoff_time_str(), "23:59");
    }

    #[test]
    fn test_cutoff_setter_normalizes() {
        let mut settings = Settings::default();
        settings.set_cutoff_time("9:30").unwrap();
        assert_eq!(settings.cutoff_time_str(), "09:30");
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("nested").join("settings.json"));
        let mut settings = Settings::default();
        settings.set_redirect_url("survey.example.org").unwrap();
        settings.set_cutoff_time("18:45").unwrap();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"cutoff_time":"07:15"}"#).unwrap();
        let loaded = FileSettingsStore::with_path(&path).load();
        assert_eq!(loaded.cutoff_time_str(), "07:15");
        assert_eq!(loaded.redirect_url(), DEFAULT_REDIRECT_URL);
    }

    #[test]
    fn test_corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{not json").unwrap();
        assert_eq!(FileSettingsStore::with_path(&path).load(), Settings::default());
    }
}
