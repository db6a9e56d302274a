use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("dsst");
            Some(state_dir.join("results.db"))
        } else {
            ProjectDirs::from("", "", "dsst")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("results.db"))
        }
    }

    pub fn log_path() -> PathBuf {
        Self::db_path()
            .and_then(|p| p.parent().map(|dir| dir.join("dsst.log")))
            .unwrap_or_else(|| PathBuf::from("dsst.log"))
    }
}
