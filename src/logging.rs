use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Environment variable that turns logging on and carries the filter
pub const LOG_ENV: &str = "DSST_LOG";

/// Send tracing output to `path`. The terminal belongs to the UI, so logs
/// never go to stdout or stderr.
///
/// The filter comes from `DSST_LOG` when set, otherwise `info`.
pub fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (tests, restarts) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

/// Logging is off unless a log file is given or `DSST_LOG` is set
pub fn enabled_by_env() -> bool {
    std::env::var_os(LOG_ENV).is_some_and(|v| !v.is_empty())
}
