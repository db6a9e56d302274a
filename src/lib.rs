// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod assessment;
pub mod cutoff;
pub mod error;
pub mod grid;
pub mod input;
pub mod logging;
pub mod navigation;
pub mod results;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod symbol;

pub use error::{Error, Result};
