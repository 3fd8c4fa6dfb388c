//! Environment helpers
//!
//! Configuration structs live next to the code they configure; this module
//! only knows how to read raw values out of the process environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

/// Outcome of [`load_dotenv`]
pub type DotenvResult = Result<Option<PathBuf>, dotenv::Error>;

/// Load variables from a `.env` file in the working directory (or a parent).
///
/// Returns the path of the loaded file, or `None` when there is no file.
/// Variables already set in the environment are not overridden. Nothing is
/// logged here so this can run before tracing is set up; hand the result to
/// [`report_dotenv`] once it is.
pub fn load_dotenv() -> DotenvResult {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Load variables from a specific env file
///
/// Unlike [`load_dotenv`], a missing file is an error.
pub fn load_dotenv_from(path: impl AsRef<Path>) -> DotenvResult {
    let path = path.as_ref();
    dotenv::from_path(path).map(|()| Some(path.to_path_buf()))
}

/// Log the outcome of [`load_dotenv`]
///
/// Returns `true` when a file was loaded.
pub fn report_dotenv(result: &DotenvResult) -> bool {
    match result {
        Ok(Some(path)) => {
            debug!("Loaded environment from {}", path.display());
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Ignoring unreadable env file: {}", e);
            false
        }
    }
}

/// Read a variable, treating unset and blank values as absent
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable
///
/// Values that fail to parse are logged and treated as absent so a typo in
/// the environment falls back to the built-in default.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
