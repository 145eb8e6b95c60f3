pub mod snapshot;
pub mod store;

pub use snapshot::{PersistenceStore, TimerSnapshot};
pub use store::{MemoryStore, SnapshotStore, SqliteStore};

use std::path::PathBuf;

/// Returns `~/.config/primepath[-dev]/` based on PRIMEPATH_ENV.
///
/// Set PRIMEPATH_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PRIMEPATH_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("primepath-dev")
    } else {
        base_dir.join("primepath")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
