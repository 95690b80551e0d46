use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

/// Which `RemoteStore` backs the study-space collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Shared SQLite file; every client process pointed at it is a writer
    Sqlite,
    /// In-process only (offline demo)
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind '{other}'")),
        }
    }
}

pub struct Config {
    pub store_kind: StoreKind,
    pub store_path: PathBuf,
    pub profile_dir: PathBuf,
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// - `CAMPUS_STORE`: `sqlite` or `memory`
    /// - `CAMPUS_STORE_PATH`: location of the shared store file
    /// - `CAMPUS_PROFILE_PATH`: directory holding the cached profile
    /// - `CAMPUS_POLL_MS`: change watcher interval for the shared store
    pub fn load() -> Self {
        let data_dir = default_data_dir();

        Self {
            store_kind: try_load("CAMPUS_STORE", StoreKind::Sqlite),
            store_path: var("CAMPUS_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("campus.db")),
            profile_dir: var("CAMPUS_PROFILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(data_dir),
            poll_interval: Duration::from_millis(try_load("CAMPUS_POLL_MS", 500u64)),
        }
    }
}

/// Application data directory:
/// - Linux: ~/.local/share/campus-companion
/// - macOS: ~/Library/Application Support/campus-companion
/// - Windows: %APPDATA%\campus-companion
fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(env::temp_dir);
    path.push("campus-companion");
    path
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default:?}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}; using default: {default:?}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("sqlite".parse::<StoreKind>(), Ok(StoreKind::Sqlite));
        assert_eq!(" Memory ".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert!("firebase".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_unset_key_uses_default() {
        let value: u64 = try_load("CAMPUS_TEST_UNSET_KEY_FOR_DEFAULTS", 42);
        assert_eq!(value, 42);
    }
}
