//! Engine configuration and snapshot durability levels

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How hard a snapshot write tries to reach stable storage.
///
/// The snapshot is always written to a temporary file and renamed over the
/// target, so a reader never sees a half-written document. The level only
/// decides whether the bytes are fsynced before the rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityLevel {
    /// fsync the temporary file and its directory before returning.
    ///
    /// A crash after the statement returns never loses the snapshot.
    Synchronous,

    /// Leave flushing to the OS. Test and benchmark use only.
    NoSync,
}

impl Default for DurabilityLevel {
    fn default() -> Self {
        DurabilityLevel::Synchronous
    }
}

impl DurabilityLevel {
    pub fn requires_sync(&self) -> bool {
        matches!(self, DurabilityLevel::Synchronous)
    }

    pub fn description(&self) -> &'static str {
        match self {
            DurabilityLevel::Synchronous => "fsync every snapshot",
            DurabilityLevel::NoSync => "no fsync (unsafe)",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one `<db>.json` snapshot per database
    pub data_dir: PathBuf,

    /// When false, databases live in memory only and nothing touches disk
    pub persist: bool,

    /// Snapshot durability
    pub durability: DurabilityLevel,

    /// Number of compiled LIKE patterns kept per evaluator
    pub like_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            persist: true,
            durability: DurabilityLevel::default(),
            like_cache_capacity: 128,
        }
    }
}

impl EngineConfig {
    /// Persistent engine rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Memory-only engine, nothing is written to disk
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Default::default()
        }
    }

    /// Defaults overridden by `PESADB_DATA_DIR`, `PESADB_PERSIST` and `PESADB_DURABILITY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("PESADB_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(flag) = std::env::var("PESADB_PERSIST") {
            config.persist = parse_flag(&flag).unwrap_or(config.persist);
        }
        if let Ok(level) = std::env::var("PESADB_DURABILITY") {
            if level.eq_ignore_ascii_case("nosync") || level.eq_ignore_ascii_case("none") {
                config.durability = DurabilityLevel::NoSync;
            }
        }
        config
    }

    /// Snapshot path for a database
    pub fn snapshot_path(&self, database: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", database))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.persist);
        assert_eq!(config.durability, DurabilityLevel::Synchronous);
        assert_eq!(config.snapshot_path("main"), PathBuf::from("./data/main.json"));
    }

    #[test]
    fn test_in_memory() {
        assert!(!EngineConfig::in_memory().persist);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
