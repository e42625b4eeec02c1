//! Server configuration read from the environment

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Which storage backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl StoreKind {
    fn from_setting(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" | "db" => Some(StoreKind::Sqlite),
            "memory" | "mem" | "in-memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub generation_timeout: Duration,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = non_empty("ROUNDTABLE_PORT")
            .and_then(|p| {
                let parsed = p.trim().parse().ok();
                if parsed.is_none() {
                    tracing::warn!(value = %p, "Invalid ROUNDTABLE_PORT, using default");
                }
                parsed
            })
            .unwrap_or(DEFAULT_PORT);

        let store = non_empty("ROUNDTABLE_STORE")
            .and_then(|s| {
                let parsed = StoreKind::from_setting(&s);
                if parsed.is_none() {
                    tracing::warn!(value = %s, "Unknown ROUNDTABLE_STORE, using sqlite");
                }
                parsed
            })
            .unwrap_or(StoreKind::Sqlite);

        let db_path = non_empty("ROUNDTABLE_DB_PATH").map_or_else(
            || {
                let home = non_empty("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".roundtable").join("roundtable.db")
            },
            PathBuf::from,
        );

        let generation_timeout = non_empty("ROUNDTABLE_GENERATION_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS);

        let cors_origins = non_empty("ROUNDTABLE_CORS_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty() && *o != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            port,
            store,
            db_path,
            generation_timeout: Duration::from_secs(generation_timeout),
            cors_origins,
        }
    }
}
