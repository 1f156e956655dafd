//! Environment-driven configuration

use crate::scenarios::ScenarioCatalog;
use crate::store::{FirebaseStore, MemoryStore, Store, StoreResult};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ROUND_DURATION_SECONDS: u64 = 40;
const DEFAULT_JOIN_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_ADMIN_PIN: &str = "654321";

/// Read a non-empty, trimmed environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env_var(key) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(v) if v > 0 => v,
            _ => {
                tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

/// Round timing
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub round_duration: Duration,
    /// Upper bound on the store write when a player joins
    pub join_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(DEFAULT_ROUND_DURATION_SECONDS),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECONDS),
        }
    }
}

impl GameConfig {
    /// ROUND_DURATION_SECONDS and JOIN_TIMEOUT_SECONDS
    pub fn from_env() -> Self {
        let config = Self {
            round_duration: Duration::from_secs(env_u64(
                "ROUND_DURATION_SECONDS",
                DEFAULT_ROUND_DURATION_SECONDS,
            )),
            join_timeout: Duration::from_secs(env_u64(
                "JOIN_TIMEOUT_SECONDS",
                DEFAULT_JOIN_TIMEOUT_SECONDS,
            )),
        };
        tracing::info!(
            "Round duration {}s, join timeout {}s",
            config.round_duration.as_secs(),
            config.join_timeout.as_secs()
        );
        config
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    Firebase {
        database_url: String,
        auth: Option<String>,
    },
}

impl StoreBackend {
    /// STORE_BACKEND=memory|firebase, plus FIREBASE_DATABASE_URL / FIREBASE_AUTH
    pub fn from_env() -> Self {
        match env_var("STORE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            Some("firebase") => match env_var("FIREBASE_DATABASE_URL") {
                Some(database_url) => {
                    tracing::info!("Using Firebase store at {}", database_url);
                    Self::Firebase {
                        database_url,
                        auth: env_var("FIREBASE_AUTH"),
                    }
                }
                None => {
                    tracing::warn!(
                        "STORE_BACKEND=firebase but FIREBASE_DATABASE_URL is not set; falling back to in-memory store"
                    );
                    Self::Memory
                }
            },
            Some("memory") | None => {
                tracing::info!("Using in-memory store");
                Self::Memory
            }
            Some(other) => {
                tracing::warn!("Unknown STORE_BACKEND {:?}; using in-memory store", other);
                Self::Memory
            }
        }
    }

    pub fn build(&self, request_timeout: Duration) -> StoreResult<Arc<dyn Store>> {
        Ok(match self {
            Self::Memory => Arc::new(MemoryStore::new()),
            Self::Firebase { database_url, auth } => Arc::new(FirebaseStore::new(
                database_url,
                auth.clone(),
                request_timeout,
            )?),
        })
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub admin_pin: String,
    pub game: GameConfig,
    pub store: StoreBackend,
    pub scenarios_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr = env_var("BIND_ADDR")
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Invalid BIND_ADDR {:?}: {}", raw, e);
                    None
                }
            })
            .unwrap_or_else(|| {
                DEFAULT_BIND_ADDR
                    .parse()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)))
            });

        let admin_pin = env_var("ADMIN_PIN").unwrap_or_else(|| {
            tracing::warn!("ADMIN_PIN not set, using the default PIN");
            DEFAULT_ADMIN_PIN.to_string()
        });

        Self {
            bind_addr,
            static_dir: env_var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            admin_pin,
            game: GameConfig::from_env(),
            store: StoreBackend::from_env(),
            scenarios_file: env_var("SCENARIOS_FILE").map(PathBuf::from),
        }
    }

    pub fn scenario_catalog(&self) -> ScenarioCatalog {
        match self.scenarios_file {
            Some(ref path) => ScenarioCatalog::from_file(path),
            None => ScenarioCatalog::default(),
        }
    }
}
