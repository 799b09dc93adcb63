use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout_ms() -> u64 { 3000 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Knobs for the purchase critical section
#[derive(Debug, Deserialize, Clone)]
pub struct PurchaseConfig {
    /// How long a purchase waits for a ticket type's row lock before failing.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_purchase_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_lock_timeout_ms() -> u64 { 5000 }
fn default_purchase_attempts() -> u32 { 3 }
fn default_backoff_ms() -> u64 { 50 }

impl PurchaseConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_attempts: default_purchase_attempts(),
            retry_backoff_ms: default_backoff_ms(),
        }
    }
}

/// Post-commit code issuing
#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_artifact_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_artifact_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_queue_capacity() -> usize { 1024 }
fn default_artifact_attempts() -> u32 { 5 }
fn default_artifact_backoff_ms() -> u64 { 200 }

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_artifact_attempts(),
            retry_backoff_ms: default_artifact_backoff_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `BOXOFFICE_PURCHASE__LOCK_TIMEOUT_MS=2000`
            .add_source(config::Environment::with_prefix("BOXOFFICE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
