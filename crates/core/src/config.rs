use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub queue: QueueSettings,
    pub search: SearchSettings,
    pub postgres: PostgresConfig,
    pub sources: SourcesConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            queue: QueueSettings::from_env(),
            search: SearchSettings::from_env(),
            postgres: PostgresConfig::from_env(),
            sources: SourcesConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  queue:    max_concurrent={}, retry_attempts={}, retry_delay={}s",
            self.queue.max_concurrent,
            self.queue.retry_attempts,
            self.queue.retry_delay_secs
        );
        tracing::info!("  search:   step_timeout={}s", self.search.step_timeout_secs);
        tracing::info!(
            "  postgres: host={}, db={}, configured={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.is_configured()
        );
        tracing::info!(
            "  sources:  [{}]",
            self.sources
                .endpoints
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

// ── Ingestion queue ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
}

impl QueueSettings {
    fn from_env() -> Self {
        Self {
            max_concurrent: env_usize("QUEUE_MAX_CONCURRENT", 5),
            retry_attempts: env_u32("QUEUE_RETRY_ATTEMPTS", 3),
            retry_delay_secs: env_u64("QUEUE_RETRY_DELAY_SECS", 5),
        }
    }
}

// ── Search orchestration ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Per-source step timeout. A slow source is treated like a failed one.
    pub step_timeout_secs: u64,
}

impl SearchSettings {
    fn from_env() -> Self {
        Self {
            step_timeout_secs: env_u64("SEARCH_STEP_TIMEOUT_SECS", 30),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("PG_HOST", "localhost"),
            port: env_u16("PG_PORT", 5432),
            database: env_or("PG_DATABASE", "jobscout"),
            username: env_opt("PG_USERNAME"),
            password: env_opt("PG_PASSWORD"),
            ssl_mode: env_or("PG_SSL_MODE", "prefer"),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Job sources ───────────────────────────────────────────────

/// A named source endpoint, resolved from static configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Configured sources in declaration order. Order is load-bearing:
    /// aggregated results preserve it.
    pub endpoints: Vec<SourceEndpoint>,
}

impl SourcesConfig {
    /// Read `SOURCES` (comma-separated names) plus `{NAME}_SOURCE_URL` per
    /// entry. Names without a URL are skipped with a warning.
    fn from_env() -> Self {
        let mut endpoints = Vec::new();
        for name in parse_source_names(&env_or("SOURCES", "")) {
            let key = format!("{}_SOURCE_URL", name.to_uppercase());
            match env_opt(&key) {
                Some(url) => endpoints.push(SourceEndpoint { name, url }),
                None => tracing::warn!(source = %name, key = %key, "source has no endpoint URL, skipping"),
            }
        }
        Self { endpoints }
    }
}

/// Split a comma-separated source list, trimming and dropping empties.
pub fn parse_source_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
