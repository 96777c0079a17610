use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Minimum Jaccard score for a post pair to count as relationship evidence.
    pub similarity_threshold: f64,
    /// Optional YAML lexicon replacing the built-in sentiment table.
    pub lexicon_path: Option<PathBuf>,
    pub store_max_retries: u32,
    pub store_backoff_base_ms: u64,
    pub store_backoff_max_ms: u64,
    /// Upper bound for a whole reconciliation run, enforced by the caller.
    pub reconcile_timeout_secs: u64,
    pub recompute_on_write: bool,
    pub recompute_cron: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("similarity_threshold", &self.similarity_threshold)
            .field("lexicon_path", &self.lexicon_path)
            .field("store_max_retries", &self.store_max_retries)
            .field("store_backoff_base_ms", &self.store_backoff_base_ms)
            .field("store_backoff_max_ms", &self.store_backoff_max_ms)
            .field("reconcile_timeout_secs", &self.reconcile_timeout_secs)
            .field("recompute_on_write", &self.recompute_on_write)
            .field("recompute_cron", &self.recompute_cron)
            .finish()
    }
}
