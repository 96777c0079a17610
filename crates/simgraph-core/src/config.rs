use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Default minimum similarity for a post pair to become relationship evidence.
///
/// Tuning this affects result quality only; correctness does not depend on it.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

/// Default number of extra attempts for a store operation after a transient failure.
pub const DEFAULT_STORE_MAX_RETRIES: u32 = 3;

/// Default delay before the first store retry. Doubles on each later attempt.
pub const DEFAULT_STORE_BACKOFF_BASE_MS: u64 = 200;

/// Default cap on a single store retry delay.
pub const DEFAULT_STORE_BACKOFF_MAX_MS: u64 = 5_000;

/// Default upper bound for one whole reconciliation run.
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("SIMGRAPH_ENV", "development"))?;

    let bind_addr = parse("SIMGRAPH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("SIMGRAPH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SIMGRAPH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SIMGRAPH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SIMGRAPH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SIMGRAPH_DB_MIN_CONNECTIONS",
            format!("must not exceed SIMGRAPH_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let similarity_threshold = parse_threshold(&or_default(
        "SIMGRAPH_SIMILARITY_THRESHOLD",
        &DEFAULT_SIMILARITY_THRESHOLD.to_string(),
    ))?;
    let lexicon_path = lookup("SIMGRAPH_LEXICON_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let store_max_retries = parse_u32(
        "SIMGRAPH_STORE_MAX_RETRIES",
        &DEFAULT_STORE_MAX_RETRIES.to_string(),
    )?;
    let store_backoff_base_ms = parse_u64(
        "SIMGRAPH_STORE_BACKOFF_BASE_MS",
        &DEFAULT_STORE_BACKOFF_BASE_MS.to_string(),
    )?;
    let store_backoff_max_ms = parse_u64(
        "SIMGRAPH_STORE_BACKOFF_MAX_MS",
        &DEFAULT_STORE_BACKOFF_MAX_MS.to_string(),
    )?;
    if store_backoff_max_ms < store_backoff_base_ms {
        return Err(invalid(
            "SIMGRAPH_STORE_BACKOFF_MAX_MS",
            format!("must not be below SIMGRAPH_STORE_BACKOFF_BASE_MS ({store_backoff_base_ms})"),
        ));
    }
    let reconcile_timeout_secs = parse_u64(
        "SIMGRAPH_RECONCILE_TIMEOUT_SECS",
        &DEFAULT_RECONCILE_TIMEOUT_SECS.to_string(),
    )?;
    if reconcile_timeout_secs == 0 {
        return Err(invalid(
            "SIMGRAPH_RECONCILE_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let recompute_on_write = parse_bool("SIMGRAPH_RECOMPUTE_ON_WRITE", "true")?;
    let recompute_cron = lookup("SIMGRAPH_RECOMPUTE_CRON")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        similarity_threshold,
        lexicon_path,
        store_max_retries,
        store_backoff_base_ms,
        store_backoff_max_ms,
        reconcile_timeout_secs,
        recompute_on_write,
        recompute_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SIMGRAPH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Parse a similarity threshold, which must be a finite value in `[0, 1]`.
fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "SIMGRAPH_SIMILARITY_THRESHOLD".to_string(),
        reason,
    };
    let value = raw.trim().parse::<f64>().map_err(|e| invalid(e.to_string()))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{value} is outside [0, 1]")));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
