use std::path::PathBuf;

use chrono::Duration;

use crate::notify::{NotifyPolicy, DEFAULT_DEDUP_WINDOW_SECS};

/// Ten years; anything longer is treated as "forever" anyway.
pub const MAX_DEDUP_WINDOW_SECS: i64 = 10 * 365 * 24 * 3600;

fn string_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    string_env(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Server settings derived from env.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub data_dir: Option<PathBuf>,
    pub dedup_window_secs: i64,
    pub frontend_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: string_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            database_url: string_env("DATABASE_URL"),
            db_max_connections: parsed_env("DB_MAX_CONNECTIONS", 5),
            data_dir: string_env("POSTFEED_DATA_DIR").map(PathBuf::from),
            dedup_window_secs: parsed_env("NOTIFY_DEDUP_WINDOW_SECS", DEFAULT_DEDUP_WINDOW_SECS),
            frontend_url: string_env("FRONTEND_URL"),
        }
    }

    /// Window clamped to `0..=MAX_DEDUP_WINDOW_SECS`.
    pub fn notify_policy(&self) -> NotifyPolicy {
        let secs = self.dedup_window_secs.clamp(0, MAX_DEDUP_WINDOW_SECS);
        NotifyPolicy { dedup_window: Duration::seconds(secs) }
    }
}

/// Session client settings derived from env.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: string_env("API_BASE_URL").unwrap_or_else(|| "http://localhost:8080/api".into()),
            session_file: string_env("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".postfeed/session.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn server_defaults_and_overrides() {
        for k in ["BIND_ADDR", "DATABASE_URL", "DB_MAX_CONNECTIONS", "POSTFEED_DATA_DIR", "NOTIFY_DEDUP_WINDOW_SECS", "FRONTEND_URL"] {
            std::env::remove_var(k);
        }
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.notify_policy().dedup_window, Duration::hours(1));

        std::env::set_var("NOTIFY_DEDUP_WINDOW_SECS", "60");
        std::env::set_var("DB_MAX_CONNECTIONS", "not-a-number");
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.notify_policy().dedup_window, Duration::seconds(60));
        assert_eq!(cfg.db_max_connections, 5);
        std::env::remove_var("NOTIFY_DEDUP_WINDOW_SECS");
        std::env::remove_var("DB_MAX_CONNECTIONS");
    }

    #[test]
    #[serial]
    fn huge_dedup_window_is_clamped() {
        std::env::set_var("NOTIFY_DEDUP_WINDOW_SECS", "9000000000000");
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.notify_policy().dedup_window, Duration::seconds(MAX_DEDUP_WINDOW_SECS));
        std::env::set_var("NOTIFY_DEDUP_WINDOW_SECS", &i64::MAX.to_string());
        assert_eq!(ServerConfig::from_env().notify_policy().dedup_window, Duration::seconds(MAX_DEDUP_WINDOW_SECS));
        std::env::set_var("NOTIFY_DEDUP_WINDOW_SECS", "-5");
        assert_eq!(ServerConfig::from_env().notify_policy().dedup_window, Duration::zero());
        std::env::remove_var("NOTIFY_DEDUP_WINDOW_SECS");
    }

    #[test]
    #[serial]
    fn client_base_url_default() {
        std::env::remove_var("API_BASE_URL");
        assert_eq!(ClientConfig::from_env().api_base_url, "http://localhost:8080/api");
    }
}
