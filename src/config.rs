// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once at startup from the environment (optionally
//! seeded from a `.env` file in the working directory) and is immutable
//! afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SECRET_KEY` | Field encryption key, 16/24/32 raw bytes (AES-128/192/256) | Required |
//! | `DATA_DIR` | Directory holding the database file | `./data` |
//! | `DB_NAME` | Database name; file is `{DATA_DIR}/{DB_NAME}.redb` | `users` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `STORE_TIMEOUT_MS` | Bound on each document store call | `5000` |
//! | `STORE_BACKEND` | `redb` or `memory` | `redb` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

/// Environment variable name for the field encryption key.
///
/// The raw bytes of the value are the key. Never persisted, never logged.
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the database name.
pub const DB_NAME_ENV: &str = "DB_NAME";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DB_NAME: &str = "users";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Which document store backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Redb,
    Memory,
}

/// Immutable process configuration.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub db_name: String,
    pub secret_key: Zeroizing<Vec<u8>>,
    pub store_timeout: Duration,
    pub store_backend: StoreBackend,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("db_name", &self.db_name)
            .field("secret_key", &"<redacted>")
            .field("store_timeout", &self.store_timeout)
            .field("store_backend", &self.store_backend)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(err) => eprintln!("Warning: failed to load .env file: {err}"),
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret_key = get(SECRET_KEY_ENV).ok_or(ConfigError::Missing(SECRET_KEY_ENV))?;

        let port = match get(PORT_ENV) {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_ms: u64 = match get(STORE_TIMEOUT_ENV) {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: STORE_TIMEOUT_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_STORE_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: STORE_TIMEOUT_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let store_backend = match get(STORE_BACKEND_ENV).as_deref().map(str::trim) {
            None | Some("redb") => StoreBackend::Redb,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: STORE_BACKEND_ENV,
                    reason: format!("expected `redb` or `memory`, got `{other}`"),
                })
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(
                get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            db_name: get(DB_NAME_ENV).unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            secret_key: Zeroizing::new(secret_key.into_bytes()),
            store_timeout: Duration::from_millis(timeout_ms),
            store_backend,
            log_format,
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.redb", self.db_name))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: format!("{e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup(&[(SECRET_KEY_ENV, "0123456789abcdef")])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.db_name, DEFAULT_DB_NAME);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.store_backend, StoreBackend::Redb);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.secret_key.as_slice(), b"0123456789abcdef");
        assert_eq!(config.database_path(), PathBuf::from("./data/users.redb"));
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[(PORT_ENV, "9000")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(SECRET_KEY_ENV));

        let blank = Config::from_lookup(lookup(&[(SECRET_KEY_ENV, "   ")])).unwrap_err();
        assert_eq!(blank, ConfigError::Missing(SECRET_KEY_ENV));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            (SECRET_KEY_ENV, "0123456789abcdef0123456789abcdef"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (DATA_DIR_ENV, "/var/lib/users"),
            (DB_NAME_ENV, "directory"),
            (STORE_TIMEOUT_ENV, "250"),
            (STORE_BACKEND_ENV, "memory"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/users/directory.redb")
        );
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_rejected() {
        for (var, value) in [
            (PORT_ENV, "http"),
            (STORE_TIMEOUT_ENV, "0"),
            (STORE_TIMEOUT_ENV, "-5"),
            (STORE_BACKEND_ENV, "mongo"),
        ] {
            let err = Config::from_lookup(lookup(&[
                (SECRET_KEY_ENV, "0123456789abcdef"),
                (var, value),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var));
        }
    }

    #[test]
    fn debug_redacts_secret_key() {
        let config = Config::from_lookup(lookup(&[(SECRET_KEY_ENV, "0123456789abcdef")])).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
