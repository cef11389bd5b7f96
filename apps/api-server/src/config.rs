//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider, applied to both the entity store and the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }
}

/// Payment gateway settings, exposed verbatim by `GET /api/gateway-properties`.
///
/// Nothing in the service reads these values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    pub vpc_url: Option<String>,
    pub merchant_id: Option<String>,
    pub access_code: Option<String>,
    pub secure_hash: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8081)
    pub port: u16,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// Entity store database path (sqlite storage)
    pub db_path: PathBuf,
    /// Search index database path (sqlite storage)
    pub index_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Payment gateway properties
    pub gateway: GatewayProperties,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port: u16 = match lookup("PORT") {
            Some(s) => s.parse().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}': {}", s, e),
            })?,
            None => 8081,
        };

        // Storage provider
        let provider_str = lookup("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider =
            StorageProvider::from_str(&provider_str).ok_or_else(|| ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("Unknown provider '{}', expected sqlite or memory", provider_str),
            })?;

        // DB paths (for sqlite)
        let db_path = PathBuf::from(
            lookup("DB_PATH").unwrap_or_else(|| "./data/deposits.db".into()),
        );
        let index_path = PathBuf::from(
            lookup("INDEX_PATH").unwrap_or_else(|| "./data/deposits-index.db".into()),
        );
        if storage_provider == StorageProvider::Sqlite && db_path == index_path {
            return Err(ConfigError {
                field: "INDEX_PATH",
                message: "Must differ from DB_PATH".into(),
            });
        }

        // Log format
        let format_str = lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into());
        let log_format = LogFormat::from_str(&format_str).ok_or_else(|| ConfigError {
            field: "LOG_FORMAT",
            message: format!("Unknown format '{}', expected pretty or json", format_str),
        })?;

        // CORS allow origin
        let cors_origin_str = lookup("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Gateway properties
        let gateway = GatewayProperties {
            vpc_url: lookup("NAPAS_GATEWAY_VPC_URL"),
            merchant_id: lookup("NAPAS_GATEWAY_MERCHANT_ID"),
            access_code: lookup("NAPAS_GATEWAY_ACCESS_CODE"),
            secure_hash: lookup("NAPAS_GATEWAY_SECURE_HASH"),
            username: lookup("NAPAS_GATEWAY_USERNAME"),
            password: lookup("NAPAS_GATEWAY_PASSWORD"),
        };

        Ok(Self {
            port,
            storage_provider,
            db_path,
            index_path,
            log_format,
            cors_allow_origin,
            gateway,
        })
    }

    /// Log warnings about insecure configuration.
    pub fn warn_if_insecure(&self) {
        if self.gateway.password.is_some() || self.gateway.secure_hash.is_some() {
            tracing::warn!(
                "Gateway credentials are configured and are returned verbatim by \
                 GET /api/gateway-properties. Restrict access to this endpoint."
            );
        }
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: deposits are lost on restart.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::from_str("MEMORY"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::from_str("sqlite"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::from_str("memroy"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::from_str("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_str("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_str("anything"), None);
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("./data/deposits.db"));
        assert_eq!(cfg.gateway, GatewayProperties::default());
    }

    #[test]
    fn gateway_properties_loaded_verbatim() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("NAPAS_GATEWAY_VPC_URL", "https://gw.example/vpcpay"),
            ("NAPAS_GATEWAY_MERCHANT_ID", "M01"),
            ("NAPAS_GATEWAY_PASSWORD", " p@ss "),
        ]))
        .unwrap();
        assert_eq!(cfg.gateway.vpc_url.as_deref(), Some("https://gw.example/vpcpay"));
        assert_eq!(cfg.gateway.merchant_id.as_deref(), Some("M01"));
        assert_eq!(cfg.gateway.password.as_deref(), Some(" p@ss "));
        assert_eq!(cfg.gateway.username, None);
    }

    #[test]
    fn invalid_port_fails_fast() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err.field, "PORT");
    }

    #[test]
    fn unknown_provider_and_log_format_fail_fast() {
        let err = Config::from_lookup(lookup_from(&[("STORAGE_PROVIDER", "memroy")])).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
        let err = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert_eq!(err.field, "LOG_FORMAT");
    }

    #[test]
    fn shared_db_and_index_path_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DB_PATH", "/tmp/x.db"),
            ("INDEX_PATH", "/tmp/x.db"),
        ]))
        .unwrap_err();
        assert_eq!(err.field, "INDEX_PATH");
    }

    #[test]
    fn gateway_serializes_camel_case() {
        let props = GatewayProperties {
            vpc_url: Some("u".into()),
            ..GatewayProperties::default()
        };
        let v = serde_json::to_value(&props).unwrap();
        assert_eq!(v["vpcUrl"], "u");
        assert!(v["secureHash"].is_null());
    }
}
