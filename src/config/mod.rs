//! Application configuration.
//!
//! Aggregates configuration for the server, storage, dispatch pipeline, and
//! auth into a single Config struct that can be loaded from YAML files or
//! environment variables.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "BAZAAR_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BAZAAR";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "BAZAAR_LOG";
/// Environment variable for server port (overrides `server.port`).
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable for database URL (overrides `storage.url`).
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Default picture upload cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Event dispatch configuration.
    pub dispatch: DispatchConfig,
    /// Token signing configuration.
    pub auth: AuthConfig,
    /// Upload limits.
    pub uploads: UploadConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type: "sqlite" or "postgres".
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Database file path (sqlite).
    pub path: String,
    /// Connection URL (postgres).
    pub url: Option<String>,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "sqlite".to_string(),
            path: "data/bazaar.db".to_string(),
            url: None,
            max_connections: 5,
        }
    }
}

/// Dispatch pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Sink type: "channel" or "kafka".
    pub sink: String,
    /// Bounded queue capacity. Producers suspend when it is full.
    pub queue_capacity: usize,
    /// Number of delivery workers.
    pub workers: usize,
    /// Per-attempt send timeout in seconds.
    pub send_timeout_secs: u64,
    /// Optional delivery attempt ceiling. `None` redelivers indefinitely.
    pub max_attempts: Option<u32>,
    /// Topic prefix; events go to `{topic_prefix}.events.{domain}`.
    pub topic_prefix: String,
    /// Kafka connection settings, required when sink = "kafka".
    pub kafka: Option<KafkaConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sink: "channel".to_string(),
            queue_capacity: 100,
            workers: 10,
            send_timeout_secs: 10,
            max_attempts: None,
            topic_prefix: "bazaar".to_string(),
            kafka: None,
        }
    }
}

/// Kafka connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap servers (comma-separated).
    pub bootstrap_servers: String,
    /// SASL username (optional, for authenticated clusters).
    pub sasl_username: Option<String>,
    /// SASL password (optional, for authenticated clusters).
    pub sasl_password: Option<String>,
    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512).
    pub sasl_mechanism: Option<String>,
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL).
    pub security_protocol: Option<String>,
    /// SSL CA certificate path (for SSL connections).
    pub ssl_ca_location: Option<String>,
}

/// Token signing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret used to sign bearer tokens.
    pub secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: "dev-secret-change-me".to_string(),
            token_ttl_secs: 86_400,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted picture payload in bytes.
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `BAZAAR_CONFIG` environment variable (if set)
    /// 4. Environment variables with `BAZAAR` prefix (`__` separator)
    /// 5. `PORT` and `DATABASE_URL` overrides
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let loaded = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = loaded.try_deserialize()?;

        // Conventional single-variable overrides take precedence over files.
        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV_VAR}={port} is not a port")))?;
        }
        if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
            config.storage.url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.workers must be greater than zero".to_string(),
            ));
        }
        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "uploads.max_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.storage_type, "sqlite");
        assert_eq!(config.dispatch.queue_capacity, 100);
        assert_eq!(config.dispatch.workers, 10);
        assert_eq!(config.dispatch.send_timeout_secs, 10);
        assert!(config.dispatch.max_attempts.is_none());
        assert_eq!(config.uploads.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
server:
  port: 9090
storage:
  type: postgres
  url: postgres://localhost/bazaar
dispatch:
  sink: kafka
  queue_capacity: 32
  max_attempts: 5
  kafka:
    bootstrap_servers: localhost:9092
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.storage_type, "postgres");
        assert_eq!(config.dispatch.queue_capacity, 32);
        assert_eq!(config.dispatch.max_attempts, Some(5));
        assert_eq!(
            config.dispatch.kafka.unwrap().bootstrap_servers,
            "localhost:9092"
        );
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::for_test();
        config.dispatch.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::for_test();
        config.dispatch.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_port_env_override() {
        std::env::set_var(PORT_ENV_VAR, "3000");
        let config = Config::load(None).unwrap();
        std::env::remove_var(PORT_ENV_VAR);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    #[serial]
    fn test_database_url_env_override() {
        std::env::set_var(DATABASE_URL_ENV_VAR, "postgres://db.internal/bazaar");
        let config = Config::load(None).unwrap();
        std::env::remove_var(DATABASE_URL_ENV_VAR);
        assert_eq!(
            config.storage.url.as_deref(),
            Some("postgres://db.internal/bazaar")
        );
    }
}
