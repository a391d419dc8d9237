use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";

/// Connection string variable honoured for compatibility with existing deployments.
const LEGACY_URI_ENV: &str = "MONGO_URI";
/// Listen port variable honoured for compatibility with existing deployments.
const LEGACY_PORT_ENV: &str = "PORT";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `BOOKSHELF_*` variables, and finally `MONGO_URI` / `PORT`.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        let builder = file_sources(&config_dir, &environment)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("database.uri", non_empty_var(LEGACY_URI_ENV))
            .with_context(|| format!("failed to apply {}", LEGACY_URI_ENV))?
            .set_override_option("server.port", non_empty_var(LEGACY_PORT_ENV))
            .with_context(|| format!("failed to apply {}", LEGACY_PORT_ENV))?;

        finish(builder, &environment)
    }

    /// Load configuration from the files in `config_dir` only, ignoring the
    /// process environment.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        finish(file_sources(config_dir, environment), environment)
    }
}

fn file_sources(
    config_dir: &Path,
    environment: &str,
) -> config::ConfigBuilder<config::builder::DefaultState> {
    let base_path = config_dir.join("base.toml");
    let environment_path = config_dir.join(format!("{}.toml", environment));

    config::Config::builder()
        .add_source(config::File::from(base_path).required(false))
        .add_source(config::File::from(environment_path).required(false))
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    environment: &str,
) -> anyhow::Result<Settings> {
    let cfg = builder
        .build()
        .with_context(|| "failed to build configuration")?;

    let mut settings: Settings = cfg
        .try_deserialize()
        .with_context(|| "failed to deserialize configuration")?;

    // The selected environment name wins over any `environment` key in the files.
    settings.environment = Environment::parse(environment)?;

    Ok(settings)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Pass raw database error text through to clients.
    #[serde(default = "ServerSettings::default_expose_store_errors")]
    pub expose_store_errors: bool,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_expose_store_errors() -> bool {
        true
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            expose_store_errors: Self::default_expose_store_errors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// MongoDB connection string. Empty means "not configured".
    #[serde(default)]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_collection")]
    pub collection: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_name() -> String {
        "book_inventory".to_string()
    }

    fn default_collection() -> String {
        "books".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        10000
    }

    /// Copy of these settings with the connection string masked, for display.
    pub fn redacted(&self) -> Self {
        let uri = if self.uri.is_empty() {
            String::new()
        } else {
            "***".to_string()
        };
        Self {
            uri,
            ..self.clone()
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: String::new(),
            name: Self::default_name(),
            collection: Self::default_collection(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn defaults_match_book_inventory_layout() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert!(settings.database.uri.is_empty());
        assert_eq!(settings.database.name, "book_inventory");
        assert_eq!(settings.database.collection, "books");
        assert!(settings.server.expose_store_errors);
    }

    #[test]
    fn missing_config_dir_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent"), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn environment_file_overlays_base_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "[server]\nport = 9000\n\n[database]\nuri = \"mongodb://base:27017\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("production.toml"),
            "[database]\nuri = \"mongodb://prod:27017\"\n\n[telemetry]\nlog_format = \"json\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path(), "production").unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.database.uri, "mongodb://prod:27017");
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(dir.path(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn redacted_masks_only_a_present_uri() {
        let mut database = DatabaseSettings::default();
        assert_eq!(database.redacted().uri, "");

        database.uri = "mongodb://user:secret@db:27017".to_string();
        let redacted = database.redacted();
        assert_eq!(redacted.uri, "***");
        assert_eq!(redacted.name, "book_inventory");
    }
}
