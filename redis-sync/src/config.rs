//! Run configuration: policies, optional TOML file, and command-line overrides.
//!
//! Precedence is command line (including environment variables bound to
//! flags) over the config file over built-in defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, parse_port};
use crate::errors::SyncError;

pub const DEFAULT_SOURCE_HOST: &str = "127.0.0.1";
pub const DEFAULT_SOURCE_PORT: i64 = 6379;
pub const DEFAULT_DESTINATION_HOST: &str = "127.0.0.1";
pub const DEFAULT_DESTINATION_PORT: i64 = 6380;
pub const DEFAULT_MATCH_PATTERN: &str = "*";
pub const DEFAULT_SCAN_COUNT: usize = 500;
pub const DEFAULT_WRITE_CHUNK: usize = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// What to do with the source key's expiration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TtlPolicy {
    /// Apply the remaining TTL to the copied key
    #[default]
    Preserve,
    /// Copy every key as persistent
    Drop,
}

/// What to do when the key already exists in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExistingKeyPolicy {
    /// Replace the destination key with the source value
    #[default]
    Overwrite,
    /// Leave the destination key untouched
    Skip,
}

/// What to do when a single key fails to copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Record the failure and keep going
    #[default]
    Continue,
    /// Stop the run at the first failure
    Abort,
}

/// Knobs that shape a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Glob passed to `SCAN MATCH`.
    pub pattern: String,
    /// `COUNT` hint for each `SCAN` call.
    pub scan_count: usize,
    /// Maximum number of elements per write command.
    pub write_chunk: usize,
    pub ttl: TtlPolicy,
    pub existing: ExistingKeyPolicy,
    pub on_error: ErrorPolicy,
    /// Read and classify keys without writing anything.
    pub dry_run: bool,
    /// Key that must exist in the source before anything is copied.
    pub require_marker: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_MATCH_PATTERN.to_string(),
            scan_count: DEFAULT_SCAN_COUNT,
            write_chunk: DEFAULT_WRITE_CHUNK,
            ttl: TtlPolicy::default(),
            existing: ExistingKeyPolicy::default(),
            on_error: ErrorPolicy::default(),
            dry_run: false,
            require_marker: None,
        }
    }
}

impl SyncOptions {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.pattern.is_empty() {
            return Err(SyncError::configuration("match pattern must not be empty"));
        }
        if self.scan_count == 0 {
            return Err(SyncError::configuration("scan count must be at least 1"));
        }
        if self.write_chunk == 0 {
            return Err(SyncError::configuration("write chunk must be at least 1"));
        }
        if matches!(&self.require_marker, Some(marker) if marker.is_empty()) {
            return Err(SyncError::configuration("marker key must not be empty"));
        }
        Ok(())
    }
}

/// Fully resolved configuration of a run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub options: SyncOptions,
    pub connect_timeout: Duration,
}

impl SyncConfig {
    /// Merge an optional config file with command-line overrides and validate the result.
    pub fn resolve(file: Option<ConfigFile>, overrides: ConfigOverrides) -> Result<Self, SyncError> {
        let file = file.unwrap_or_default();

        let source = resolve_endpoint(
            "source",
            &file.source,
            &overrides.source,
            DEFAULT_SOURCE_HOST,
            DEFAULT_SOURCE_PORT,
        )?;
        let destination = resolve_endpoint(
            "destination",
            &file.destination,
            &overrides.destination,
            DEFAULT_DESTINATION_HOST,
            DEFAULT_DESTINATION_PORT,
        )?;

        let sync = file.sync;
        let require_marker = match overrides.require_marker {
            Some(marker) => Some(marker),
            None => sync.require_marker.as_deref().map(expand_env).transpose()?,
        };

        let options = SyncOptions {
            pattern: overrides
                .pattern
                .or(sync.pattern)
                .unwrap_or_else(|| DEFAULT_MATCH_PATTERN.to_string()),
            scan_count: overrides.scan_count.or(sync.scan_count).unwrap_or(DEFAULT_SCAN_COUNT),
            write_chunk: sync.write_chunk.unwrap_or(DEFAULT_WRITE_CHUNK),
            ttl: overrides.ttl.or(sync.ttl).unwrap_or_default(),
            existing: overrides.existing.or(sync.existing).unwrap_or_default(),
            on_error: overrides.on_error.or(sync.on_error).unwrap_or_default(),
            dry_run: overrides.dry_run || sync.dry_run.unwrap_or(false),
            require_marker,
        };

        let timeout_secs = overrides
            .connect_timeout_secs
            .or(sync.connect_timeout_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let config = Self {
            source,
            destination,
            options,
            connect_timeout: Duration::from_secs(timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        self.options.validate()?;
        if self.connect_timeout.is_zero() {
            return Err(SyncError::configuration("connect timeout must be at least 1 second"));
        }
        if self.source.same_database(&self.destination) {
            return Err(SyncError::configuration(format!(
                "source and destination both point at {}",
                self.source
            )));
        }
        Ok(())
    }
}

fn resolve_endpoint(
    role: &str,
    file: &EndpointSettings,
    cli: &EndpointOverrides,
    default_host: &str,
    default_port: i64,
) -> Result<Endpoint, SyncError> {
    let with_role = |err: SyncError| match err {
        SyncError::Configuration { message } => SyncError::configuration(format!("{role}: {message}")),
        other => other,
    };

    let host = match &cli.host {
        Some(host) => host.clone(),
        None => match &file.host {
            Some(host) => expand_env(host)?,
            None => default_host.to_string(),
        },
    };
    let port = match &cli.port {
        Some(port) => parse_port(port).map_err(with_role)?,
        None => file.port.unwrap_or(default_port),
    };
    let db = cli.db.or(file.db).unwrap_or(0);

    let username = match &cli.username {
        Some(username) => Some(username.clone()),
        None => file.username.as_deref().map(expand_env).transpose()?,
    };
    let password = match &cli.password {
        Some(password) => Some(password.clone()),
        None => file.password.as_deref().map(expand_env).transpose()?,
    };

    Ok(Endpoint::new(host, port, db)
        .map_err(with_role)?
        .with_credentials(username, password))
}

/// Expand a value of the form `${VAR}` from the environment; other values pass through.
pub fn expand_env(value: &str) -> Result<String, SyncError> {
    if value.starts_with("${") && value.ends_with('}') && value.len() > 3 {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name)
            .map_err(|_| SyncError::configuration(format!("environment variable {var_name} not set")))
    } else {
        Ok(value.to_string())
    }
}

/// Layout of the optional TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub source: EndpointSettings,
    #[serde(default)]
    pub destination: EndpointSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(rename = "match")]
    pub pattern: Option<String>,
    pub scan_count: Option<usize>,
    pub write_chunk: Option<usize>,
    pub ttl: Option<TtlPolicy>,
    pub existing: Option<ExistingKeyPolicy>,
    pub on_error: Option<ErrorPolicy>,
    pub dry_run: Option<bool>,
    pub require_marker: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| SyncError::configuration(format!("failed to read {}: {err}", path.display())))?;
        Self::parse(&content)
            .map_err(|err| SyncError::configuration(format!("failed to parse {}: {err}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source: EndpointOverrides,
    pub destination: EndpointOverrides,
    pub pattern: Option<String>,
    pub scan_count: Option<usize>,
    pub ttl: Option<TtlPolicy>,
    pub existing: Option<ExistingKeyPolicy>,
    pub on_error: Option<ErrorPolicy>,
    pub dry_run: bool,
    pub require_marker: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct EndpointOverrides {
    pub host: Option<String>,
    /// Kept as text so malformed input becomes a configuration error.
    pub port: Option<String>,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn overrides(source_port: &str, dest_port: &str) -> ConfigOverrides {
        ConfigOverrides {
            source: EndpointOverrides {
                host: Some("10.0.0.5".to_string()),
                port: Some(source_port.to_string()),
                ..Default::default()
            },
            destination: EndpointOverrides {
                host: Some("127.0.0.1".to_string()),
                port: Some(dest_port.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        let config = SyncConfig::resolve(None, ConfigOverrides::default()).unwrap();
        assert_eq!(config.source.to_string(), "127.0.0.1:6379/0");
        assert_eq!(config.destination.to_string(), "127.0.0.1:6380/0");
        assert_eq!(config.options, SyncOptions::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));
    }

    #[test]
    fn test_cli_ports_are_validated() {
        let err = SyncConfig::resolve(None, overrides("6379", "abc")).unwrap_err();
        assert!(err.to_string().contains("destination: port must be an integer"));

        let err = SyncConfig::resolve(None, overrides("70000", "6380")).unwrap_err();
        assert!(err.to_string().contains("source: port must be between 1 and 65535"));
    }

    #[test]
    fn test_empty_cli_host_is_rejected() {
        let mut cli = overrides("6379", "6380");
        cli.destination.host = Some(String::new());
        let err = SyncConfig::resolve(None, cli).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }

    #[test]
    fn test_same_source_and_destination_is_rejected() {
        let mut cli = overrides("6379", "6379");
        cli.destination.host = Some("10.0.0.5".to_string());
        let err = SyncConfig::resolve(None, cli).unwrap_err();
        assert!(err.to_string().contains("both point at"));
    }

    #[test]
    fn test_zero_scan_count_is_rejected() {
        let mut cli = overrides("6379", "6380");
        cli.scan_count = Some(0);
        assert!(SyncConfig::resolve(None, cli).is_err());
    }

    #[test]
    fn test_file_values_and_cli_precedence() {
        let file = ConfigFile::parse(
            r#"
            [source]
            host = "prod.internal"
            port = 7000
            db = 2

            [destination]
            host = "replica.internal"

            [sync]
            match = "element_cache_*"
            ttl = "drop"
            existing = "skip"
            on_error = "abort"
            scan_count = 50
            "#,
        )
        .unwrap();

        let cli = ConfigOverrides {
            destination: EndpointOverrides {
                port: Some("6390".to_string()),
                ..Default::default()
            },
            existing: Some(ExistingKeyPolicy::Overwrite),
            ..Default::default()
        };

        let config = SyncConfig::resolve(Some(file), cli).unwrap();
        assert_eq!(config.source.to_string(), "prod.internal:7000/2");
        assert_eq!(config.destination.to_string(), "replica.internal:6390/0");
        assert_eq!(config.options.pattern, "element_cache_*");
        assert_eq!(config.options.ttl, TtlPolicy::Drop);
        assert_eq!(config.options.existing, ExistingKeyPolicy::Overwrite);
        assert_eq!(config.options.on_error, ErrorPolicy::Abort);
        assert_eq!(config.options.scan_count, 50);
    }

    #[test]
    fn test_unknown_policy_value_fails_to_parse() {
        assert!(ConfigFile::parse("[sync]\nttl = \"forever\"\n").is_err());
    }

    #[test]
    fn test_expand_env() {
        assert_eq!(expand_env("plain").unwrap(), "plain");
        assert_eq!(expand_env("${}").unwrap(), "${}");
        assert!(expand_env("${REDIS_SYNC_TEST_DEFINITELY_UNSET_VAR}").is_err());

        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(expand_env("${PATH}").unwrap(), path);
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[source]\nhost = \"10.1.1.1\"\nport = 6400\n").unwrap();

        let loaded = ConfigFile::load(file.path()).unwrap();
        assert_eq!(loaded.source.host.as_deref(), Some("10.1.1.1"));
        assert_eq!(loaded.source.port, Some(6400));
        assert!(loaded.destination.host.is_none());
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigFile::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ConfigFile::default();
        config.sync.ttl = Some(TtlPolicy::Drop);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("ttl = \"drop\""));
    }
}
