//! Configuration types and builders for table-export.

use crate::error::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Tables exported when neither a config file nor `EXPORT_TABLES` names any.
pub const DEFAULT_TABLES: &[&str] = &[
    "users",
    "discounts",
    "products",
    "orders",
    "order_details",
    "payouts",
    "payout_payments",
    "payout_resellers",
];

/// Main configuration for an export run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExportConfig {
    /// Source database connection
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Destination object storage
    #[validate(nested)]
    pub storage: StorageConfig,

    /// Export behavior (directories, timestamp column, lock, retention)
    #[validate(nested)]
    #[serde(default)]
    pub export: ExportBehaviorConfig,

    /// Tables, exported in this order
    #[validate(length(min = 1, message = "at least one table must be configured"), nested)]
    #[serde(default = "default_table_specs")]
    pub tables: Vec<TableSpec>,
}

impl ExportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Every missing or empty required variable is reported in a single
    /// error so a misconfigured deployment is fixed in one pass.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get("DB_HOST");
        let user = get("DB_USER");
        let database = get("DB_NAME");
        let bucket = get("GCS_BUCKET_NAME").or_else(|| get("EXPORT_BUCKET"));

        let missing: Vec<&str> = [
            ("DB_HOST", host.is_none()),
            ("DB_USER", user.is_none()),
            ("DB_NAME", database.is_none()),
            ("GCS_BUCKET_NAME", bucket.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut builder = Self::builder()
            .db_host(host.unwrap_or_default())
            .db_user(user.unwrap_or_default())
            .db_name(database.unwrap_or_default())
            .bucket(bucket.unwrap_or_default())
            .db_password(lookup("DB_PASSWORD").unwrap_or_default());

        if let Some(port) = get("DB_PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("DB_PORT is not a valid port: {}", port))?;
            builder = builder.db_port(port);
        }
        if let Some(mode) = get("DB_SSL_MODE") {
            builder = builder.ssl_mode(mode.parse()?);
        }
        if let Some(provider) = get("EXPORT_STORAGE_PROVIDER") {
            builder = builder.provider(provider.parse()?);
        }
        if let Some(prefix) = get("EXPORT_PREFIX") {
            builder = builder.prefix(prefix);
        }
        if let Some(tables) = get("EXPORT_TABLES") {
            builder = builder.tables(
                tables
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(TableSpec::new),
            );
        }
        if let Some(column) = get("EXPORT_TIMESTAMP_COLUMN") {
            builder = builder.timestamp_column(column);
        }
        if let Some(dir) = get("EXPORT_CHECKPOINT_DIR") {
            builder = builder.checkpoint_dir(dir);
        }
        if let Some(dir) = get("EXPORT_DIR") {
            builder = builder.export_dir(dir);
        }
        if let Some(retention) = get("EXPORT_ARTIFACT_RETENTION") {
            builder = builder.artifact_retention(retention);
        }
        if let Some(lock) = get("EXPORT_RUN_LOCK") {
            builder = builder.run_lock(parse_bool("EXPORT_RUN_LOCK", &lock)?);
        }

        builder.build()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path, e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {}", path, e)))?;

        if config.database.password.is_empty() {
            tracing::warn!("No database password in {}; relying on passwordless authentication", path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)
            .map_err(|e| Error::validation(format!("Config validation failed: {}", e)))?;
        self.export.artifact_retention()?;
        Ok(())
    }

    /// Enabled tables in configured order.
    pub fn enabled_tables(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().filter(|t| t.enabled)
    }

    /// Restrict the run to the named tables, keeping configured order.
    ///
    /// Unknown names are rejected rather than silently ignored.
    pub fn restrict_to(&mut self, names: &[String]) -> Result<()> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.tables.iter().any(|t| &t.name == *n))
        {
            return Err(Error::config(format!("Unknown table: {}", unknown)));
        }
        self.tables.retain(|t| names.contains(&t.name));
        Ok(())
    }
}

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Server host name or address
    #[validate(length(min = 1))]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login role
    #[validate(length(min = 1))]
    pub user: String,

    /// Password; may be empty for trust/peer authentication
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Database name
    #[validate(length(min = 1))]
    pub database: String,

    /// SSL mode
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Accept self-signed server certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            ssl_mode: SslMode::default(),
            connect_timeout_secs: default_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

impl DatabaseConfig {
    /// Connection timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `user@host:port/database`, safe to log.
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// SSL mode for PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Disable SSL
    Disable,
    /// Prefer SSL (default)
    #[default]
    Prefer,
    /// Require SSL
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(Error::config(format!("Unknown SSL mode: {}", other))),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Storage backend
    #[serde(default)]
    pub provider: StorageProvider,

    /// Bucket name (for `local`, the destination directory)
    #[validate(length(min = 1))]
    pub bucket: String,

    /// Key prefix placed before `<table>/`
    #[serde(default)]
    pub prefix: Option<String>,

    /// Service account JSON for GCS; falls back to ambient credentials
    #[serde(default)]
    pub service_account_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            bucket: String::new(),
            prefix: None,
            service_account_path: None,
        }
    }
}

/// Object storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Google Cloud Storage (default)
    #[default]
    Gcs,
    /// Amazon S3 or compatible
    S3,
    /// Local directory
    Local,
}

impl StorageProvider {
    /// URL scheme used when displaying object locations.
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageProvider::Gcs => "gs",
            StorageProvider::S3 => "s3",
            StorageProvider::Local => "file",
        }
    }
}

impl std::str::FromStr for StorageProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gcs" | "gcp" => Ok(StorageProvider::Gcs),
            "s3" | "aws" => Ok(StorageProvider::S3),
            "local" | "file" => Ok(StorageProvider::Local),
            other => Err(Error::config(format!("Unknown storage provider: {}", other))),
        }
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExportBehaviorConfig {
    /// Column holding each row's last-modified timestamp
    #[validate(custom(function = "validate_identifier"))]
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Directory holding one checkpoint file per table
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Directory where artifacts are written before upload
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Hold a lock file in the checkpoint directory for the whole run
    #[serde(default = "default_true")]
    pub run_lock: bool,

    /// Age after which leftover artifacts are deleted, e.g. "7d"
    #[serde(default)]
    pub artifact_retention: Option<String>,
}

impl Default for ExportBehaviorConfig {
    fn default() -> Self {
        Self {
            timestamp_column: default_timestamp_column(),
            checkpoint_dir: default_checkpoint_dir(),
            export_dir: default_export_dir(),
            run_lock: true,
            artifact_retention: None,
        }
    }
}

impl ExportBehaviorConfig {
    /// Parsed artifact retention period.
    pub fn artifact_retention(&self) -> Result<Option<Duration>> {
        self.artifact_retention
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| {
                    Error::config(format!("Invalid artifact_retention '{}': {}", raw, e))
                })
            })
            .transpose()
    }
}

/// A source table to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TableSpec {
    /// Table name, optionally schema-qualified
    #[validate(custom(function = "validate_identifier"))]
    pub name: String,

    /// Overrides the default timestamp column for this table
    #[validate(custom(function = "validate_identifier"))]
    #[serde(default)]
    pub timestamp_column: Option<String>,

    /// Enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl TableSpec {
    /// An enabled table using the default timestamp column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp_column: None,
            enabled: true,
        }
    }

    /// Set the timestamp column for this table.
    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = Some(column.into());
        self
    }

    /// Set enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Get the timestamp column, falling back to the run-wide default.
    pub fn timestamp_column<'a>(&'a self, default: &'a str) -> &'a str {
        self.timestamp_column.as_deref().unwrap_or(default)
    }
}

/// Builder for ExportConfig.
#[derive(Debug, Default)]
pub struct ExportConfigBuilder {
    db_host: Option<String>,
    db_port: Option<u16>,
    db_user: Option<String>,
    db_password: Option<String>,
    db_name: Option<String>,
    ssl_mode: Option<SslMode>,
    bucket: Option<String>,
    provider: Option<StorageProvider>,
    prefix: Option<String>,
    tables: Vec<TableSpec>,
    timestamp_column: Option<String>,
    checkpoint_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    run_lock: Option<bool>,
    artifact_retention: Option<String>,
}

impl ExportConfigBuilder {
    /// Set database host.
    pub fn db_host(mut self, host: impl Into<String>) -> Self {
        self.db_host = Some(host.into());
        self
    }

    /// Set database port.
    pub fn db_port(mut self, port: u16) -> Self {
        self.db_port = Some(port);
        self
    }

    /// Set database user.
    pub fn db_user(mut self, user: impl Into<String>) -> Self {
        self.db_user = Some(user.into());
        self
    }

    /// Set database password.
    pub fn db_password(mut self, password: impl Into<String>) -> Self {
        self.db_password = Some(password.into());
        self
    }

    /// Set database name.
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Set SSL mode.
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = Some(mode);
        self
    }

    /// Set destination bucket.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set storage provider.
    pub fn provider(mut self, provider: StorageProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set object key prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Add a table.
    pub fn table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    /// Add several tables.
    pub fn tables(mut self, tables: impl IntoIterator<Item = TableSpec>) -> Self {
        self.tables.extend(tables);
        self
    }

    /// Set default timestamp column.
    pub fn timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = Some(column.into());
        self
    }

    /// Set checkpoint directory.
    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Set artifact directory.
    pub fn export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Enable or disable the run lock.
    pub fn run_lock(mut self, enabled: bool) -> Self {
        self.run_lock = Some(enabled);
        self
    }

    /// Set artifact retention, in humantime syntax.
    pub fn artifact_retention(mut self, retention: impl Into<String>) -> Self {
        self.artifact_retention = Some(retention.into());
        self
    }

    /// Build the ExportConfig.
    pub fn build(self) -> Result<ExportConfig> {
        let host = self
            .db_host
            .ok_or_else(|| Error::config("db_host required"))?;
        let user = self
            .db_user
            .ok_or_else(|| Error::config("db_user required"))?;
        let database = self
            .db_name
            .ok_or_else(|| Error::config("db_name required"))?;
        let bucket = self
            .bucket
            .ok_or_else(|| Error::config("bucket required"))?;

        let password = self.db_password.unwrap_or_default();
        if password.is_empty() {
            tracing::warn!("Database password is empty; relying on passwordless authentication");
        }

        let config = ExportConfig {
            database: DatabaseConfig {
                host,
                port: self.db_port.unwrap_or_else(default_port),
                user,
                password,
                database,
                ssl_mode: self.ssl_mode.unwrap_or_default(),
                ..Default::default()
            },
            storage: StorageConfig {
                provider: self.provider.unwrap_or_default(),
                bucket,
                prefix: self.prefix,
                ..Default::default()
            },
            export: ExportBehaviorConfig {
                timestamp_column: self
                    .timestamp_column
                    .unwrap_or_else(default_timestamp_column),
                checkpoint_dir: self.checkpoint_dir.unwrap_or_else(default_checkpoint_dir),
                export_dir: self.export_dir.unwrap_or_else(default_export_dir),
                run_lock: self.run_lock.unwrap_or(true),
                artifact_retention: self.artifact_retention,
            },
            tables: if self.tables.is_empty() {
                default_table_specs()
            } else {
                self.tables
            },
        };

        config.validate()?;
        Ok(config)
    }
}

/// Identifiers end up in SQL, file names and object keys.
fn validate_identifier(value: &str) -> std::result::Result<(), ValidationError> {
    let valid_start = value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    let valid_parts = value.split('.').all(|part| !part.is_empty());

    if valid_start && valid_chars && valid_parts && value.len() <= 128 {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_identifier"))
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

// Defaults
fn default_port() -> u16 {
    5432
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_timestamp_column() -> String {
    "updated_at".into()
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("timestamps")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}
fn default_true() -> bool {
    true
}
fn default_table_specs() -> Vec<TableSpec> {
    DEFAULT_TABLES.iter().map(|t| TableSpec::new(*t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_HOST", "db.internal"),
            ("DB_USER", "exporter"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_NAME", "shop"),
            ("GCS_BUCKET_NAME", "shop-exports"),
        ]
    }

    #[test]
    fn test_config_builder() {
        let config = ExportConfig::builder()
            .db_host("localhost")
            .db_user("postgres")
            .db_name("shop")
            .bucket("exports")
            .table(TableSpec::new("orders"))
            .build()
            .unwrap();

        assert_eq!(config.database.port, 5432);
        assert_eq!(config.tables, vec![TableSpec::new("orders")]);
        assert_eq!(config.export.timestamp_column, "updated_at");
        assert_eq!(config.storage.provider, StorageProvider::Gcs);
    }

    #[test]
    fn test_builder_defaults_to_known_tables() {
        let config = ExportConfig::builder()
            .db_host("localhost")
            .db_user("postgres")
            .db_name("shop")
            .bucket("exports")
            .build()
            .unwrap();

        let names: Vec<&str> = config.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, DEFAULT_TABLES);
    }

    #[test]
    fn test_from_lookup_reads_required_values() {
        let config = ExportConfig::from_lookup(lookup_from(&required())).unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.user, "exporter");
        assert_eq!(config.database.password, "s3cret");
        assert_eq!(config.database.database, "shop");
        assert_eq!(config.storage.bucket, "shop-exports");
        assert_eq!(config.tables.len(), DEFAULT_TABLES.len());
    }

    #[test]
    fn test_from_lookup_reports_every_missing_value() {
        let err = ExportConfig::from_lookup(lookup_from(&[("DB_HOST", "db"), ("DB_NAME", "  ")]))
            .unwrap_err();

        let message = err.to_string();
        assert!(err.is_fatal());
        assert!(message.contains("DB_USER"));
        assert!(message.contains("DB_NAME"), "empty counts as missing");
        assert!(message.contains("GCS_BUCKET_NAME"));
        assert!(!message.contains("DB_HOST"));
    }

    #[test]
    fn test_password_is_optional() {
        let vars: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| *k != "DB_PASSWORD")
            .collect();
        let config = ExportConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert!(config.database.password.is_empty());
    }

    #[test]
    fn test_from_lookup_optional_overrides() {
        let mut vars = required();
        vars.extend([
            ("DB_PORT", "6543"),
            ("DB_SSL_MODE", "require"),
            ("EXPORT_TABLES", "orders, users ,"),
            ("EXPORT_TIMESTAMP_COLUMN", "modified_at"),
            ("EXPORT_STORAGE_PROVIDER", "s3"),
            ("EXPORT_PREFIX", "nightly"),
            ("EXPORT_ARTIFACT_RETENTION", "7d"),
            ("EXPORT_RUN_LOCK", "false"),
        ]);
        let config = ExportConfig::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.ssl_mode, SslMode::Require);
        assert_eq!(
            config.tables,
            vec![TableSpec::new("orders"), TableSpec::new("users")]
        );
        assert_eq!(config.export.timestamp_column, "modified_at");
        assert_eq!(config.storage.provider, StorageProvider::S3);
        assert_eq!(config.storage.prefix.as_deref(), Some("nightly"));
        assert!(!config.export.run_lock);
        assert_eq!(
            config.export.artifact_retention().unwrap(),
            Some(Duration::from_secs(7 * 24 * 3600))
        );
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let mut vars = required();
        vars.push(("DB_PORT", "not-a-port"));
        let err = ExportConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        for name in ["orders; DROP TABLE users", "../etc", "1orders", "a..b", ""] {
            let result = ExportConfig::builder()
                .db_host("localhost")
                .db_user("postgres")
                .db_name("shop")
                .bucket("exports")
                .table(TableSpec::new(name))
                .build();
            assert!(result.is_err(), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_accepts_schema_qualified_names() {
        assert!(validate_identifier("public.orders").is_ok());
        assert!(validate_identifier("_staging$1").is_ok());
    }

    #[test]
    fn test_invalid_retention_is_rejected() {
        let result = ExportConfig::builder()
            .db_host("localhost")
            .db_user("postgres")
            .db_name("shop")
            .bucket("exports")
            .artifact_retention("soon")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let toml = r#"
            [database]
            host = "localhost"
            user = "postgres"
            database = "shop"

            [storage]
            bucket = "shop-exports"

            [export]
            timestamp_column = "modified"

            [[tables]]
            name = "orders"

            [[tables]]
            name = "users"
            timestamp_column = "updated_at"
            enabled = false
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table-export.toml");
        std::fs::write(&path, toml).unwrap();

        let config = ExportConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].timestamp_column("modified"), "modified");
        assert_eq!(config.tables[1].timestamp_column("modified"), "updated_at");
        assert_eq!(config.enabled_tables().count(), 1);
        assert_eq!(config.export.checkpoint_dir, PathBuf::from("timestamps"));
    }

    #[test]
    fn test_restrict_to_keeps_configured_order() {
        let mut config = ExportConfig::builder()
            .db_host("localhost")
            .db_user("postgres")
            .db_name("shop")
            .bucket("exports")
            .build()
            .unwrap();

        config
            .restrict_to(&["orders".to_string(), "users".to_string()])
            .unwrap();
        let names: Vec<&str> = config.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["users", "orders"]);

        assert!(config.restrict_to(&["nope".to_string()]).is_err());
    }
}
