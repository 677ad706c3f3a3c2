//! Typed pipeline configuration model.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tabsync_types::error::StoreError;

/// Top-level pipeline configuration from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Project name; also the catalog's directory in the object store.
    pub project: String,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub columns: ColumnPolicy,
}

/// Object-store side of the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the blob store.
    pub root: PathBuf,
    /// Key prefix to list source files under.
    #[serde(default)]
    pub prefix: String,
    /// Identifier-exclusion substring; keeps the catalog artifact (and
    /// anything else matching) out of the candidate file list.
    #[serde(default = "default_exclude")]
    pub exclude: String,
}

fn default_exclude() -> String {
    "catalog".to_string()
}

/// Relational-store connection config.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub dbname: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

impl DatabaseConfig {
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.dbname
        )
    }
}

/// Bulk-loader tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Switch to fraction-based chunk sizing for very large batches.
    pub auto_resolve: bool,
    /// Fraction of the batch per chunk when size-adaptive chunking kicks in.
    pub frac: f64,
    /// Number of near-equal chunks for ordinary batches.
    pub chunk_size: usize,
    /// Row count at which a batch counts as very large.
    pub large_batch_threshold: usize,
    /// Always consult the dedup cache before inserting (safety over
    /// throughput); off means dedup only on retry attempts.
    pub interruption_mode: bool,
    /// Total insert attempts per chunk.
    pub max_retries: u32,
    /// Fixed delay between attempts, seconds.
    pub retry_delay_secs: u64,
    /// Local path of the dedup-cache artifact.
    pub cache_path: PathBuf,
    /// Fallback VARCHAR length.
    pub char_length: usize,
    /// Ignore observed text lengths and always use `char_length`.
    pub override_length: bool,
    /// Size text columns from the whole batch instead of the first chunk.
    pub strict_lengths: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            auto_resolve: true,
            frac: 0.01,
            chunk_size: 20,
            large_batch_threshold: 500_000,
            interruption_mode: false,
            max_retries: 3,
            retry_delay_secs: 5,
            cache_path: PathBuf::from("./logs/cache.bin"),
            char_length: 256,
            override_length: true,
            strict_lengths: false,
        }
    }
}

impl LoaderConfig {
    /// Fixed delay between insert attempts.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Explicit column rename/drop policy applied to every parsed batch.
///
/// Passed into the pipeline as a value; never ambient process-wide state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnPolicy {
    pub rename: BTreeMap<String, String>,
    pub drop: Vec<String>,
}

impl PipelineConfig {
    /// Check invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::config`] naming the offending field.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.project.trim().is_empty() {
            return Err(StoreError::config("EMPTY_PROJECT", "project must not be empty"));
        }
        if !(self.loader.frac > 0.0 && self.loader.frac <= 1.0) {
            return Err(StoreError::config(
                "INVALID_FRAC",
                format!("frac must be in (0, 1], got {}", self.loader.frac),
            ));
        }
        if self.loader.chunk_size == 0 {
            return Err(StoreError::config("INVALID_CHUNK_SIZE", "chunk_size must be at least 1"));
        }
        if self.loader.max_retries == 0 {
            return Err(StoreError::config("INVALID_RETRIES", "max_retries must be at least 1"));
        }
        if self.loader.char_length == 0 {
            return Err(StoreError::config("INVALID_CHAR_LENGTH", "char_length must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r"
project: demo
storage:
  root: /tmp/blobs
database:
  host: localhost
  user: etl
  dbname: warehouse
"
    }

    #[test]
    fn defaults_mirror_the_loader_contract() {
        let config: PipelineConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert!(config.loader.auto_resolve);
        assert!((config.loader.frac - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.loader.chunk_size, 20);
        assert_eq!(config.loader.large_batch_threshold, 500_000);
        assert!(!config.loader.interruption_mode);
        assert_eq!(config.loader.max_retries, 3);
        assert_eq!(config.loader.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.loader.char_length, 256);
        assert!(config.loader.override_length);
        assert!(!config.loader.strict_lengths);
        assert_eq!(config.storage.exclude, "catalog");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
    }

    #[test]
    fn connection_string_shape() {
        let config: PipelineConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(
            config.database.connection_string(),
            "host=localhost port=5432 user=etl password= dbname=warehouse"
        );
    }

    #[test]
    fn validate_rejects_bad_frac() {
        let mut config: PipelineConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.loader.frac = 0.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, "INVALID_FRAC");
        config.loader.frac = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retries_and_chunks() {
        let mut config: PipelineConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.loader.max_retries = 0;
        assert_eq!(config.validate().unwrap_err().code, "INVALID_RETRIES");
        config.loader.max_retries = 3;
        config.loader.chunk_size = 0;
        assert_eq!(config.validate().unwrap_err().code, "INVALID_CHUNK_SIZE");
    }

    #[test]
    fn column_policy_parses() {
        let yaml = r"
project: demo
storage:
  root: /tmp/blobs
database:
  host: localhost
  user: etl
  dbname: warehouse
columns:
  rename:
    old_name: new_name
  drop: [scratch, notes]
";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.columns.rename["old_name"], "new_name");
        assert_eq!(config.columns.drop, vec!["scratch", "notes"]);
    }
}
