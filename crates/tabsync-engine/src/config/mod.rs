//! Pipeline configuration: typed model plus YAML parsing.

mod parser;
mod types;

pub use parser::{parse_config, parse_config_str, substitute_env_vars};
pub use types::{
    ColumnPolicy, DatabaseConfig, LoaderConfig, PipelineConfig, StorageConfig,
};
