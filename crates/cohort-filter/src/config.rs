//! TOML description of a filter chain.
//!
//! ```toml
//! entity_id_col = "entity_id"
//! timestamp_col = "timestamp"
//!
//! [[steps]]
//! filter = "min_date"
//! date = "2013-01-01"
//!
//! [[steps]]
//! filter = "join_age"
//! side_table = "birthdays"
//! ```
//!
//! Dates are quoted `YYYY-MM-DD` strings. Every key of a step other than
//! `filter` and `name` is passed to the filter's factory.

use std::fs;
use std::path::Path;

use cohort_model::columns;
use serde::Deserialize;

use crate::chain::FilterChain;
use crate::error::ConfigError;
use crate::filter::KeyColumns;
use crate::registry::{FilterContext, FilterRegistry, SideTables, StepParams};

fn default_entity_id_col() -> String {
    columns::ENTITY_ID.to_string()
}

fn default_timestamp_col() -> String {
    columns::TIMESTAMP.to_string()
}

/// A chain as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_entity_id_col")]
    pub entity_id_col: String,
    #[serde(default = "default_timestamp_col")]
    pub timestamp_col: String,
    #[serde(default)]
    pub allow_duplicate_keys: bool,
    #[serde(default)]
    pub steps: Vec<StepParams>,
}

impl ChainConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn keys(&self) -> KeyColumns {
        KeyColumns::new(self.entity_id_col.clone(), self.timestamp_col.clone())
    }

    /// Resolve every step through `registry` and assemble the chain.
    pub fn build_chain(
        &self,
        registry: &FilterRegistry,
        side_tables: &SideTables,
    ) -> Result<FilterChain, ConfigError> {
        let keys = self.keys();
        let ctx = FilterContext {
            keys: &keys,
            side_tables,
        };
        let mut chain = FilterChain::new(self.entity_id_col.clone())
            .with_timestamp_col(self.timestamp_col.clone());
        if self.allow_duplicate_keys {
            chain = chain.allow_duplicate_keys();
        }
        for step in &self.steps {
            chain = chain.add_boxed(registry.build(step, &ctx)?);
        }
        tracing::debug!(steps = chain.len(), "built filter chain from config");
        Ok(chain)
    }
}
