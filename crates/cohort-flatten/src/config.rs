//! TOML description of a flattening run.
//!
//! ```toml
//! static_features = ["sex"]
//!
//! [[predictors]]
//! feature = "hba1c"
//! source = "lab"
//! lookbehind_days = 730
//! aggregation = "mean"
//!
//! [[outcomes]]
//! feature = "t2d"
//! source = "diagnosis"
//! lookahead_days = 1826
//! aggregation = "has_values"
//! fallback = 0
//! ```

use std::fs;
use std::path::Path;

use cohort_model::columns;
use serde::Deserialize;

use crate::error::{FlattenError, Result};
use crate::flattener::Flattener;
use crate::specs::{OutcomeSpec, PredictorSpec, TimestampOutcomeSpec};

fn default_entity_id_col() -> String {
    columns::ENTITY_ID.to_string()
}

fn default_timestamp_col() -> String {
    columns::TIMESTAMP.to_string()
}

fn default_parallel() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlattenConfig {
    #[serde(default = "default_entity_id_col")]
    pub entity_id_col: String,
    #[serde(default = "default_timestamp_col")]
    pub timestamp_col: String,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub static_features: Vec<String>,
    #[serde(default)]
    pub predictors: Vec<PredictorSpec>,
    #[serde(default)]
    pub outcomes: Vec<OutcomeSpec>,
    #[serde(default)]
    pub timestamp_outcomes: Vec<TimestampOutcomeSpec>,
}

impl FlattenConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|source| FlattenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn into_flattener(self) -> Flattener {
        let mut flattener =
            Flattener::new().with_key_columns(self.entity_id_col, self.timestamp_col);
        if !self.parallel {
            flattener = flattener.sequential();
        }
        let flattener = self
            .predictors
            .into_iter()
            .fold(flattener, Flattener::add_predictor);
        let flattener = self
            .static_features
            .into_iter()
            .fold(flattener, Flattener::add_static_feature);
        let flattener = self
            .outcomes
            .into_iter()
            .fold(flattener, Flattener::add_outcome);
        self.timestamp_outcomes
            .into_iter()
            .fold(flattener, Flattener::add_timestamp_outcome)
    }
}
