//! The result of running a filter chain.

use std::fs::{self, File};
use std::path::Path;

use polars::prelude::{DataFrame, IpcReader, IpcWriter, SerReader, SerWriter};

use crate::delta::StepDelta;
use crate::error::{ModelError, Result};

const TABLE_FILE: &str = "prediction_times.arrow";
const STEPS_FILE: &str = "filter_steps.json";

/// Eligible prediction times plus the provenance trail that produced them.
#[derive(Debug, Clone)]
pub struct FilteredPredictionTimeBundle {
    pub prediction_times: DataFrame,
    pub filter_steps: Vec<StepDelta>,
}

impl FilteredPredictionTimeBundle {
    pub fn new(prediction_times: DataFrame, filter_steps: Vec<StepDelta>) -> Self {
        Self {
            prediction_times,
            filter_steps,
        }
    }

    /// Number of surviving prediction times.
    pub fn n_rows(&self) -> usize {
        self.prediction_times.height()
    }

    /// Steps that removed every remaining row.
    pub fn empty_steps(&self) -> impl Iterator<Item = &StepDelta> {
        self.filter_steps.iter().filter(|s| s.is_empty_result())
    }

    /// One line per step, in application order.
    pub fn flow_chart(&self) -> String {
        self.filter_steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the table (Arrow IPC) and the step trail (JSON) into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| ModelError::io("create directory", dir, e))?;

        let table_path = dir.join(TABLE_FILE);
        let mut file =
            File::create(&table_path).map_err(|e| ModelError::io("create", &table_path, e))?;
        let mut table = self.prediction_times.clone();
        IpcWriter::new(&mut file).finish(&mut table)?;

        let steps_path = dir.join(STEPS_FILE);
        let json = serde_json::to_vec_pretty(&self.filter_steps).map_err(|e| {
            ModelError::StepTrail {
                path: steps_path.clone(),
                source: e,
            }
        })?;
        fs::write(&steps_path, json).map_err(|e| ModelError::io("write", &steps_path, e))?;

        tracing::debug!(
            dir = %dir.display(),
            rows = table.height(),
            steps = self.filter_steps.len(),
            "saved prediction-time bundle"
        );
        Ok(())
    }

    /// Restore a bundle written by [`save`](Self::save).
    pub fn load(dir: &Path) -> Result<Self> {
        let table_path = dir.join(TABLE_FILE);
        let file = File::open(&table_path).map_err(|e| ModelError::io("open", &table_path, e))?;
        let prediction_times = IpcReader::new(file).finish()?;

        let steps_path = dir.join(STEPS_FILE);
        let bytes = fs::read(&steps_path).map_err(|e| ModelError::io("read", &steps_path, e))?;
        let filter_steps = serde_json::from_slice(&bytes).map_err(|e| ModelError::StepTrail {
            path: steps_path.clone(),
            source: e,
        })?;

        Ok(Self {
            prediction_times,
            filter_steps,
        })
    }
}
