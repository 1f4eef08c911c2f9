//! Sources of whole tables.

use std::path::PathBuf;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::debug;

use crate::error::{CohortError, Result};

/// Produces one table. `(id, version)` identifies its content for caching;
/// bump the version when the underlying data or its query changes.
pub trait TableLoader: Send + Sync {
    fn id(&self) -> &str;

    fn version(&self) -> u32 {
        1
    }

    fn load(&self) -> Result<DataFrame>;
}

/// Reads a CSV file with a header row. Datetime-looking columns are parsed.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    id: String,
    path: PathBuf,
    version: u32,
}

impl CsvLoader {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            version: 1,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl TableLoader for CsvLoader {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn load(&self) -> Result<DataFrame> {
        let load_error = |source| CohortError::Load {
            table: self.id.clone(),
            source,
        };
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .map_parse_options(|opts| opts.with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .map_err(load_error)?
            .finish()
            .map_err(load_error)?;
        debug!(table = %self.id, path = %self.path.display(), rows = df.height(), "loaded csv");
        Ok(df)
    }
}

/// A table already in memory.
#[derive(Debug, Clone)]
pub struct FrameLoader {
    id: String,
    frame: DataFrame,
    version: u32,
}

impl FrameLoader {
    pub fn new(id: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            id: id.into(),
            frame,
            version: 1,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl TableLoader for FrameLoader {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn load(&self) -> Result<DataFrame> {
        Ok(self.frame.clone())
    }
}
