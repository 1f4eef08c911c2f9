//! Deriving one outcome timestamp per entity from several outcome tables.

use cohort_model::columns;
use polars::prelude::{
    DataFrame, DataType, IntoLazy, LazyFrame, SortMultipleOptions, TimeUnit, UnionArgs, col, concat,
    lit,
};
use tracing::debug;

use crate::error::{CohortError, Result};

/// One outcome table and the label it contributes as `cause`.
#[derive(Debug, Clone)]
pub struct OutcomeSource {
    pub cause: String,
    pub table: DataFrame,
}

impl OutcomeSource {
    pub fn new(cause: impl Into<String>, table: DataFrame) -> Self {
        Self {
            cause: cause.into(),
            table,
        }
    }
}

fn normalized(source: &OutcomeSource) -> Result<LazyFrame> {
    for column in [columns::ENTITY_ID, columns::TIMESTAMP] {
        if source.table.column(column).is_err() {
            return Err(CohortError::ColumnMissing {
                table: source.cause.clone(),
                column: column.to_string(),
            });
        }
    }
    Ok(source.table.clone().lazy().select([
        col(columns::ENTITY_ID).cast(DataType::Int64),
        col(columns::TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
        lit(source.cause.as_str()).alias(columns::CAUSE),
    ]))
}

/// Union the sources and keep each entity's earliest outcome.
///
/// Output columns are `entity_id`, `timestamp`, `value` (always 1) and
/// `cause`, sorted by entity. Rows with a null timestamp are ignored. When
/// two sources share the earliest timestamp the alphabetically first cause
/// wins.
pub fn earliest_outcome_per_entity(sources: &[OutcomeSource]) -> Result<DataFrame> {
    let frames = sources.iter().map(normalized).collect::<Result<Vec<_>>>()?;
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }

    let earliest = concat(frames, UnionArgs::default())?
        .filter(col(columns::TIMESTAMP).is_not_null())
        .sort(
            [columns::ENTITY_ID, columns::TIMESTAMP, columns::CAUSE],
            SortMultipleOptions::default(),
        )
        .group_by_stable([col(columns::ENTITY_ID)])
        .agg([
            col(columns::TIMESTAMP).first(),
            col(columns::CAUSE).first(),
        ])
        .select([
            col(columns::ENTITY_ID),
            col(columns::TIMESTAMP),
            lit(1i64).alias(columns::VALUE),
            col(columns::CAUSE),
        ])
        .collect()?;

    debug!(
        sources = sources.len(),
        entities = earliest.height(),
        "derived earliest outcome per entity"
    );
    Ok(earliest)
}
