//! Building timelines from long-format event and static tables.

use std::collections::BTreeMap;

use cohort_common::{any_to_datetime, any_to_i64, any_to_string, format_numeric};
use cohort_model::{EventValue, StaticFeature, TemporalEvent, columns};
use polars::prelude::{AnyValue, Column, DataFrame};
use tracing::debug;

use crate::error::{Result, TimelineError};
use crate::patient::Patient;

/// Source label for events read from a table without a source column.
pub const DEFAULT_SOURCE: &str = "events";

/// Column names of the event and static tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineColumns {
    pub entity_id: String,
    pub timestamp: String,
    /// Optional on the events table.
    pub source: Option<String>,
    /// Event name on the events table (optional); feature name on the static table.
    pub name: Option<String>,
    pub value: String,
}

impl Default for TimelineColumns {
    fn default() -> Self {
        Self {
            entity_id: columns::ENTITY_ID.to_string(),
            timestamp: columns::TIMESTAMP.to_string(),
            source: Some(columns::SOURCE.to_string()),
            name: Some(columns::NAME.to_string()),
            value: columns::VALUE.to_string(),
        }
    }
}

/// Convert a cell into an event value; `None` for nulls.
pub fn event_value(value: AnyValue<'_>) -> Option<EventValue> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(EventValue::Text(s.to_string())),
        AnyValue::StringOwned(s) => Some(EventValue::Text(s.to_string())),
        AnyValue::Boolean(b) => Some(EventValue::Numeric(if b { 1.0 } else { 0.0 })),
        other => match cohort_common::any_to_f64(other.clone()) {
            Some(v) => Some(EventValue::Numeric(v)),
            None => Some(EventValue::Text(any_to_string(other))),
        },
    }
}

fn column<'a>(df: &'a DataFrame, table: &'static str, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| TimelineError::ColumnMissing {
        table,
        column: name.to_string(),
    })
}

/// Optional column: present in the frame only when configured and found.
fn optional_column<'a>(df: &'a DataFrame, name: Option<&str>) -> Option<&'a Column> {
    name.and_then(|n| df.column(n).ok())
}

fn text_cell(column: Option<&Column>, row: usize) -> Result<Option<String>> {
    let Some(column) = column else {
        return Ok(None);
    };
    let text = any_to_string(column.get(row)?);
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Group long-format tables into one timeline per entity, ascending by entity id.
///
/// The events table needs entity, timestamp and value columns; source and
/// name are read when present. The optional statics table needs entity,
/// name and value columns. Rows with a null value are skipped. Entities that
/// only appear in the statics table get a timeline without events.
pub fn patients_from_frames(
    events: &DataFrame,
    statics: Option<&DataFrame>,
    cols: &TimelineColumns,
) -> Result<Vec<Patient>> {
    let mut grouped: BTreeMap<i64, (Vec<TemporalEvent>, Vec<StaticFeature>)> = BTreeMap::new();

    let entity_col = column(events, "events", &cols.entity_id)?;
    let ts_col = column(events, "events", &cols.timestamp)?;
    let value_col = column(events, "events", &cols.value)?;
    let source_col = optional_column(events, cols.source.as_deref());
    let name_col = optional_column(events, cols.name.as_deref());

    let mut skipped = 0usize;
    for row in 0..events.height() {
        let entity_id = any_to_i64(entity_col.get(row)?).ok_or_else(|| TimelineError::InvalidKey {
            table: "events",
            column: cols.entity_id.clone(),
            row,
        })?;
        let timestamp = any_to_datetime(ts_col.get(row)?).ok_or_else(|| TimelineError::InvalidKey {
            table: "events",
            column: cols.timestamp.clone(),
            row,
        })?;
        let Some(value) = event_value(value_col.get(row)?) else {
            skipped += 1;
            continue;
        };
        let source = text_cell(source_col, row)?.unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let mut event = TemporalEvent::new(entity_id, timestamp, source, value);
        event.name = text_cell(name_col, row)?;
        grouped.entry(entity_id).or_default().0.push(event);
    }

    if let Some(statics) = statics {
        let name_field = cols.name.as_deref().unwrap_or(columns::NAME);
        let entity_col = column(statics, "statics", &cols.entity_id)?;
        let name_col = column(statics, "statics", name_field)?;
        let value_col = column(statics, "statics", &cols.value)?;
        for row in 0..statics.height() {
            let entity_id =
                any_to_i64(entity_col.get(row)?).ok_or_else(|| TimelineError::InvalidKey {
                    table: "statics",
                    column: cols.entity_id.clone(),
                    row,
                })?;
            let Some(value) = event_value(value_col.get(row)?) else {
                skipped += 1;
                continue;
            };
            let name = any_to_string(name_col.get(row)?);
            grouped
                .entry(entity_id)
                .or_default()
                .1
                .push(StaticFeature::new(name, value));
        }
    }

    debug!(
        entities = grouped.len(),
        event_rows = events.height(),
        skipped_null_values = skipped,
        "grouped timelines"
    );

    grouped
        .into_iter()
        .map(|(entity_id, (events, statics))| Patient::new(entity_id, events, statics))
        .collect()
}

/// Render an event value the way it appears in string columns.
pub fn value_to_string(value: &EventValue) -> String {
    match value {
        EventValue::Numeric(v) => format_numeric(*v),
        EventValue::Text(s) => s.clone(),
    }
}
