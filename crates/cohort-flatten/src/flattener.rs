//! Turns prediction times and timelines into one feature/label row each.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{NaiveDateTime, TimeDelta};
use cohort_common::{integer_column, timestamp_column};
use cohort_model::{EventValue, TemporalEvent, columns};
use cohort_timeline::{Patient, PredictionTime, prediction_time_uuid, value_to_string};
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::error::{FlattenError, Result};
use crate::specs::{OutcomeSpec, PredictorSpec, TimestampOutcomeSpec};

type Group = (i64, Vec<(usize, NaiveDateTime)>);

/// Resolved window lengths, in spec order.
struct Windows {
    predictors: Vec<TimeDelta>,
    outcomes: Vec<TimeDelta>,
    labels: Vec<TimeDelta>,
}

/// Flattened values of one entity's rows.
struct EntityRows {
    /// Row index in the input table and that row's numeric cells.
    rows: Vec<(usize, Vec<Option<f64>>)>,
    statics: Vec<Option<EventValue>>,
}

/// Windowed aggregation over entity timelines.
///
/// Output columns: entity id, timestamp, `prediction_time_uuid`, then one
/// column per predictor, static feature, outcome and timestamp label, in the
/// order they were added. Output rows follow the input row order.
#[derive(Debug, Clone)]
pub struct Flattener {
    predictors: Vec<PredictorSpec>,
    outcomes: Vec<OutcomeSpec>,
    timestamp_outcomes: Vec<TimestampOutcomeSpec>,
    static_features: Vec<String>,
    entity_id_col: String,
    timestamp_col: String,
    parallel: bool,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            predictors: Vec::new(),
            outcomes: Vec::new(),
            timestamp_outcomes: Vec::new(),
            static_features: Vec::new(),
            entity_id_col: columns::ENTITY_ID.to_string(),
            timestamp_col: columns::TIMESTAMP.to_string(),
            parallel: true,
        }
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_predictor(mut self, spec: PredictorSpec) -> Self {
        self.predictors.push(spec);
        self
    }

    #[must_use]
    pub fn add_outcome(mut self, spec: OutcomeSpec) -> Self {
        self.outcomes.push(spec);
        self
    }

    #[must_use]
    pub fn add_timestamp_outcome(mut self, spec: TimestampOutcomeSpec) -> Self {
        self.timestamp_outcomes.push(spec);
        self
    }

    /// Emit the named static feature as `pred_{name}`.
    #[must_use]
    pub fn add_static_feature(mut self, name: impl Into<String>) -> Self {
        self.static_features.push(name.into());
        self
    }

    #[must_use]
    pub fn with_key_columns(
        mut self,
        entity_id_col: impl Into<String>,
        timestamp_col: impl Into<String>,
    ) -> Self {
        self.entity_id_col = entity_id_col.into();
        self.timestamp_col = timestamp_col.into();
        self
    }

    /// Process entities one after another on the calling thread.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Output column names, in output order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            self.entity_id_col.clone(),
            self.timestamp_col.clone(),
            columns::PREDICTION_TIME_UUID.to_string(),
        ];
        names.extend(self.predictors.iter().map(PredictorSpec::column_name));
        names.extend(self.static_features.iter().map(|n| format!("pred_{n}")));
        names.extend(self.outcomes.iter().map(OutcomeSpec::column_name));
        names.extend(
            self.timestamp_outcomes
                .iter()
                .map(TimestampOutcomeSpec::column_name),
        );
        names
    }

    fn resolve_windows(&self) -> Result<Windows> {
        let mut seen = HashSet::new();
        for name in self.column_names() {
            if !seen.insert(name.clone()) {
                return Err(FlattenError::DuplicateColumn { name });
            }
        }
        Ok(Windows {
            predictors: self
                .predictors
                .iter()
                .map(PredictorSpec::lookbehind)
                .collect::<Result<_>>()?,
            outcomes: self
                .outcomes
                .iter()
                .map(OutcomeSpec::lookahead)
                .collect::<Result<_>>()?,
            labels: self
                .timestamp_outcomes
                .iter()
                .map(TimestampOutcomeSpec::lookahead)
                .collect::<Result<_>>()?,
        })
    }

    /// Flatten every row of `prediction_times`.
    ///
    /// `outcome_timestamps` maps entity ids to the outcome timestamp used by
    /// timestamp labels. Entities without a timeline get fallback values.
    pub fn flatten(
        &self,
        prediction_times: &DataFrame,
        patients: &[Patient],
        outcome_timestamps: &HashMap<i64, NaiveDateTime>,
    ) -> Result<DataFrame> {
        let windows = self.resolve_windows()?;
        let (entities, timestamps) = self.read_keys(prediction_times)?;

        let mut grouped: BTreeMap<i64, Vec<(usize, NaiveDateTime)>> = BTreeMap::new();
        for (row, (entity, timestamp)) in entities.iter().zip(&timestamps).enumerate() {
            grouped.entry(*entity).or_default().push((row, *timestamp));
        }
        let groups: Vec<Group> = grouped.into_iter().collect();
        let by_id: HashMap<i64, &Patient> = patients.iter().map(|p| (p.entity_id(), p)).collect();

        let span = info_span!(
            "flatten",
            rows = entities.len(),
            entities = groups.len(),
            parallel = self.parallel
        );
        let _guard = span.enter();

        let compute = |(entity, rows): &Group| {
            self.flatten_entity(
                *entity,
                rows,
                by_id.get(entity).copied(),
                outcome_timestamps.get(entity).copied(),
                &windows,
            )
        };
        let results: Vec<EntityRows> = if self.parallel {
            groups.par_iter().map(compute).collect()
        } else {
            groups.iter().map(compute).collect()
        };

        let frame = self.assemble(&entities, &timestamps, results)?;
        info!(rows = frame.height(), columns = frame.width(), "flattened prediction times");
        Ok(frame)
    }

    fn read_keys(&self, table: &DataFrame) -> Result<(Vec<i64>, Vec<NaiveDateTime>)> {
        for column in [&self.entity_id_col, &self.timestamp_col] {
            if table.column(column).is_err() {
                return Err(FlattenError::ColumnMissing {
                    column: column.clone(),
                });
            }
        }
        let invalid = |column: &str, row: usize| FlattenError::InvalidKey {
            column: column.to_string(),
            row,
        };
        let entities = integer_column(table, &self.entity_id_col)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| v.ok_or_else(|| invalid(&self.entity_id_col, row)))
            .collect::<Result<Vec<_>>>()?;
        let timestamps = timestamp_column(table, &self.timestamp_col)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| v.ok_or_else(|| invalid(&self.timestamp_col, row)))
            .collect::<Result<Vec<_>>>()?;
        Ok((entities, timestamps))
    }

    fn flatten_entity(
        &self,
        entity_id: i64,
        rows: &[(usize, NaiveDateTime)],
        patient: Option<&Patient>,
        outcome_timestamp: Option<NaiveDateTime>,
        windows: &Windows,
    ) -> EntityRows {
        let stamps: Vec<NaiveDateTime> = rows.iter().map(|(_, t)| *t).collect();
        let width = self.predictors.len() + self.outcomes.len() + self.timestamp_outcomes.len();
        let mut cells: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(width); rows.len()];

        for (spec, lookbehind) in self.predictors.iter().zip(&windows.predictors) {
            let source = spec.source.as_deref();
            let name = spec.event_name.as_deref();
            match patient {
                Some(patient) => {
                    let times =
                        patient.to_prediction_times(*lookbehind, &stamps, outcome_timestamp);
                    for (row, time) in cells.iter_mut().zip(&times) {
                        let value = spec.aggregation.apply(time.events_matching(source, name));
                        row.push(value.or(spec.fallback));
                    }
                }
                None => {
                    let value = spec.aggregation.apply(no_events()).or(spec.fallback);
                    cells.iter_mut().for_each(|row| row.push(value));
                }
            }
        }

        for (spec, lookahead) in self.outcomes.iter().zip(&windows.outcomes) {
            let source = spec.source.as_deref();
            let name = spec.event_name.as_deref();
            for (row, t) in cells.iter_mut().zip(&stamps) {
                let value = match patient {
                    Some(patient) => spec.aggregation.apply(
                        patient
                            .lookahead_events(*t, *lookahead)
                            .iter()
                            .filter(|e| e.matches(source, name)),
                    ),
                    None => spec.aggregation.apply(no_events()),
                };
                row.push(value.or(spec.fallback));
            }
        }

        for lookahead in &windows.labels {
            for (row, t) in cells.iter_mut().zip(&stamps) {
                let time = PredictionTime {
                    entity_id,
                    prediction_timestamp: *t,
                    outcome_timestamp,
                    static_features: &[],
                    temporal_events: &[],
                };
                row.push(Some(if time.outcome_within(*lookahead) { 1.0 } else { 0.0 }));
            }
        }

        let statics = self
            .static_features
            .iter()
            .map(|name| {
                patient
                    .and_then(|p| p.static_feature(name))
                    .map(|f| f.value.clone())
            })
            .collect();

        debug!(entity_id, rows = rows.len(), has_timeline = patient.is_some(), "flattened entity");
        EntityRows {
            rows: rows.iter().map(|(row, _)| *row).zip(cells).collect(),
            statics,
        }
    }

    fn assemble(
        &self,
        entities: &[i64],
        timestamps: &[NaiveDateTime],
        results: Vec<EntityRows>,
    ) -> Result<DataFrame> {
        let n = entities.len();
        let width = self.predictors.len() + self.outcomes.len() + self.timestamp_outcomes.len();
        let mut numeric: Vec<Vec<Option<f64>>> = vec![vec![None; n]; width];
        let mut statics: Vec<Vec<Option<EventValue>>> =
            vec![vec![None; n]; self.static_features.len()];

        for entity in results {
            for (row, cells) in entity.rows {
                for (column, value) in numeric.iter_mut().zip(cells) {
                    column[row] = value;
                }
                for (column, value) in statics.iter_mut().zip(&entity.statics) {
                    column[row] = value.clone();
                }
            }
        }

        let uuids: Vec<String> = entities
            .iter()
            .zip(timestamps)
            .map(|(e, t)| prediction_time_uuid(*e, *t))
            .collect();
        let mut out: Vec<Column> = vec![
            Series::new(self.entity_id_col.as_str().into(), entities.to_vec()).into_column(),
            Series::new(self.timestamp_col.as_str().into(), timestamps.to_vec()).into_column(),
            Series::new(columns::PREDICTION_TIME_UUID.into(), uuids).into_column(),
        ];

        let mut numeric = numeric.into_iter();
        for spec in &self.predictors {
            if let Some(values) = numeric.next() {
                out.push(Series::new(spec.column_name().into(), values).into_column());
            }
        }
        for (name, values) in self.static_features.iter().zip(statics) {
            out.push(static_column(&format!("pred_{name}"), &values));
        }
        let label_names = self
            .outcomes
            .iter()
            .map(OutcomeSpec::column_name)
            .chain(self.timestamp_outcomes.iter().map(TimestampOutcomeSpec::column_name));
        for (name, values) in label_names.zip(numeric) {
            out.push(Series::new(name.into(), values).into_column());
        }

        Ok(DataFrame::new(out)?)
    }
}

fn no_events() -> std::iter::Empty<&'static TemporalEvent> {
    std::iter::empty()
}

/// Float64 when every present value is numeric, String otherwise.
fn static_column(name: &str, values: &[Option<EventValue>]) -> Column {
    let all_numeric = values.iter().flatten().all(EventValue::is_numeric);
    if all_numeric {
        let numbers: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.as_ref().and_then(EventValue::as_f64))
            .collect();
        Series::new(name.into(), numbers).into_column()
    } else {
        let text: Vec<Option<String>> = values
            .iter()
            .map(|v| v.as_ref().map(value_to_string))
            .collect();
        Series::new(name.into(), text).into_column()
    }
}

/// Earliest timestamp per entity of an outcome table.
pub fn outcome_timestamps_from_frame(
    outcomes: &DataFrame,
    entity_id_col: &str,
    timestamp_col: &str,
) -> Result<HashMap<i64, NaiveDateTime>> {
    for column in [entity_id_col, timestamp_col] {
        if outcomes.column(column).is_err() {
            return Err(FlattenError::ColumnMissing {
                column: column.to_string(),
            });
        }
    }
    let entities = integer_column(outcomes, entity_id_col)?;
    let timestamps = timestamp_column(outcomes, timestamp_col)?;
    let mut earliest: HashMap<i64, NaiveDateTime> = HashMap::new();
    for (entity, timestamp) in entities.into_iter().zip(timestamps) {
        let (Some(entity), Some(timestamp)) = (entity, timestamp) else {
            continue;
        };
        earliest
            .entry(entity)
            .and_modify(|t| *t = (*t).min(timestamp))
            .or_insert(timestamp);
    }
    Ok(earliest)
}
