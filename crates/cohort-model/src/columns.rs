//! Canonical column names.
//!
//! Loaders are expected to rename their source columns to these names before
//! handing tables to the filter chain. Filters take the names as parameters
//! where a table may legitimately use something else.

/// Integer identifier of the entity (patient).
pub const ENTITY_ID: &str = "entity_id";
/// Timestamp of the row (prediction time, event time, outcome time).
pub const TIMESTAMP: &str = "timestamp";
/// Date of birth in a birthdays side table.
pub const DATE_OF_BIRTH: &str = "date_of_birth";
/// Age in years at `timestamp`, added by the age join.
pub const AGE: &str = "age";
/// Observation value.
pub const VALUE: &str = "value";
/// Which source produced an outcome row.
pub const CAUSE: &str = "cause";
/// Source table of a temporal event.
pub const SOURCE: &str = "source";
/// Optional event name (lab test, diagnosis code).
pub const NAME: &str = "name";
/// Stable textual key of a prediction time.
pub const PREDICTION_TIME_UUID: &str = "prediction_time_uuid";
