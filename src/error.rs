use thiserror::Error;

/// Failures that end a merge run. I/O errors from the object store travel as
/// `anyhow` context chains; these are the ones callers may want to match on.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("date token '{token}' is not a valid YYYY-MM-DD calendar date")]
    InvalidDate {
        token: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("month '{month}' has no rows; at least one row is needed to write headers")]
    EmptyMonth { month: String },

    #[error("no rows to write to '{key}'; at least one row is needed to write headers")]
    NoRows { key: String },

    #[error("record {record} has column '{column}' outside the first row's header")]
    UnexpectedColumn { record: usize, column: String },

    #[error("cannot open object store for '{container}': {reason}")]
    InvalidLocation { container: String, reason: String },
}
