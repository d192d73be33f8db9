pub mod config;
pub mod error;
pub mod group;
pub mod keys;
pub mod merge;
pub mod store;

pub use config::{MergeConfig, ObjectLocation};
pub use error::MergeError;
pub use group::{MonthBucket, MonthBuckets};
pub use merge::{merge_all, run, MergeSummary, MonthReport};
pub use store::{CsvStore, Row};
