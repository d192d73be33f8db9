// src/merge/mod.rs
use anyhow::Result;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
    config::MergeConfig,
    error::MergeError,
    group::{filter_and_sort_with_report, group_by_month_with, MonthBucket, MonthBuckets},
    keys::KeyParser,
    store::{CsvStore, Row},
};

/// What one month's merge produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthReport {
    pub month: String,
    pub output_key: String,
    pub source_objects: usize,
    pub rows: usize,
    pub bytes: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub months: Vec<MonthReport>,
    /// Listed keys that carried no date and were left out.
    pub skipped_keys: usize,
}

impl MergeSummary {
    pub fn total_rows(&self) -> usize {
        self.months.iter().map(|m| m.rows).sum()
    }
}

/// List → filter/sort → group → merge, for one configured run.
#[instrument(level = "info", skip(config), fields(
    source = %format!("{}/{}", config.source.container, config.source.prefix),
    destination = %format!("{}/{}", config.destination.container, config.destination.prefix),
))]
pub async fn run(config: &MergeConfig) -> Result<MergeSummary> {
    let source = CsvStore::open(&config.source.container)?;
    let destination = if config.same_container() {
        source.clone()
    } else {
        CsvStore::open(&config.destination.container)?
    };
    run_with_stores(&source, &config.source.prefix, &destination, &config.destination.prefix).await
}

/// `run` against already-opened stores.
pub async fn run_with_stores(
    source: &CsvStore,
    source_prefix: &str,
    destination: &CsvStore,
    destination_prefix: &str,
) -> Result<MergeSummary> {
    let start = Instant::now();

    let listed = source.list_keys(source_prefix).await?;
    info!(count = listed.len(), "listed source objects");

    let mut parser = KeyParser::default();
    let (ordered, report) = filter_and_sort_with_report(&mut parser, listed);
    if !report.skipped.is_empty() {
        info!(
            skipped = report.skipped.len(),
            kept = report.kept,
            "skipped keys without a date"
        );
    }

    let buckets = group_by_month_with(&mut parser, &ordered)?;
    info!(months = buckets.len(), objects = buckets.total_keys(), "grouped by month");

    let mut summary = merge_all(source, destination, destination_prefix, &buckets).await?;
    summary.skipped_keys = report.skipped.len();

    info!(
        months = summary.months.len(),
        rows = summary.total_rows(),
        elapsed = ?start.elapsed(),
        "merge complete"
    );
    Ok(summary)
}

/// Merge every bucket into `<destination_prefix>/<Month>/merged.csv`, one month
/// at a time. A failure stops the run; months already written are left in place.
pub async fn merge_all(
    source: &CsvStore,
    destination: &CsvStore,
    destination_prefix: &str,
    buckets: &MonthBuckets,
) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    let total = buckets.len();

    for (idx, bucket) in buckets.iter().enumerate() {
        info!(month = %bucket.month, progress = %format!("{}/{}", idx + 1, total), "merging month");
        let report = merge_month(source, destination, destination_prefix, bucket).await?;
        summary.months.push(report);
    }

    Ok(summary)
}

#[instrument(level = "info", skip_all, fields(month = %bucket.month, objects = bucket.keys.len()))]
async fn merge_month(
    source: &CsvStore,
    destination: &CsvStore,
    destination_prefix: &str,
    bucket: &MonthBucket,
) -> Result<MonthReport> {
    let mut data: Vec<Row> = Vec::new();

    for (idx, key) in bucket.keys.iter().enumerate() {
        let rows = source.read_rows(key, true).await?;
        debug!(
            key = %key,
            rows = rows.len(),
            progress = %format!("{}/{}", idx + 1, bucket.keys.len()),
            "read source object"
        );
        data.extend(rows);
    }

    if data.is_empty() {
        return Err(MergeError::EmptyMonth {
            month: bucket.month.clone(),
        }
        .into());
    }

    let output_key = bucket.output_key(destination_prefix);
    let bytes = destination.write_rows(&output_key, &data).await?;

    Ok(MonthReport {
        month: bucket.month.clone(),
        output_key,
        source_objects: bucket.keys.len(),
        rows: data.len(),
        bytes,
    })
}
