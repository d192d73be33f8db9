// src/group/mod.rs
use anyhow::Result;
use indexmap::IndexMap;
use tracing::debug;

use crate::keys::KeyParser;

/// Source objects for one calendar month, in date order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    pub month: String,
    pub keys: Vec<String>,
}

impl MonthBucket {
    /// `<prefix>/<Month>/merged.csv`, without a leading slash when `prefix` is empty.
    pub fn output_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{}/merged.csv", self.month)
        } else {
            format!("{}/{}/merged.csv", prefix, self.month)
        }
    }
}

/// Month name → bucket, iterated in the order months were first seen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonthBuckets {
    buckets: IndexMap<String, MonthBucket>,
}

impl MonthBuckets {
    pub fn push(&mut self, month: String, key: String) {
        self.buckets
            .entry(month.clone())
            .or_insert_with(|| MonthBucket {
                month,
                keys: Vec::new(),
            })
            .keys
            .push(key);
    }

    pub fn get(&self, month: &str) -> Option<&MonthBucket> {
        self.buckets.get(month)
    }

    pub fn months(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonthBucket> {
        self.buckets.values()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_keys(&self) -> usize {
        self.buckets.values().map(|b| b.keys.len()).sum()
    }
}

impl<'a> IntoIterator for &'a MonthBuckets {
    type Item = &'a MonthBucket;
    type IntoIter = indexmap::map::Values<'a, String, MonthBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.values()
    }
}

/// What `filter_and_sort_with_report` kept and dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub kept: usize,
    pub skipped: Vec<String>,
}

/// Drop keys with no date token and stable-sort the rest by it.
pub fn filter_and_sort<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    filter_and_sort_with_report(&mut KeyParser::default(), keys).0
}

pub fn filter_and_sort_with_report<I, S>(
    parser: &mut KeyParser,
    keys: I,
) -> (Vec<String>, FilterReport)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut report = FilterReport::default();
    let mut dated: Vec<(String, String)> = Vec::new();

    for key in keys {
        let key = key.into();
        match parser.date(&key) {
            Some(date) => dated.push((date, key)),
            None => {
                debug!(key = %key, "no date in key, skipping");
                report.skipped.push(key);
            }
        }
    }

    // zero-padded YYYY-MM-DD sorts chronologically as a string; sort_by is stable
    dated.sort_by(|a, b| a.0.cmp(&b.0));
    report.kept = dated.len();

    (dated.into_iter().map(|(_, key)| key).collect(), report)
}

/// Partition date-sorted keys by month name in a single pass.
pub fn group_by_month(ordered_keys: &[String]) -> Result<MonthBuckets> {
    group_by_month_with(&mut KeyParser::default(), ordered_keys)
}

pub fn group_by_month_with(
    parser: &mut KeyParser,
    ordered_keys: &[String],
) -> Result<MonthBuckets> {
    let mut buckets = MonthBuckets::default();
    for key in ordered_keys {
        // undated keys never make it past filter_and_sort
        if let Some(month) = parser.month_name(key)? {
            buckets.push(month, key.clone());
        }
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::extract_date;

    fn scenario_keys() -> Vec<String> {
        vec![
            "a_2023-04-01T10:00:00.csv".to_string(),
            "b_2023-04-15T11:00:00.csv".to_string(),
            "c_no-date.csv".to_string(),
            "d_2023-05-02T09:00:00.csv".to_string(),
        ]
    }

    #[test]
    fn test_scenario_filter_sort_group() {
        let sorted = filter_and_sort(scenario_keys());
        assert_eq!(
            sorted,
            vec![
                "a_2023-04-01T10:00:00.csv",
                "b_2023-04-15T11:00:00.csv",
                "d_2023-05-02T09:00:00.csv",
            ]
        );

        let buckets = group_by_month(&sorted).unwrap();
        assert_eq!(buckets.months().collect::<Vec<_>>(), vec!["April", "May"]);
        assert_eq!(
            buckets.get("April").unwrap().keys,
            vec!["a_2023-04-01T10:00:00.csv", "b_2023-04-15T11:00:00.csv"]
        );
        assert_eq!(
            buckets.get("May").unwrap().keys,
            vec!["d_2023-05-02T09:00:00.csv"]
        );
    }

    #[test]
    fn test_sort_is_chronological_and_stable() {
        let keys = vec![
            "z_2023-06-01.csv",
            "first_2023-01-10.csv",
            "y_2022-12-31.csv",
            "second_2023-01-10.csv",
            "nodate.csv",
            "third_2023-01-10.csv",
        ];
        let sorted = filter_and_sort(keys);
        assert_eq!(
            sorted,
            vec![
                "y_2022-12-31.csv",
                "first_2023-01-10.csv",
                "second_2023-01-10.csv",
                "third_2023-01-10.csv",
                "z_2023-06-01.csv",
            ]
        );

        let dates: Vec<String> = sorted.iter().filter_map(|k| extract_date(k)).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_report_lists_skipped_keys() {
        let mut parser = KeyParser::default();
        let (sorted, report) = filter_and_sort_with_report(&mut parser, scenario_keys());
        assert_eq!(sorted.len(), 3);
        assert_eq!(report.kept, 3);
        assert_eq!(report.skipped, vec!["c_no-date.csv"]);
    }

    #[test]
    fn test_grouping_partitions_exactly() {
        let keys = vec![
            "x/2023-01-05T00:00:00.csv",
            "x/2023-01-20T00:00:00.csv",
            "x/2023-02-01T00:00:00.csv",
            "x/2023-03-31T00:00:00.csv",
            "x/2023-03-01T00:00:00.csv",
        ];
        let sorted = filter_and_sort(keys);
        let buckets = group_by_month(&sorted).unwrap();

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets.total_keys(), sorted.len());

        // concatenating buckets in order gives back the sorted input
        let flattened: Vec<String> = buckets.iter().flat_map(|b| b.keys.clone()).collect();
        assert_eq!(flattened, sorted);

        for bucket in &buckets {
            for key in &bucket.keys {
                let month = crate::keys::month_name_from_key(key).unwrap().unwrap();
                assert_eq!(month, bucket.month);
            }
        }
    }

    #[test]
    fn test_same_month_different_years_share_bucket() {
        let sorted = filter_and_sort(vec![
            "a_2022-04-01.csv",
            "b_2022-05-01.csv",
            "c_2023-04-01.csv",
        ]);
        let buckets = group_by_month(&sorted).unwrap();
        assert_eq!(buckets.months().collect::<Vec<_>>(), vec!["April", "May"]);
        assert_eq!(
            buckets.get("April").unwrap().keys,
            vec!["a_2022-04-01.csv", "c_2023-04-01.csv"]
        );
    }

    #[test]
    fn test_empty_input() {
        let sorted = filter_and_sort(Vec::<String>::new());
        assert!(sorted.is_empty());
        assert!(group_by_month(&sorted).unwrap().is_empty());

        let only_undated = filter_and_sort(vec!["a.csv", "b.csv"]);
        assert!(group_by_month(&only_undated).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_calendar_date_is_fatal() {
        let sorted = filter_and_sort(vec!["a_2023-04-01.csv", "b_2023-99-01.csv"]);
        assert_eq!(sorted.len(), 2);
        assert!(group_by_month(&sorted).is_err());
    }

    #[test]
    fn test_output_key() {
        let bucket = MonthBucket {
            month: "April".into(),
            keys: vec![],
        };
        assert_eq!(bucket.output_key("merged"), "merged/April/merged.csv");
        assert_eq!(bucket.output_key("merged/"), "merged/April/merged.csv");
        assert_eq!(bucket.output_key(""), "April/merged.csv");
    }
}
