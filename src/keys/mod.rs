// src/keys/mod.rs
use anyhow::Result;
use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MergeError;

/// Number of keys whose date lookup is remembered by a `KeyParser`.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

// ASCII digits only; Unicode \d would accept tokens chrono cannot parse
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date pattern is valid"));
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}")
        .expect("timestamp pattern is valid")
});

/// First `YYYY-MM-DD` substring of the key.
///
/// key format: `bricks/0592bcb1_2023-04-13T06:23:10.308337+00:00.csv` → `2023-04-13`
pub fn extract_date(key: &str) -> Option<String> {
    DATE_RE.find(key).map(|m| m.as_str().to_string())
}

/// First `YYYY-MM-DDTHH:MM:SS` substring of the key; fractional seconds and
/// offsets that follow it are not part of the match.
pub fn extract_timestamp(key: &str) -> Option<String> {
    TIMESTAMP_RE.find(key).map(|m| m.as_str().to_string())
}

/// Full English month name ("April") for a `YYYY-MM-DD` token.
pub fn month_name(date_token: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(date_token, "%Y-%m-%d").map_err(|source| {
        MergeError::InvalidDate {
            token: date_token.to_string(),
            source,
        }
    })?;
    Ok(date.format("%B").to_string())
}

/// Month name for the date embedded in `key`, or `None` when the key has no date.
pub fn month_name_from_key(key: &str) -> Result<Option<String>> {
    extract_date(key).map(|d| month_name(&d)).transpose()
}

/// Date extraction with a bounded memo of recent keys.
///
/// Filtering and grouping both look up each key's date; one parser shared
/// across a run scans each key once.
#[derive(Debug)]
pub struct KeyParser {
    capacity: usize,
    dates: IndexMap<String, Option<String>>,
}

impl Default for KeyParser {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl KeyParser {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            dates: IndexMap::with_capacity(capacity),
        }
    }

    pub fn date(&mut self, key: &str) -> Option<String> {
        if let Some(hit) = self.dates.get(key) {
            return hit.clone();
        }
        let date = extract_date(key);
        if self.capacity == 0 {
            return date;
        }
        // evict oldest
        if self.dates.len() >= self.capacity {
            self.dates.shift_remove_index(0);
        }
        self.dates.insert(key.to_string(), date.clone());
        date
    }

    pub fn month_name(&mut self, key: &str) -> Result<Option<String>> {
        self.date(key).map(|d| month_name(&d)).transpose()
    }

    pub fn cached(&self) -> usize {
        self.dates.len()
    }
}
