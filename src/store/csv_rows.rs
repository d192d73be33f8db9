// src/store/csv_rows.rs
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashSet;
use tracing::trace;

use super::Row;
use crate::error::MergeError;

/// Column added to every merged row, holding the source key's timestamp.
pub const DATE_COLUMN: &str = "date";

/// Parse CSV bytes whose first line is the header into ordered rows.
///
/// Short records are padded with empty values; fields beyond the header are
/// dropped. Blank lines are skipped by the reader.
pub fn decode_rows(data: &[u8]) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = rdr.headers().context("reading CSV header")?.clone();
    let mut rows = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        if record.len() > headers.len() {
            trace!(
                record = idx,
                extra = record.len() - headers.len(),
                "dropping fields beyond header"
            );
        }
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_string(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Set `date` on every row: overwritten in place if the column exists,
/// appended as the last column otherwise. A missing timestamp stamps "".
pub fn stamp_rows(rows: &mut [Row], timestamp: Option<&str>) {
    let value = timestamp.unwrap_or("");
    for row in rows.iter_mut() {
        row.insert(DATE_COLUMN.to_string(), value.to_string());
    }
}

/// Encode rows as CSV using the first row's columns as the header.
///
/// Columns a later row lacks are written empty. A later row carrying a column
/// outside the header fails with `MergeError::UnexpectedColumn`.
pub fn encode_rows(rows: &[Row]) -> Result<Vec<u8>> {
    let first = rows
        .first()
        .ok_or_else(|| anyhow!("cannot encode CSV without at least one row"))?;
    let header: Vec<&str> = first.keys().map(String::as_str).collect();
    let known: HashSet<&str> = header.iter().copied().collect();

    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(&header).context("writing CSV header")?;
    for (idx, row) in rows.iter().enumerate() {
        if let Some(column) = row.keys().find(|k| !known.contains(k.as_str())) {
            return Err(MergeError::UnexpectedColumn {
                record: idx,
                column: column.clone(),
            }
            .into());
        }
        wtr.write_record(
            header
                .iter()
                .map(|h| row.get(*h).map(String::as_str).unwrap_or("")),
        )
        .with_context(|| format!("writing CSV record {}", idx))?;
    }

    wtr.into_inner()
        .map_err(|e| e.into_error())
        .context("flushing CSV buffer")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decode_keeps_column_order() {
        let rows = decode_rows(b"b,a,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(rows[1]["c"], "6");
    }

    #[test]
    fn test_decode_ragged_records() {
        let rows = decode_rows(b"x,y\n1\n2,3,4\n\n5,6\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], row(&[("x", "1"), ("y", "")]));
        assert_eq!(rows[1], row(&[("x", "2"), ("y", "3")]));
        assert_eq!(rows[2], row(&[("x", "5"), ("y", "6")]));
    }

    #[test]
    fn test_decode_empty_and_header_only() {
        assert!(decode_rows(b"").unwrap().is_empty());
        assert!(decode_rows(b"x,y\n").unwrap().is_empty());
    }

    #[test]
    fn test_stamp_appends_or_overwrites() {
        let mut rows = vec![row(&[("x", "1")])];
        stamp_rows(&mut rows, Some("2023-04-01T10:00:00"));
        assert_eq!(
            rows[0].iter().collect::<Vec<_>>(),
            vec![
                (&"x".to_string(), &"1".to_string()),
                (&"date".to_string(), &"2023-04-01T10:00:00".to_string())
            ]
        );

        let mut rows = vec![row(&[("date", "old"), ("x", "1")])];
        stamp_rows(&mut rows, None);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["date", "x"]);
        assert_eq!(rows[0]["date"], "");
    }

    #[test]
    fn test_encode_uses_first_row_header() {
        let rows = vec![
            row(&[("x", "1"), ("date", "T1")]),
            row(&[("date", "T2"), ("x", "2")]),
            row(&[("x", "3")]),
        ];
        let out = encode_rows(&rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "x,date\n1,T1\n2,T2\n3,\n"
        );
    }

    #[test]
    fn test_encode_rejects_column_outside_header() {
        let rows = vec![
            row(&[("x", "1"), ("date", "T1")]),
            row(&[("x", "2"), ("extra", "kept?"), ("date", "T2")]),
        ];
        let err = encode_rows(&rows).unwrap_err();
        match err.downcast_ref::<MergeError>() {
            Some(MergeError::UnexpectedColumn { record, column }) => {
                assert_eq!(*record, 1);
                assert_eq!(column, "extra");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_encode_quotes_fields() {
        let rows = vec![row(&[("name", "a, b"), ("note", "say \"hi\"")])];
        let out = encode_rows(&rows).unwrap();
        let back = decode_rows(&out).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_encode_requires_rows() {
        assert!(encode_rows(&[]).is_err());
    }
}
