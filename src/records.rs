//! Parses the external article-record stream into validated [`ArticleRecord`]s.
//!
//! One JSON object per line (`{"title":...,"lat":...,"lon":...}`); blank
//! lines are skipped. Coordinate validation happens here rather than being
//! deferred to an upstream parser, since this is the only parser the core has.

use std::io::BufRead;

use serde::Deserialize;

use crate::error::RecordError;

/// A parsed, validated article record.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
struct RawRecord {
    title: String,
    lat: f64,
    lon: f64,
}

fn validate(raw: RawRecord, line: usize) -> Result<ArticleRecord, RecordError> {
    if !raw.lat.is_finite() || !raw.lon.is_finite() {
        return Err(RecordError::NonFinite { line });
    }
    if raw.lat == 0.0 && raw.lon == 0.0 {
        return Err(RecordError::OriginRejected { line });
    }
    if !(-90.0..=90.0).contains(&raw.lat) {
        return Err(RecordError::LatitudeOutOfRange { line, lat: raw.lat });
    }
    if !(-180.0..=180.0).contains(&raw.lon) {
        return Err(RecordError::LongitudeOutOfRange { line, lon: raw.lon });
    }

    Ok(ArticleRecord {
        title: raw.title,
        lat: raw.lat,
        lon: raw.lon,
    })
}

/// Reads newline-delimited JSON article records from `reader`, one per
/// non-blank line. The first malformed or out-of-range line is a hard
/// error carrying its 1-based line number.
pub fn read_records(reader: impl BufRead) -> Result<Vec<ArticleRecord>, RecordError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let raw: RawRecord = serde_json::from_str(trimmed).map_err(|source| RecordError::InvalidJson {
            line: line_no,
            source,
        })?;
        records.push(validate(raw, line_no)?);
    }
    Ok(records)
}
