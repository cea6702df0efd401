//! Ingestion boundary: turns raw catalog rows into validated events.
//!
//! Per-record problems never abort a load. Each bad row becomes a
//! [`SkippedRecord`] in the [`IngestReport`]; only a structurally unreadable
//! input (missing header column, unknown file type) is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::catalog::{CatalogStore, SkipReason, SkippedRecord};
use crate::core::SeismicEvent;
use crate::error::{Result, SwarmError};

const MIN_MAGNITUDE: f64 = -2.0;
const MAX_MAGNITUDE: f64 = 10.0;
const EARTHQUAKE_TYPE: &str = "earthquake";

/// Outcome of reading one input source.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub events: Vec<SeismicEvent>,
    pub rejected: Vec<SkippedRecord>,
    pub rows_read: usize,
}

impl IngestReport {
    fn push(&mut self, line_no: usize, outcome: std::result::Result<SeismicEvent, SkippedRecord>) {
        self.rows_read += 1;
        match outcome {
            Ok(event) => self.events.push(event),
            Err(skipped) => {
                debug!(line = line_no, record = %skipped.record, reason = %skipped.reason, "rejected input row");
                self.rejected.push(skipped);
            }
        }
    }
}

/// Identifier as it appears in input: USGS-style strings or plain integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// A catalog row before validation. Field aliases follow the USGS CSV names.
#[derive(Debug, Deserialize)]
struct RawEventRecord {
    id: Option<RawId>,
    #[serde(alias = "time")]
    timestamp: Option<RawTimestamp>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(alias = "depth")]
    depth_km: Option<f64>,
    #[serde(alias = "mag")]
    magnitude: Option<f64>,
    #[serde(alias = "type")]
    event_type: Option<String>,
    #[serde(alias = "country")]
    region: Option<String>,
    #[serde(alias = "location")]
    place: Option<String>,
}

/// Load a catalog file, choosing the reader from the file extension.
///
/// `.csv` files need a header row; `.jsonl`, `.ndjson` and `.json` files hold
/// one JSON object per line.
pub fn load_catalog(path: &Path) -> Result<CatalogStore> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let file = File::open(path)?;
    let report = match extension.as_str() {
        "csv" => parse_csv(BufReader::new(file))?,
        "jsonl" | "ndjson" | "json" => parse_json_lines(BufReader::new(file))?,
        other => {
            return Err(SwarmError::Parse(format!(
                "unsupported catalog format '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    info!(
        path = %path.display(),
        rows = report.rows_read,
        accepted = report.events.len(),
        rejected = report.rejected.len(),
        "catalog loaded"
    );
    Ok(CatalogStore::from_ingest(report))
}

/// Input lines with 1-based line numbers, decoded one at a time so a single
/// bad row cannot fail the whole read. `None` marks a line that is not UTF-8.
fn decoded_lines<R: Read>(
    reader: BufReader<R>,
) -> impl Iterator<Item = std::io::Result<(usize, Option<String>)>> {
    reader.split(b'\n').enumerate().map(|(index, bytes)| {
        bytes.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            (index + 1, String::from_utf8(bytes).ok())
        })
    })
}

fn invalid_utf8(line_no: usize) -> SkippedRecord {
    SkippedRecord::new(format!("line {}", line_no), SkipReason::Validation("invalid UTF-8".to_string()))
}

/// Read JSON Lines. Blank lines are ignored.
pub fn parse_json_lines<R: Read>(reader: BufReader<R>) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for line in decoded_lines(reader) {
        let (line_no, line) = line?;
        let Some(line) = line else {
            report.push(line_no, Err(invalid_utf8(line_no)));
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match serde_json::from_str::<RawEventRecord>(&line) {
            Ok(raw) => validate_record(raw, line_no),
            Err(e) => Err(SkippedRecord::new(
                format!("line {}", line_no),
                SkipReason::Validation(format!("malformed JSON: {}", e)),
            )),
        };
        report.push(line_no, outcome);
    }
    Ok(report)
}

/// Read CSV with a header row naming at least the required columns.
///
/// Quoted fields may span lines; a record is numbered by its first line.
pub fn parse_csv<R: Read>(reader: BufReader<R>) -> Result<IngestReport> {
    let mut lines = decoded_lines(reader);
    let header = match lines.next() {
        Some(line) => line?.1.ok_or_else(|| SwarmError::Parse("CSV header is not valid UTF-8".to_string()))?,
        None => return Ok(IngestReport::default()),
    };
    let columns = CsvColumns::from_header(header.trim_start_matches('\u{feff}'))?;

    let mut report = IngestReport::default();
    // Record whose quoted field is still open, with its first line number.
    let mut pending: Option<(usize, String)> = None;
    for line in lines {
        let (line_no, line) = line?;
        let Some(line) = line else {
            let start = pending.take().map_or(line_no, |(start, _)| start);
            report.push(start, Err(invalid_utf8(start)));
            continue;
        };

        let (start, record) = match pending.take() {
            Some((start, mut record)) => {
                record.push('\n');
                record.push_str(&line);
                (start, record)
            }
            None if line.trim().is_empty() => continue,
            None => (line_no, line),
        };

        let Ok(fields) = split_csv_line(&record) else {
            pending = Some((start, record));
            continue;
        };
        let outcome = columns
            .to_raw(&fields)
            .map_err(|msg| SkippedRecord::new(format!("line {}", start), SkipReason::Validation(msg)))
            .and_then(|raw| validate_record(raw, start));
        report.push(start, outcome);
    }

    if let Some((start, _)) = pending {
        report.push(
            start,
            Err(SkippedRecord::new(
                format!("line {}", start),
                SkipReason::Validation("unterminated quoted field".to_string()),
            )),
        );
    }
    Ok(report)
}

/// Positions of known columns in a CSV header.
struct CsvColumns {
    positions: HashMap<&'static str, usize>,
}

impl CsvColumns {
    const REQUIRED: [&'static str; 5] = ["id", "timestamp", "latitude", "longitude", "magnitude"];

    fn from_header(header: &str) -> Result<Self> {
        let names = split_csv_line(header).map_err(SwarmError::Parse)?;
        let mut positions = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            let canonical = match name.trim().to_ascii_lowercase().as_str() {
                "id" => "id",
                "time" | "timestamp" => "timestamp",
                "latitude" | "lat" => "latitude",
                "longitude" | "lon" | "lng" => "longitude",
                "depth" | "depth_km" => "depth_km",
                "mag" | "magnitude" => "magnitude",
                "type" | "event_type" => "event_type",
                "country" | "region" => "region",
                "place" | "location" => "place",
                _ => continue,
            };
            positions.entry(canonical).or_insert(i);
        }

        for required in Self::REQUIRED {
            if !positions.contains_key(required) {
                return Err(SwarmError::Parse(format!("CSV header lacks a '{}' column", required)));
            }
        }
        Ok(Self { positions })
    }

    fn field<'a>(&self, fields: &'a [String], name: &str) -> Option<&'a str> {
        self.positions
            .get(name)
            .and_then(|&i| fields.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn number(&self, fields: &[String], name: &str) -> std::result::Result<Option<f64>, String> {
        match self.field(fields, name) {
            None => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("{} '{}' is not a number", name, text)),
        }
    }

    fn to_raw(&self, fields: &[String]) -> std::result::Result<RawEventRecord, String> {
        Ok(RawEventRecord {
            id: self.field(fields, "id").map(|s| RawId::Text(s.to_string())),
            timestamp: self.field(fields, "timestamp").map(|s| RawTimestamp::Text(s.to_string())),
            latitude: self.number(fields, "latitude")?,
            longitude: self.number(fields, "longitude")?,
            depth_km: self.number(fields, "depth_km")?,
            magnitude: self.number(fields, "magnitude")?,
            event_type: self.field(fields, "event_type").map(str::to_string),
            region: self.field(fields, "region").map(str::to_string),
            place: self.field(fields, "place").map(str::to_string),
        })
    }
}

/// Split one CSV record, honoring double-quoted fields and `""` escapes.
/// Fails only while a quoted field is still open.
fn split_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

/// Parse epoch milliseconds, RFC 3339, or a naive ISO-8601 instant taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Some(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}

/// Format epoch milliseconds as RFC 3339 UTC.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

fn validate_record(
    raw: RawEventRecord,
    line_no: usize,
) -> std::result::Result<SeismicEvent, SkippedRecord> {
    let id = match raw.id {
        Some(RawId::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(RawId::Number(n)) => n.to_string(),
        _ => {
            return Err(SkippedRecord::new(
                format!("line {}", line_no),
                SkipReason::Validation("missing id".to_string()),
            ))
        }
    };
    let reject = |msg: String| SkippedRecord::new(id.clone(), SkipReason::Validation(msg));

    if let Some(kind) = raw.event_type.as_deref() {
        if !kind.trim().eq_ignore_ascii_case(EARTHQUAKE_TYPE) {
            return Err(SkippedRecord::new(id.clone(), SkipReason::NotEarthquake(kind.trim().to_string())));
        }
    }

    let timestamp = match raw.timestamp {
        Some(RawTimestamp::Millis(ms)) => ms,
        Some(RawTimestamp::Text(text)) => parse_timestamp(&text)
            .ok_or_else(|| reject(format!("unparseable timestamp '{}'", text)))?,
        None => return Err(reject("missing timestamp".to_string())),
    };

    let latitude = raw.latitude.ok_or_else(|| reject("missing latitude".to_string()))?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(reject(format!("latitude {} out of range", latitude)));
    }
    let longitude = raw.longitude.ok_or_else(|| reject("missing longitude".to_string()))?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(reject(format!("longitude {} out of range", longitude)));
    }
    let depth_km = raw.depth_km.unwrap_or(0.0);
    if !(depth_km.is_finite() && depth_km >= 0.0) {
        return Err(reject(format!("depth {} must be non-negative", depth_km)));
    }
    let magnitude = raw.magnitude.ok_or_else(|| reject("missing magnitude".to_string()))?;
    if !(MIN_MAGNITUDE..=MAX_MAGNITUDE).contains(&magnitude) {
        return Err(reject(format!("magnitude {} out of range", magnitude)));
    }

    Ok(SeismicEvent {
        id,
        timestamp,
        latitude,
        longitude,
        depth_km,
        magnitude,
        event_type: raw.event_type.map(|t| t.trim().to_string()),
        region: raw.region,
        place: raw.place,
    })
}
