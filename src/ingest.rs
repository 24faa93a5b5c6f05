//! Point record ingestion from delimited text.
//!
//! The parser is a single forward byte scan over the whole input. Only the
//! configured key and coordinate columns are inspected; keys are kept as byte
//! spans into the retained text so that no per-row allocation happens.

use crate::error::LoadError;
use crate::types::PointRecord;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Zero-based column positions in the point source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointColumns {
    pub key: usize,
    pub x: usize,
    pub y: usize,
}

impl PointColumns {
    /// Ticket number, longitude and latitude in the parking violation export.
    pub const DEFAULT: PointColumns = PointColumns::new(0, 10, 9);

    pub const fn new(key: usize, x: usize, y: usize) -> Self {
        Self { key, x, y }
    }

    fn last(&self) -> usize {
        self.key.max(self.x).max(self.y)
    }
}

impl Default for PointColumns {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What to do with a coordinate field that is not a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatePolicy {
    /// Substitute 0.0 and count the substitution.
    #[default]
    ZeroFill,
    /// Fail the load with [`LoadError::InvalidCoordinate`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub columns: PointColumns,
    pub delimiter: u8,
    pub has_header: bool,
    /// Pre-sizes the record vector; counted from the input when `None`.
    pub expected_rows: Option<usize>,
    pub coordinate_policy: CoordinatePolicy,
}

impl IngestOptions {
    pub fn with_columns(mut self, columns: PointColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_expected_rows(mut self, rows: usize) -> Self {
        self.expected_rows = Some(rows);
        self
    }

    pub fn with_coordinate_policy(mut self, policy: CoordinatePolicy) -> Self {
        self.coordinate_policy = policy;
        self
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            columns: PointColumns::default(),
            delimiter: b',',
            has_header: true,
            expected_rows: None,
            coordinate_policy: CoordinatePolicy::default(),
        }
    }
}

/// Counters gathered while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows: usize,
    pub blank_lines: usize,
    /// Coordinates replaced with 0.0 under [`CoordinatePolicy::ZeroFill`].
    pub coordinate_fallbacks: usize,
}

/// Parsed point records plus the text their keys point into.
#[derive(Debug)]
pub struct PointStore {
    text: String,
    records: Vec<PointRecord>,
    stats: IngestStats,
}

impl PointStore {
    /// Reads and parses a point file.
    pub fn load_path(path: impl AsRef<Path>, options: &IngestOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text =
            String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8(path.to_path_buf()))?;
        Self::parse(text, options)
    }

    /// Parses `text`, taking ownership so record keys can borrow from it.
    pub fn parse(text: String, options: &IngestOptions) -> Result<Self, LoadError> {
        let (records, stats) = scan(&text, options)?;
        if stats.coordinate_fallbacks > 0 {
            log::warn!(
                "{} unparsable coordinates were replaced with 0.0",
                stats.coordinate_fallbacks
            );
        }
        log::info!("Parsed {} point records", stats.rows);
        Ok(Self {
            text,
            records,
            stats,
        })
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    /// Mutable access for the join phase. Records cannot be added or removed.
    pub fn records_mut(&mut self) -> &mut [PointRecord] {
        &mut self.records
    }

    /// Key text of `record`; empty when the record's span is not from this store.
    pub fn key(&self, record: &PointRecord) -> &str {
        self.text
            .get(record.key_start..record.key_end)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records with an assigned region.
    pub fn matched(&self) -> usize {
        self.records.iter().filter(|r| r.is_assigned()).count()
    }
}

/// Byte ranges of the columns of interest within one line.
#[derive(Default)]
struct Fields {
    key: Option<(usize, usize)>,
    x: Option<(usize, usize)>,
    y: Option<(usize, usize)>,
}

fn scan(text: &str, options: &IngestOptions) -> Result<(Vec<PointRecord>, IngestStats), LoadError> {
    let bytes = text.as_bytes();
    let capacity = options
        .expected_rows
        .unwrap_or_else(|| bytes.iter().filter(|&&b| b == b'\n').count() + 1);
    let mut records = Vec::with_capacity(capacity);
    let mut stats = IngestStats::default();
    let columns = options.columns;
    let last_column = columns.last();

    let mut line_start = 0;
    let mut line_number = 0;
    while line_start < bytes.len() {
        let line_end = bytes[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| line_start + p);
        let next_line = line_end + 1;
        line_number += 1;

        let mut content_end = line_end;
        if content_end > line_start && bytes[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        if line_number == 1 && options.has_header {
            line_start = next_line;
            continue;
        }
        if content_end == line_start {
            stats.blank_lines += 1;
            line_start = next_line;
            continue;
        }

        let mut fields = Fields::default();
        let mut column = 0;
        let mut field_start = line_start;
        for pos in line_start..=content_end {
            if pos < content_end && bytes[pos] != options.delimiter {
                continue;
            }
            let span = Some((field_start, pos));
            if column == columns.key {
                fields.key = span;
            }
            if column == columns.x {
                fields.x = span;
            }
            if column == columns.y {
                fields.y = span;
            }
            if column == last_column {
                break;
            }
            column += 1;
            field_start = pos + 1;
        }

        let (Some(key), Some(x), Some(y)) = (fields.key, fields.x, fields.y) else {
            return Err(LoadError::MalformedRow {
                line: line_number,
                reason: format!(
                    "expected at least {} columns, found {}",
                    last_column + 1,
                    column
                ),
            });
        };

        let x = parse_coordinate(text, x, line_number, columns.x, options, &mut stats)?;
        let y = parse_coordinate(text, y, line_number, columns.y, options, &mut stats)?;
        records.push(PointRecord::new(stats.rows, Point::new(x, y), key.0, key.1));
        stats.rows += 1;

        line_start = next_line;
    }

    Ok((records, stats))
}

fn parse_coordinate(
    text: &str,
    (start, end): (usize, usize),
    line: usize,
    column: usize,
    options: &IngestOptions,
    stats: &mut IngestStats,
) -> Result<f64, LoadError> {
    let field = text[start..end].trim();
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => match options.coordinate_policy {
            CoordinatePolicy::ZeroFill => {
                stats.coordinate_fallbacks += 1;
                Ok(0.0)
            }
            CoordinatePolicy::Strict => Err(LoadError::InvalidCoordinate {
                line,
                column,
                value: field.to_string(),
            }),
        },
    }
}
