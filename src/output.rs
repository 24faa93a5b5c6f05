//! Streams matched records as delimited text.

use crate::catalog::RegionCatalog;
use crate::error::WriteError;
use crate::geometry::Boundary;
use crate::ingest::PointStore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// First line of the output, without line terminator.
    pub header: String,
    pub delimiter: u8,
}

impl OutputOptions {
    pub const DEFAULT_HEADER: &'static str = "external_key,region_name";

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            header: Self::DEFAULT_HEADER.to_string(),
            delimiter: b',',
        }
    }
}

/// Writes `key<delim>region name\r\n` for every assigned record, in input
/// order, and returns the number of data rows written.
///
/// The sink is wrapped in a [`BufWriter`] and flushed once at the end.
pub fn write_matches<W, B>(
    store: &PointStore,
    catalog: &RegionCatalog<B>,
    sink: W,
    options: &OutputOptions,
) -> Result<usize, WriteError>
where
    W: Write,
    B: Boundary,
{
    let mut writer = BufWriter::with_capacity(1 << 16, sink);
    writer.write_all(options.header.as_bytes())?;
    writer.write_all(b"\r\n")?;

    let mut line = Vec::with_capacity(128);
    let mut written = 0;
    for record in store.records() {
        let Some(region) = record.region().and_then(|id| catalog.get(id)) else {
            continue;
        };

        line.clear();
        push_field(&mut line, store.key(record).as_bytes(), options.delimiter);
        line.push(options.delimiter);
        push_field(&mut line, region.name.as_bytes(), options.delimiter);
        line.extend_from_slice(b"\r\n");
        writer.write_all(&line)?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

/// Creates (or truncates) `path` and writes the matches into it.
pub fn write_path<B: Boundary>(
    path: impl AsRef<Path>,
    store: &PointStore,
    catalog: &RegionCatalog<B>,
    options: &OutputOptions,
) -> Result<usize, WriteError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| WriteError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let written = write_matches(store, catalog, file, options)?;
    log::info!("Wrote {} matches to {}", written, path.display());
    Ok(written)
}

/// Appends `field`, quoting it when it contains the delimiter, a quote, or a
/// line break.
fn push_field(line: &mut Vec<u8>, field: &[u8], delimiter: u8) {
    let needs_quotes = field
        .iter()
        .any(|&b| b == delimiter || b == b'"' || b == b'\r' || b == b'\n');
    if !needs_quotes {
        line.extend_from_slice(field);
        return;
    }

    line.push(b'"');
    for &b in field {
        if b == b'"' {
            line.push(b'"');
        }
        line.push(b);
    }
    line.push(b'"');
}
