//! Flat table export.
//!
//! Column order is fixed by the [`ColumnSchema`]: entity key first, then the
//! declared columns, whether or not any row fills them. Rows keep the
//! reconciler's order. Missing values are written as empty fields.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::catalogue::ColumnSchema;
use crate::error::ReconError;
use crate::model::UnifiedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl ExportOptions {
    /// File extension matching the delimiter: `tsv` for tabs, else `csv`.
    pub fn extension(&self) -> &'static str {
        match self.delimiter {
            b'\t' => "tsv",
            _ => "csv",
        }
    }
}

/// Write header + one row per record. Returns the number of data rows.
pub fn write_table<W: Write>(
    records: &[UnifiedRecord],
    schema: &ColumnSchema,
    options: &ExportOptions,
    writer: W,
) -> Result<usize, ReconError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    // Always write header, even with zero rows
    csv_writer.write_record(schema.header())?;

    for record in records {
        let row = std::iter::once(record.entity_key.as_str())
            .chain(schema.columns().iter().map(|c| record.get(c)));
        csv_writer.write_record(row)?;
    }

    csv_writer
        .flush()
        .map_err(|e| ReconError::Io(e.to_string()))?;
    Ok(records.len())
}

/// Write the table to a new file at `path`.
///
/// Writes `<name>.part` first, then hard-links it into place so that a file
/// already at `path` is never replaced; that case is reported as
/// [`ReconError::OutputExists`]. A leftover `.part` from an earlier run is
/// not truncated either.
pub fn export_table(
    path: &Path,
    records: &[UnifiedRecord],
    schema: &ColumnSchema,
    options: &ExportOptions,
) -> Result<usize, ReconError> {
    if path.exists() {
        return Err(ReconError::OutputExists(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ReconError::Io(format!("not a file path: {}", path.display())))?;
    let part_path = path.with_file_name(format!("{file_name}.part"));

    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&part_path)
        .map_err(|e| ReconError::Io(format!("cannot create {}: {e}", part_path.display())))?;

    let rows = match write_table(records, schema, options, BufWriter::new(file)) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = fs::remove_file(&part_path);
            return Err(e);
        }
    };

    let linked = fs::hard_link(&part_path, path);
    let _ = fs::remove_file(&part_path);
    match linked {
        Ok(()) => Ok(rows),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(ReconError::OutputExists(path.to_path_buf()))
        }
        Err(e) => Err(ReconError::Io(format!(
            "link {} to {}: {e}",
            part_path.display(),
            path.display()
        ))),
    }
}

/// `"{stamp}-{device}.{extension}"`, with characters that would break the
/// file name replaced by `_`.
pub fn table_file_name(stamp: &str, device_id: &str, extension: &str) -> String {
    let device: String = device_id
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    format!("{stamp}-{device}.{extension}")
}
