//! Delimited file input and output
//!
//! Records are read as raw bytes and written back the same way, so fields
//! outside the masked column keep their exact bytes. The reader is flexible:
//! short rows are accepted here and rejected later, per chunk, when the
//! masked column is missing.

use crate::domain::{MaskError, Result, Row, Table};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Options for reading an input file
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,

    /// Header name of the column to mask
    pub masked_column: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            masked_column: "Comments".to_string(),
        }
    }
}

/// Reads a table from any reader
///
/// # Errors
///
/// Returns `MaskError::Input` for malformed input or an empty file and
/// `MaskError::MissingColumn` when the header lacks the masked column.
pub fn read_table<R: Read>(reader: R, options: &CsvOptions) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<Vec<u8>> = reader
        .byte_headers()?
        .iter()
        .map(<[u8]>::to_vec)
        .collect();
    if headers.is_empty() || headers.iter().all(Vec::is_empty) {
        return Err(MaskError::Input("input has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|e| {
            MaskError::Input(format!("malformed record at data row {index}: {e}"))
        })?;
        rows.push(Row::new(index, record.iter().map(<[u8]>::to_vec).collect()));
    }

    Table::new(headers, &options.masked_column, rows)
}

/// Reads a table from a file path
pub fn read_table_from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Table> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        MaskError::Input(format!("Failed to open input file {}: {}", path.display(), e))
    })?;
    read_table(std::io::BufReader::new(file), options)
}

/// Writes a header and rows to any writer
pub fn write_table<W: Write>(
    writer: W,
    headers: &[Vec<u8>],
    rows: &[Row],
    delimiter: u8,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row.fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a header and rows to a file, replacing it atomically
pub fn write_table_to_path(
    path: impl AsRef<Path>,
    headers: &[Vec<u8>],
    rows: &[Row],
    delimiter: u8,
) -> Result<()> {
    let path = path.as_ref();
    let tmp = tmp_path(path);
    {
        let file = std::fs::File::create(&tmp)?;
        write_table(std::io::BufWriter::new(file), headers, rows, delimiter)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes the indices of rows that were not emitted, one per line
pub fn write_missing_rows(path: impl AsRef<Path>, row_indices: &[usize]) -> Result<()> {
    let mut content = String::with_capacity(row_indices.len() * 4);
    for index in row_indices {
        content.push_str(&index.to_string());
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Default output path: `<prefix><file name>` next to the input
pub fn default_output_path(input: &Path, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_string());
    input.with_file_name(format!("{prefix}{name}"))
}

/// Sidecar listing omitted rows: `<output>.missing-rows.txt`
pub fn missing_rows_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".missing-rows.txt");
    output.with_file_name(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
