//! Table export to CSV, TSV or JSON records.
//!
//! Missing cells are written as empty CSV fields and as `null` in JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ExportError, ExportResult};
use crate::models::{Table, Value};

/// Output flavour, usually picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> ExportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            _ => Err(ExportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Missing => String::new(),
        other => other.to_string(),
    }
}

/// Write `table` as delimited text, header row first.
pub fn write_delimited<W: Write>(table: &Table, writer: W, delimiter: u8) -> ExportResult<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);

    writer.write_record(table.column_names())?;
    for row in table.rows() {
        writer.write_record(row.into_iter().map(cell_text))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `table` as a JSON array of row objects.
pub fn write_json<W: Write>(table: &Table, mut writer: W) -> ExportResult<()> {
    serde_json::to_writer_pretty(&mut writer, &table.to_records())?;
    writer.flush()?;
    Ok(())
}

/// CSV text of `table`.
pub fn to_csv_string(table: &Table) -> ExportResult<String> {
    let mut buf = Vec::new();
    write_delimited(table, &mut buf, b',')?;
    String::from_utf8(buf).map_err(|e| ExportError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Write `table` to `path` in the format implied by its extension.
pub fn export_table(table: &Table, path: &Path) -> ExportResult<ExportFormat> {
    let format = ExportFormat::from_path(path)?;
    let file = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => write_delimited(table, file, b',')?,
        ExportFormat::Tsv => write_delimited(table, file, b'\t')?,
        ExportFormat::Json => write_json(table, file)?,
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> Table {
        Table::new(vec![
            Column::from_strs("name", &["Doe, Jane", "Bob"]),
            Column::new("amount", vec![Value::Float(5.0), Value::Missing]),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_string() {
        let csv = to_csv_string(&sample()).unwrap();
        assert_eq!(csv, "name,amount\n\"Doe, Jane\",5.0\nBob,\n");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")).unwrap(), ExportFormat::Json);
        assert!(matches!(
            ExportFormat::from_path(Path::new("out.xlsx")),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_export_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        assert_eq!(export_table(&sample(), &path).unwrap(), ExportFormat::Json);

        let records: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(records[0]["name"], "Doe, Jane");
        assert_eq!(records[1]["amount"], serde_json::Value::Null);
    }

    /// Accepts everything into a buffer and fails on flush, like a full disk.
    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("no space left"))
        }
    }

    #[test]
    fn test_json_flush_errors_are_reported() {
        let err = write_json(&sample(), BufWriter::new(FailingFlush(Vec::new()))).unwrap_err();
        assert!(matches!(err, ExportError::IoError(_)));
    }

    #[test]
    fn test_export_tsv_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        export_table(&sample(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("name\tamount\n"));
    }
}
