//! CSV import with encoding and delimiter auto-detection.
//!
//! Raw bytes are decoded (chardet guess, then encoding_rs), the delimiter is
//! sniffed from the header line and the records are read with the `csv` crate
//! into a [`Table`]. Cells go through [`Value::infer`], so empty cells and the
//! usual NA markers become missing and numeric text becomes numbers.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Table, Value};

/// Delimiters considered by [`detect_delimiter`], in preference order on ties.
const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Parsed table with the settings that were detected or used.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers after de-duplication
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding name.
///
/// UTF-8 input must be valid UTF-8. Unknown labels are looked up in
/// encoding_rs and fall back to lossy UTF-8 when it does not know them.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec()).map_err(|_| CsvError::EncodingError {
            encoding: encoding.to_string(),
        })?,
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    if decoded.starts_with('\u{feff}') {
        Ok(decoded['\u{feff}'.len_utf8()..].to_string())
    } else {
        Ok(decoded)
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Defaults to `,` when none of the candidates appear.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = DELIMITERS[0];
    let mut best_count = 0;
    for &sep in &DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Parse CSV text into a table with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use tabmatch::parser::parse_csv;
///
/// let table = parse_csv("name;age\nAlice;30\nBob;25", ';')?;
/// assert_eq!(table.row_count(), 2);
/// ```
pub fn parse_csv(content: &str, delimiter: char) -> CsvResult<Table> {
    Ok(parse_string_with_metadata(content, delimiter, "utf-8".to_string())?.table)
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_string_with_metadata(content: &str, delimiter: char, encoding: String) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::ParseError {
            line: 1,
            message: format!("delimiter '{delimiter}' is not a single-byte character"),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(&e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if raw_headers.is_empty() || raw_headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }
    let headers = dedupe_headers(raw_headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(&e))?;
        if record.iter().all(|cell| cell.trim().is_empty()) && record.len() <= 1 {
            continue;
        }
        rows.push(record.iter().map(Value::infer).collect());
    }

    let table = Table::from_rows(headers.clone(), rows)?;
    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        headers,
    })
}

fn csv_error(err: &csv::Error) -> CsvError {
    CsvError::ParseError {
        line: err.position().map_or(0, |p| p.line() as usize),
        message: err.to_string(),
    }
}

/// Name blank headers `Unnamed: i` and suffix repeats with `.1`, `.2`, ...
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() { format!("Unnamed: {i}") } else { name };
        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, "name"), Some(&Value::text("Alice")));
        assert_eq!(table.cell(0, "age"), Some(&Value::Integer(30)));
        assert_eq!(table.cell(1, "name"), Some(&Value::text("Bob")));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,value\n\"Doe, Jane\",\"Hello \"\"World\"\"\"";
        let table = parse_csv(csv, ',').unwrap();

        assert_eq!(table.cell(0, "name"), Some(&Value::text("Doe, Jane")));
        assert_eq!(table.cell(0, "value"), Some(&Value::text("Hello \"World\"")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_missing_values() {
        let table = parse_csv("a;b;c\n1;;N/A", ';').unwrap();

        assert_eq!(table.cell(0, "a"), Some(&Value::Integer(1)));
        assert_eq!(table.cell(0, "b"), Some(&Value::Missing));
        assert_eq!(table.cell(0, "c"), Some(&Value::Missing));
    }

    #[test]
    fn test_ragged_rows() {
        let table = parse_csv("a;b\n1;2;3;4\n5", ';').unwrap();

        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.cell(0, "b"), Some(&Value::Integer(2)));
        assert_eq!(table.cell(1, "b"), Some(&Value::Missing));
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let table = parse_csv("id,id,,name\n1,2,3,x", ',').unwrap();
        assert_eq!(table.column_names(), vec!["id", "id.1", "Unnamed: 2", "name"]);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv("", ';'), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_csv("  \n ", ';'), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_header_only() {
        let table = parse_csv("a,b\n", ',').unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single\nrow"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.table.row_count(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_bom_is_stripped() {
        let result = parse_bytes_auto("\u{feff}id,name\n1,x".as_bytes()).unwrap();
        assert_eq!(result.headers, vec!["id", "name"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let bytes: &[u8] = &[0x61, 0xFF, 0x62];
        assert!(matches!(
            decode_content(bytes, "utf-8"),
            Err(CsvError::EncodingError { .. })
        ));
    }
}
