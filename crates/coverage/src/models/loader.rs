use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, Encoding};
use serde::{Deserialize, Serialize};

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::config::SourceSpec;
use crate::models::table::{Cell, RawTable};

/// Text encoding of an exported sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// UTF-8, falling back to ISO-8859-1 when the bytes are not valid UTF-8
    #[default]
    Utf8,
    Latin1,
}

/// Options for reading a delimited export
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub encoding: TextEncoding,
    /// Title rows above the header
    pub skip_rows: usize,
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: TextEncoding::Utf8,
            skip_rows: 0,
            batch_size: 1_024,
        }
    }
}

/// Something that can turn a configured source into a [`RawTable`]
pub trait TableLoader {
    fn load(&self, source: &SourceSpec) -> AnalysisResult<RawTable>;
}

/// Loads sources from delimited text files under a data directory
#[derive(Debug, Clone)]
pub struct CsvLoader {
    data_dir: std::path::PathBuf,
    delimiter: u8,
    encoding: TextEncoding,
}

impl CsvLoader {
    pub fn new<P: AsRef<Path>>(data_dir: P, delimiter: u8, encoding: TextEncoding) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            delimiter,
            encoding,
        }
    }
}

impl TableLoader for CsvLoader {
    fn load(&self, source: &SourceSpec) -> AnalysisResult<RawTable> {
        let path = self.data_dir.join(&source.file);
        let options = CsvOptions {
            delimiter: self.delimiter,
            encoding: self.encoding,
            skip_rows: source.skip_rows,
            ..CsvOptions::default()
        };
        read_csv_table(&path, &options)
    }
}

/// Decode file bytes according to `encoding`
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    let text = match encoding {
        TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                log::warn!("Input is not valid UTF-8 ({}); decoding as ISO-8859-1", e);
                decode_latin1(bytes)
            }
        },
        TextEncoding::Latin1 => decode_latin1(bytes),
    };
    text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)
}

fn decode_latin1(bytes: &[u8]) -> String {
    ISO_8859_1
        .decode(bytes, DecoderTrap::Replace)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).to_string())
}

/// Drop the first `n` lines of `text`
fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}

/// Strip empty fields past `width` from the end of each record, so rows
/// exported with a trailing delimiter still line up with the header. A
/// non-empty extra value is left in place and rejected by the reader.
fn drop_trailing_fields(body: &str, width: usize, delimiter: u8) -> String {
    let delimiter = delimiter as char;
    let mut out = String::with_capacity(body.len());
    let mut quoted = false;

    for line in body.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        let ending = &line[content.len()..];
        let starts_quoted = quoted;

        let mut fields = 1;
        for c in content.chars() {
            if c == '"' {
                quoted = !quoted;
            } else if c == delimiter && !quoted {
                fields += 1;
            }
        }

        let mut kept = content;
        if !starts_quoted && !quoted {
            while fields > width && kept.ends_with(delimiter) {
                kept = &kept[..kept.len() - delimiter.len_utf8()];
                fields -= 1;
            }
        }
        out.push_str(kept);
        out.push_str(ending);
    }
    out
}

/// Read a delimited file into a [`RawTable`]
pub fn read_csv_table<P: AsRef<Path>>(path: P, options: &CsvOptions) -> AnalysisResult<RawTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| AnalysisError::io(path, e))?;
    let text = decode_text(&bytes, options.encoding);
    let table = parse_csv_table(&text, options)?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Parse delimited text into a [`RawTable`].
///
/// Every column is read as text through an all-`Utf8` Arrow schema and then
/// typed per cell with [`Cell::parse`], so a stray word in a numeric column
/// never rejects the whole file. Short rows are padded with missing cells and
/// empty trailing fields beyond the header are dropped.
pub fn parse_csv_table(text: &str, options: &CsvOptions) -> AnalysisResult<RawTable> {
    let body = skip_lines(text, options.skip_rows);
    if body.trim().is_empty() {
        return Err(AnalysisError::Parse("no header row found".to_string()));
    }

    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter);
    let (inferred, _) = format.infer_schema(Cursor::new(body.as_bytes()), Some(0))?;
    let columns: Vec<String> = inferred
        .fields()
        .iter()
        .map(|f| f.name().trim().to_string())
        .collect();
    let body = drop_trailing_fields(body, columns.len(), options.delimiter);

    let text_schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<Field>>(),
    ));
    let reader = ReaderBuilder::new(text_schema)
        .with_header(true)
        .with_delimiter(options.delimiter)
        .with_batch_size(options.batch_size)
        .with_truncated_rows(true)
        .build(Cursor::new(body.as_bytes()))?;

    let mut table = RawTable::new(columns);
    for batch in reader {
        let batch = batch?;
        let arrays: Vec<&StringArray> = batch
            .columns()
            .iter()
            .map(|array| {
                array.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                    AnalysisError::Parse(format!("expected text column, found {}", array.data_type()))
                })
            })
            .collect::<AnalysisResult<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let cells = arrays
                .iter()
                .map(|array| {
                    if array.is_null(row) {
                        Cell::Missing
                    } else {
                        Cell::parse(array.value(row))
                    }
                })
                .collect();
            table.push_row(cells);
        }
    }

    if table.is_empty() {
        log::warn!("Table has a header but no data rows");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_table() {
        let text = "DSEI_GESTAO,Nº GESTANTES,6 OU MAIS CONSULTAS\nXINGU,10,4\nYANOMAMI,,2\n";
        let table = parse_csv_table(text, &CsvOptions::default()).unwrap();
        assert_eq!(table.columns()[1], "Nº GESTANTES");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![Cell::from("XINGU"), Cell::Int(10), Cell::Int(4)]);
        assert_eq!(table.rows()[1][1], Cell::Missing);
    }

    #[test]
    fn test_skip_title_rows() {
        let text = "Relatório de óbitos\nSESAI 2022\n\nDSEI;NASCIDOS VIVOS;ÓBITOS MATERNOS;ÓBITOS INFANTIS\nXINGU;120;0;3\n";
        let options = CsvOptions {
            delimiter: b';',
            skip_rows: 3,
            ..CsvOptions::default()
        };
        let table = parse_csv_table(text, &options).unwrap();
        assert_eq!(table.columns().len(), 4);
        assert_eq!(table.columns()[3], "ÓBITOS INFANTIS");
        assert_eq!(table.rows()[0][1], Cell::Int(120));
    }

    #[test]
    fn test_quoted_fields() {
        let text = "dsei,total\n\"AMAPÁ E NORTE DO PARÁ\",\"12\"\n";
        let table = parse_csv_table(text, &CsvOptions::default()).unwrap();
        assert_eq!(table.rows()[0][0], Cell::from("AMAPÁ E NORTE DO PARÁ"));
        assert_eq!(table.rows()[0][1], Cell::Int(12));
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let table = parse_csv_table("dsei,total\n", &CsvOptions::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_no_header_is_an_error() {
        let options = CsvOptions {
            skip_rows: 5,
            ..CsvOptions::default()
        };
        assert!(matches!(
            parse_csv_table("a,b\n1,2\n", &options),
            Err(AnalysisError::Parse(_))
        ));
    }

    #[test]
    fn test_trailing_delimiters_are_dropped() {
        let text = "DSEI,GESTANTES,CONSULTAS\r\nXINGU,150,90,\r\nYANOMAMI,180,36,,\r\nARAGUAIA,10\r\n";
        let table = parse_csv_table(text, &CsvOptions::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0], vec![Cell::from("XINGU"), Cell::Int(150), Cell::Int(90)]);
        assert_eq!(table.rows()[1][2], Cell::Int(36));
        assert_eq!(table.rows()[2][2], Cell::Missing);
    }

    #[test]
    fn test_extra_value_is_an_error() {
        let text = "dsei,total\nXINGU,3,7\n";
        assert!(parse_csv_table(text, &CsvOptions::default()).is_err());
    }

    #[test]
    fn test_trailing_fields_keep_quoted_delimiters() {
        let body = drop_trailing_fields("a;b\n\"x;\";2;\n", 2, b';');
        assert_eq!(body, "a;b\n\"x;\";2\n");
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"DSEI,GESTA\xc7\xc3O\nCEAR\xc1,3\n";
        let text = decode_text(bytes, TextEncoding::Utf8);
        assert!(text.starts_with("DSEI,GESTAÇÃO"));
        assert!(text.contains("CEARÁ"));
        assert_eq!(decode_text(bytes, TextEncoding::Latin1), text);
    }

    #[test]
    fn test_bom_is_stripped() {
        let text = decode_text("\u{feff}dsei,n\n".as_bytes(), TextEncoding::Utf8);
        assert_eq!(text, "dsei,n\n");
    }

    #[test]
    fn test_read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dsei,gestantes").unwrap();
        writeln!(file, "XINGU,7").unwrap();
        let table = read_csv_table(file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_csv_table("/nonexistent/prenatal2022.csv", &CsvOptions::default()).unwrap_err();
        assert!(err.to_string().contains("prenatal2022.csv"));
    }
}
