// CSV/TSV read and write-back of whole register tables

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use keros_engine::{Schema, Table};

const BOM: char = '\u{feff}';

/// Layout details sniffed from existing content so a write-back keeps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub crlf: bool,
    /// Leading UTF-8 byte order mark
    pub bom: bool,
    pub encoding: &'static Encoding,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self { delimiter: b',', crlf: false, bom: false, encoding: UTF_8 }
    }
}

impl CsvFormat {
    /// Layout of already-decoded text. The encoding is UTF-8; use
    /// [`CsvFormat::detect`] for raw file bytes.
    pub fn sniff(content: &str) -> Self {
        Self {
            delimiter: sniff_delimiter(content),
            crlf: content.contains("\r\n"),
            bom: content.starts_with(BOM),
            encoding: UTF_8,
        }
    }

    /// Decode file bytes and sniff their layout.
    pub fn detect(bytes: Vec<u8>) -> (String, Self) {
        let (content, encoding) = decode(bytes);
        let format = Self { encoding, ..Self::sniff(&content) };
        (content, format)
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the header line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Higher field count breaks ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Decode file bytes, falling back to Windows-1252 (common for Excel-exported CSVs).
pub fn decode(bytes: Vec<u8>) -> (String, &'static Encoding) {
    match String::from_utf8(bytes) {
        Ok(s) => (s, UTF_8),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = WINDOWS_1252.decode(&bytes);
            (decoded.into_owned(), WINDOWS_1252)
        }
    }
}

/// Re-encode written text in the file's own encoding. Text the legacy
/// encoding cannot hold is written as UTF-8 instead.
pub fn encode(content: String, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return content.into_bytes();
    }
    let (bytes, _, unmappable) = encoding.encode(&content);
    if unmappable {
        log::warn!("text does not fit {}; writing UTF-8", encoding.name());
        return content.into_bytes();
    }
    bytes.into_owned()
}

/// Parse a register export. The first record is the header row.
pub fn read_table(content: &str, schema: &Schema) -> Result<Table, String> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    if content.trim().is_empty() {
        return Ok(Table::default());
    }

    let format = CsvFormat::sniff(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        if record.len() > headers.len() && record.iter().any(|f| !f.is_empty()) {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            log::warn!(
                "line {line} has {} fields for {} columns; extra fields are kept as they are",
                record.len(),
                headers.len()
            );
        }
        records.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(Table::from_records(headers, records, schema))
}

/// Serialize the whole table, header first, in the format's layout and encoding.
pub fn write_table(table: &Table, format: CsvFormat) -> Result<Vec<u8>, String> {
    let terminator = if format.crlf {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .terminator(terminator)
        .flexible(true)
        .from_writer(Vec::new());

    let (headers, records) = table.to_records();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    writer.write_record(&headers).map_err(|e| e.to_string())?;
    for record in &records {
        writer.write_record(record).map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    let mut content = String::from_utf8(bytes).map_err(|e| e.to_string())?;
    if format.bom {
        content.insert(0, BOM);
    }
    Ok(encode(content, format.encoding))
}
