use chrono::DateTime;

use crate::store::ChildFields;

/// One spreadsheet cell after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// Matches the exporter's notion of an empty cell: no value, blank text,
    /// or a zero-valued number.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(t) => t.trim().is_empty(),
            Cell::Number(n) => *n == 0.0,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(t) => t.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

/// Seam for the tabular-import capability: a binary payload in, ordered rows
/// of typed cells out, header row included at index 0. Format internals stop
/// here; an XLSX-capable reader would implement this same trait.
pub trait TabularImportReader {
    fn parse(&self, bytes: &[u8]) -> anyhow::Result<Vec<Vec<Cell>>>;
}

/// Reader for delimited-text sheet exports. The delimiter is sniffed from the
/// header row (tab, then semicolon, then comma); fields may be double-quoted
/// with `""` escapes.
pub struct DelimitedSheetReader;

impl TabularImportReader for DelimitedSheetReader {
    fn parse(&self, bytes: &[u8]) -> anyhow::Result<Vec<Vec<Cell>>> {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(Vec::new());
        };
        let delim = sniff_delimiter(header);

        let mut rows = Vec::new();
        rows.push(split_delimited(header, delim));
        for line in lines {
            rows.push(split_delimited(line, delim));
        }
        Ok(rows)
    }
}

fn sniff_delimiter(header: &str) -> char {
    if header.contains('\t') {
        '\t'
    } else if header.contains(';') && !header.contains(',') {
        ';'
    } else {
        ','
    }
}

fn split_delimited(line: &str, delim: char) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            in_quotes = true;
            was_quoted = true;
        } else if c == delim {
            cells.push(finish_field(&field, was_quoted));
            field.clear();
            was_quoted = false;
        } else {
            field.push(c);
        }
    }
    cells.push(finish_field(&field, was_quoted));
    cells
}

/// Quoting opts a field out of numeric interpretation, matching spreadsheet
/// exporters that quote identifier columns to protect them.
fn finish_field(raw: &str, was_quoted: bool) -> Cell {
    if was_quoted {
        Cell::Text(raw.to_string())
    } else {
        classify(raw)
    }
}

fn classify(raw: &str) -> Cell {
    let t = raw.trim();
    if t.is_empty() {
        return Cell::Empty;
    }
    // A leading-zero digit string is an identifier (phone numbers here), not
    // a quantity; round-tripping it through f64 would drop the zero.
    if t.len() > 1 && t.starts_with('0') && !t.contains('.') {
        return Cell::Text(t.to_string());
    }
    if let Ok(n) = t.parse::<f64>() {
        if n.is_finite() {
            return Cell::Number(n);
        }
    }
    Cell::Text(t.to_string())
}

/// Spreadsheet date serials count days with 25569 landing on 1970-01-01, the
/// calendar zero epoch. The truncation must match the exporter exactly so
/// converted dates are byte-identical.
pub fn serial_to_date(serial: f64) -> String {
    if serial <= 0.0 {
        return String::new();
    }
    let days = (serial - 25569.0).floor() as i64;
    match DateTime::from_timestamp(days * 86400, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}

/// Positional column mapping applied to each data row:
/// `[name, phone, address, dateOfBirth, stage, birthCertificate]`.
/// Returns `None` for rows whose cells are all blank, which the import skips
/// entirely.
pub fn row_to_fields(row: &[Cell]) -> Option<ChildFields> {
    if row.iter().all(Cell::is_blank) {
        return None;
    }
    let cell = |i: usize| row.get(i).cloned().unwrap_or(Cell::Empty);
    let date_of_birth = match cell(3) {
        Cell::Number(serial) => serial_to_date(serial),
        other => other.to_text(),
    };
    Some(ChildFields {
        name: cell(0).to_text(),
        phone: cell(1).to_text(),
        address: cell(2).to_text(),
        date_of_birth,
        stage_label: cell(4).to_text(),
        birth_certificate: cell(5).to_text(),
    })
}
