use serde_json::Value;
use std::path::PathBuf;

use crate::error::{BatchSourceError, IssueError};

pub const NAME_COLUMN: &str = "name";
pub const EVENT_COLUMN: &str = "event";
pub const DATE_COLUMN: &str = "issueDate";
pub const NUMBER_COLUMN: &str = "number";

/// Rows of text cells under a header row, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column positions resolved once, before any row is read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Columns {
    pub name: usize,
    pub event: usize,
    pub issue_date: usize,
    pub number: Option<usize>,
}

/// One row's cells, trimmed.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchRow {
    pub name: String,
    pub event: String,
    pub issue_date: String,
    pub number: Option<String>,
}

impl BatchRow {
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.event.is_empty() && !self.issue_date.is_empty()
    }
}

impl BatchTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    fn find(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(column))
    }

    /// Case-insensitive lookup of the required and optional columns.
    pub fn columns(&self) -> Result<Columns, IssueError> {
        let name = self.find(NAME_COLUMN);
        let event = self.find(EVENT_COLUMN);
        let issue_date = self.find(DATE_COLUMN);

        match (name, event, issue_date) {
            (Some(name), Some(event), Some(issue_date)) => Ok(Columns {
                name,
                event,
                issue_date,
                number: self.find(NUMBER_COLUMN),
            }),
            _ => {
                let missing = [
                    (NAME_COLUMN, name),
                    (EVENT_COLUMN, event),
                    (DATE_COLUMN, issue_date),
                ]
                .into_iter()
                .filter(|(_, found)| found.is_none())
                .map(|(column, _)| column)
                .collect();
                Err(IssueError::Schema(missing))
            }
        }
    }
}

impl Columns {
    /// Reads one row's cells; cells past the end of a short row are empty.
    pub fn read(&self, cells: &[String]) -> BatchRow {
        let cell = |i: usize| cells.get(i).map(|c| c.trim().to_string()).unwrap_or_default();
        BatchRow {
            name: cell(self.name),
            event: cell(self.event),
            issue_date: cell(self.issue_date),
            number: self.number.map(cell).filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowFailure {
    /// 1-based position among the data rows.
    pub row: usize,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
    pub outputs: Vec<PathBuf>,
}

/// Picks a decoder from the uploaded file's extension.
pub fn decode_upload(filename: &str, data: &[u8]) -> Result<BatchTable, BatchSourceError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        let text = std::str::from_utf8(data).map_err(|_| BatchSourceError::Encoding)?;
        from_csv(text)
    } else if lower.ends_with(".json") {
        from_json(data)
    } else {
        Err(BatchSourceError::UnsupportedFormat(filename.to_string()))
    }
}

/// A JSON array of flat objects. Headers are the union of all keys;
/// non-string scalars are stringified and missing keys become empty.
pub fn from_json(data: &[u8]) -> Result<BatchTable, BatchSourceError> {
    let objects: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(data)?;

    let mut headers: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            headers
                .iter()
                .map(|h| match object.get(h) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    Ok(BatchTable { headers, rows })
}

/// Comma-separated text with a header row. Fields may be double-quoted, with
/// `""` for a literal quote; quoted fields may span lines. Blank lines are
/// ignored.
pub fn from_csv(text: &str) -> Result<BatchTable, BatchSourceError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(ch);
                }
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(BatchSourceError::Csv {
            line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    let mut records = records.into_iter();
    let headers = records.next().ok_or(BatchSourceError::Empty)?;
    Ok(BatchTable {
        headers,
        rows: records.collect(),
    })
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(record);
    }
}
