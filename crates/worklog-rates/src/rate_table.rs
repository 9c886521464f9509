use std::path::Path;

use thiserror::Error;

use worklog_core::write_text_atomic;

const TASK_NAME_COLUMN: &str = "Task Name";
const SECONDS_PER_TASK_COLUMN: &str = "RPH";
const DOLLARS_PER_TASK_COLUMN: &str = "default_rate";

/// Error raised when the persisted rate table cannot be read or written.
///
/// A missing file is not an error: it loads as an empty table.
#[derive(Debug, Error)]
pub enum RateStoreError {
    #[error("failed to read rate table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rate table at line {line}: {detail}")]
    Malformed { line: usize, detail: String },
    #[error("failed to write rate table {path}: {detail}")]
    Write { path: String, detail: String },
}

#[derive(Debug, Clone, PartialEq)]
/// One persisted row: a task name plus its time and dollar rates.
///
/// `None` models a field the operator left blank or that did not parse as a
/// number; resolution substitutes placeholder values for those.
pub struct RateEntry {
    pub task_name: String,
    pub seconds_per_task: Option<f64>,
    pub dollars_per_task: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// In-memory rate table with deterministic row order.
///
/// Rows keep file order on load and append order on insert, so a flush writes
/// operator-authored rows back unchanged with any new rows at the end.
pub struct RateTable {
    rows: Vec<RateEntry>,
}

impl RateTable {
    /// Loads the table from `path`.
    ///
    /// An absent or empty file is a valid empty state. Unreadable files and
    /// rows without a task name surface as [`RateStoreError`].
    pub fn load(path: &Path) -> Result<Self, RateStoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(RateStoreError::Read {
                    path: path.display().to_string(),
                    source: error,
                });
            }
        };
        Self::parse(&raw)
    }

    /// Parses the CSV encoding: header `Task Name,RPH,default_rate`, minimal
    /// RFC-4180 quoting, numeric fields optional per row.
    pub fn parse(raw: &str) -> Result<Self, RateStoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let records = parse_csv_records(raw)?;
        let mut lines = records.into_iter();
        let (header_line, header) = match lines.next() {
            Some(record) => record,
            None => return Ok(Self::default()),
        };

        let name_index = column_index(&header, TASK_NAME_COLUMN).ok_or_else(|| {
            RateStoreError::Malformed {
                line: header_line,
                detail: format!("missing required column '{TASK_NAME_COLUMN}'"),
            }
        })?;
        let seconds_index = column_index(&header, SECONDS_PER_TASK_COLUMN);
        let dollars_index = column_index(&header, DOLLARS_PER_TASK_COLUMN);

        let mut rows = Vec::new();
        for (line, fields) in lines {
            let task_name = fields
                .get(name_index)
                .map(|field| field.trim())
                .unwrap_or_default();
            if task_name.is_empty() {
                return Err(RateStoreError::Malformed {
                    line,
                    detail: "row has an empty task name".to_string(),
                });
            }
            rows.push(RateEntry {
                task_name: task_name.to_string(),
                seconds_per_task: numeric_field(&fields, seconds_index),
                dollars_per_task: numeric_field(&fields, dollars_index),
            });
        }
        Ok(Self { rows })
    }

    /// Case-sensitive exact lookup by task name.
    pub fn rate_for(&self, task_name: &str) -> Option<&RateEntry> {
        self.rows.iter().find(|row| row.task_name == task_name)
    }

    /// Appends `entry` when its task name is absent; existing rows are never
    /// overwritten, preserving operator-authored corrections.
    ///
    /// Returns true when a row was appended.
    pub fn upsert_placeholder(&mut self, entry: RateEntry) -> bool {
        if self.rate_for(entry.task_name.as_str()).is_some() {
            return false;
        }
        self.rows.push(entry);
        true
    }

    /// Persists the full table to `path` with a temp-file + rename so a crash
    /// mid-write leaves the previous version intact.
    pub fn flush(&self, path: &Path) -> Result<(), RateStoreError> {
        write_text_atomic(path, self.serialize().as_str()).map_err(|error| {
            RateStoreError::Write {
                path: path.display().to_string(),
                detail: error.to_string(),
            }
        })
    }

    /// Renders the CSV encoding, header included.
    pub fn serialize(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{},{},{}\n",
            TASK_NAME_COLUMN, SECONDS_PER_TASK_COLUMN, DOLLARS_PER_TASK_COLUMN
        ));
        for row in &self.rows {
            output.push_str(&format!(
                "{},{},{}\n",
                escape_csv_field(row.task_name.as_str()),
                format_numeric_field(row.seconds_per_task),
                format_numeric_field(row.dollars_per_task),
            ));
        }
        output
    }

    pub fn rows(&self) -> &[RateEntry] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn column_index(header: &[String], column: &str) -> Option<usize> {
    header.iter().position(|field| field.trim() == column)
}

fn numeric_field(fields: &[String], index: Option<usize>) -> Option<f64> {
    let raw = fields.get(index?)?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn format_numeric_field(value: Option<f64>) -> String {
    match value {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", value as i64)
        }
        Some(value) => format!("{value}"),
        None => String::new(),
    }
}

fn escape_csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Splits raw CSV text into `(line_number, fields)` records.
///
/// Supports quoted fields with doubled quotes and newlines inside quotes;
/// blank unquoted lines are skipped.
fn parse_csv_records(raw: &str) -> Result<Vec<(usize, Vec<String>)>, RateStoreError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut record_has_data = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => {
                in_quotes = true;
                record_has_data = true;
            }
            '"' => {
                return Err(RateStoreError::Malformed {
                    line,
                    detail: "unexpected quote inside unquoted field".to_string(),
                });
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
                record_has_data = true;
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                if record_has_data || !field.is_empty() || !fields.is_empty() {
                    fields.push(std::mem::take(&mut field));
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                record_has_data = false;
                line += 1;
                record_line = line;
            }
            '\n' => {
                field.push('\n');
                line += 1;
            }
            other => {
                field.push(other);
                record_has_data = true;
            }
        }
    }
    if in_quotes {
        return Err(RateStoreError::Malformed {
            line,
            detail: "unterminated quoted field".to_string(),
        });
    }
    if record_has_data || !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}
