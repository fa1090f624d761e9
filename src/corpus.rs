//! Corpus loader for the preprocessed KCC dataset.
//!
//! Reads a CSV file and produces one `Record` per data row: the first column
//! becomes the record content, the zero-based row index (header excluded)
//! becomes the identifier. The corpus is assumed pre-cleaned upstream; no
//! filtering or normalization happens here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;

/// One corpus entry, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Zero-based data-row index as a string. Unique within the corpus and
    /// stable across runs; the idempotency key for indexing.
    pub id: String,
    /// Raw text of the first CSV column, a question/answer pair.
    pub content: String,
}

/// Loads the corpus from a CSV file at `path`.
///
/// The first row is treated as a header and skipped. Quoted fields follow
/// RFC 4180: doubled quotes escape a quote, and quoted fields may contain
/// commas and newlines.
pub fn load_corpus(path: &Path) -> Result<Vec<Record>, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        PipelineError::DataSource(format!("cannot read corpus {}: {}", path.display(), e))
    })?;

    let rows = parse_csv(&raw)
        .map_err(|e| PipelineError::DataSource(format!("{}: {}", path.display(), e)))?;

    let records = rows
        .into_iter()
        .skip(1)
        .enumerate()
        .filter_map(|(i, row)| {
            row.into_iter().next().map(|content| Record {
                id: i.to_string(),
                content,
            })
        })
        .collect();

    Ok(records)
}

/// Splits CSV text into rows of fields.
///
/// Hand-rolled scanner: a quote opens a quoted field only at field start,
/// a doubled quote inside a quoted field emits a literal quote, and CRLF is
/// normalized to a single row break.
fn parse_csv(input: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started && field.is_empty() => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                field_started = false;
            }
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }

    if field_started || !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    // A trailing newline leaves no phantom empty row; an entirely empty
    // file yields zero rows.
    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));

    Ok(rows)
}
