//! NDJSON (Newline Delimited JSON) file processing utilities.
//!
//! Used for reading recorded upstream sessions and the settled gift log.

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Error types for NDJSON reading and parsing.
#[derive(Error, Debug)]
pub enum NdjsonError {
    /// I/O error when reading files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An entry parsed but failed validation
    #[error("Invalid entry at line {line}: {reason}")]
    InvalidEntry { line: usize, reason: String },

    /// Generic error with context
    #[error("Error in {context}: {message}")]
    Generic { context: String, message: String },
}

impl NdjsonError {
    /// Create a new generic error with context
    pub fn generic(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Parse an NDJSON file, validating every entry.
///
/// Empty lines are skipped. The validator returns a human readable reason on
/// rejection, which is reported together with the line number.
pub fn parse_ndjson_file_generic<T, F>(
    path: &Path,
    validate_entry: Option<F>,
) -> Result<Vec<T>, NdjsonError>
where
    T: for<'de> Deserialize<'de>,
    F: Fn(&T) -> Result<(), String>,
{
    let file = File::open(path).map_err(|e| {
        NdjsonError::generic(
            "opening file",
            format!("Failed to open '{}': {}", path.display(), e),
        )
    })?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let entry: T = serde_json::from_str(&line).map_err(|e| NdjsonError::JsonParse {
            line: line_number + 1,
            source: e,
        })?;

        if let Some(ref validator) = validate_entry {
            validator(&entry).map_err(|reason| NdjsonError::InvalidEntry {
                line: line_number + 1,
                reason,
            })?;
        }

        entries.push(entry);
    }

    Ok(entries)
}

/// Parse an NDJSON file without extra validation.
pub fn parse_ndjson_file<T>(path: &Path) -> Result<Vec<T>, NdjsonError>
where
    T: for<'de> Deserialize<'de>,
{
    parse_ndjson_file_generic(path, None::<fn(&T) -> Result<(), String>>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::error::Error;
    use std::io::Write;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        message: String,
        #[serde(default)]
        count: u32,
    }

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_skips_empty_lines() {
        let file = write_file("{\"message\":\"a\"}\n\n   \n{\"message\":\"b\",\"count\":2}\n");
        let entries: Vec<TestData> = parse_ndjson_file(file.path()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "a");
        assert_eq!(entries[1].count, 2);
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let file = write_file("{\"message\":\"a\"}\nnot json\n");
        let result = parse_ndjson_file::<TestData>(file.path());

        match result {
            Err(error @ NdjsonError::JsonParse { .. }) => {
                assert!(error.to_string().contains("line 2"));
                assert!(error.source().is_some());
            }
            other => panic!("Expected JsonParse error, got: {:?}", other),
        }
    }

    #[test]
    fn test_validator_rejects_entry() {
        let file = write_file("{\"message\":\"ok\"}\n{\"message\":\"\"}\n");
        let result = parse_ndjson_file_generic(
            file.path(),
            Some(|entry: &TestData| {
                if entry.message.is_empty() {
                    Err("empty message".to_string())
                } else {
                    Ok(())
                }
            }),
        );

        match result {
            Err(NdjsonError::InvalidEntry { line, reason }) => {
                assert_eq!(line, 2);
                assert_eq!(reason, "empty message");
            }
            other => panic!("Expected InvalidEntry error, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        match parse_ndjson_file::<TestData>(Path::new("non_existent_file.ndjson")) {
            Err(NdjsonError::Generic { context, .. }) => {
                assert!(context.contains("opening file"));
            }
            other => panic!("Expected generic error for missing file, got: {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_yields_no_entries() {
        let file = write_file("");
        let entries: Vec<TestData> = parse_ndjson_file(file.path()).unwrap();
        assert!(entries.is_empty());
    }
}
