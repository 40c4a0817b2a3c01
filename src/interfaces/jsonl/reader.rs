use crate::error::{IntakeError, Result};
use serde::de::DeserializeOwned;
use std::io::BufRead;

/// Reads one JSON document per line.
///
/// Blank lines are skipped. Each yielded item carries its 1-based line
/// number so callers can report failures against the input.
pub struct JsonLinesReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Lazily decodes every non-blank line as `T`.
    ///
    /// A line that is not valid JSON for `T` yields a validation error for
    /// that line only; reading continues with the next one.
    pub fn records<T: DeserializeOwned>(self) -> impl Iterator<Item = (usize, Result<T>)> {
        self.lines().map(|(line_no, line)| {
            let record = line.and_then(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| IntakeError::validation(format!("invalid JSON body: {e}")))
            });
            (line_no, record)
        })
    }

    /// The raw non-blank lines, trimmed.
    pub fn lines(self) -> impl Iterator<Item = (usize, Result<String>)> {
        self.source
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some((index + 1, Ok(line.trim().to_string()))),
                Err(e) => Some((index + 1, Err(IntakeError::from(e)))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderPayload;

    #[test]
    fn test_reader_valid_stream() {
        let data = concat!(
            r#"{"order_id":"o-1","customer_id":1,"items":[{"product_id":"7","quantity":1,"price":8.07}]}"#,
            "\n\n",
            r#"{"order_id":"o-2","customer_id":2,"items":[]}"#,
            "\n"
        );
        let reader = JsonLinesReader::new(data.as_bytes());
        let results: Vec<(usize, Result<OrderPayload>)> = reader.records().collect();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 3);
        assert_eq!(results[1].1.as_ref().unwrap().order_id, "o-2");
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "{\"order_id\":\n{\"order_id\":\"o-1\",\"customer_id\":1,\"items\":[]}";
        let reader = JsonLinesReader::new(data.as_bytes());
        let results: Vec<(usize, Result<OrderPayload>)> = reader.records().collect();

        assert!(matches!(results[0].1, Err(IntakeError::ValidationError(_))));
        assert!(results[1].1.is_ok());
    }
}
