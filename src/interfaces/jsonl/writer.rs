use crate::error::{ErrorKind, IntakeError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct SuccessLine<'a, T: Serialize> {
    line: usize,
    result: &'a T,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

#[derive(Serialize)]
struct ErrorLine {
    line: usize,
    error: ErrorBody,
}

/// Writes one JSON outcome per processed input line.
pub struct JsonLinesWriter<W: Write> {
    sink: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// `{"line": n, "result": ...}`
    pub fn write_result<T: Serialize>(&mut self, line: usize, result: &T) -> Result<()> {
        self.write_json(&SuccessLine { line, result })
    }

    /// `{"line": n, "error": {"kind": ..., "message": ...}}`
    pub fn write_error(&mut self, line: usize, error: &IntakeError) -> Result<()> {
        self.write_json(&ErrorLine {
            line,
            error: ErrorBody {
                kind: error.kind(),
                message: error.to_string(),
            },
        })
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.sink, value)
            .map_err(|e| IntakeError::BackendError(Box::new(e)))?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
