//! Bellwether phase-transition event source.
//!
//! Implements [`notifications::TransitionSource`] over a stream of JSON
//! lines. Each non-blank line is one [`PhaseTransition`]: the terminated
//! execution's metadata plus the rules of its launch plan.
//!
//! ```json
//! {"execution":{"id":{"project":"flytesnacks","domain":"development","name":"f3a9"},
//!  "phase":"FAILED","workflow":{"name":"int_doubler_wf"},
//!  "launch_plan":{"name":"int_doubler_wf"},"error":"OOMKilled"},
//!  "notifications":[{"channel":"email","phases":["FAILED"],"recipients":["oncall@example.com"]}]}
//! ```
//!
//! (shown wrapped; on the wire every record is a single line)
//!
//! A line that does not decode yields a recoverable
//! [`SourceError::Malformed`] naming the line number; the next call resumes
//! with the following line. A read failure yields [`SourceError::Io`] and
//! ends the stream.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The delivery crates see only
//! [`notifications::TransitionSource`].

use std::path::Path;

use async_trait::async_trait;
use notifications::{PhaseTransition, SourceError, TransitionSource};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Reads phase transitions from newline-delimited JSON.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line: u64,
    origin: String,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wraps `reader`; `origin` names the stream in log events.
    pub fn new(reader: R, origin: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            origin: origin.into(),
        }
    }

    /// Number of lines consumed so far, blank lines included.
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| SourceError::Io {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "<stdin>")
    }
}

#[async_trait]
impl<R> TransitionSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_transition(&mut self) -> Result<Option<PhaseTransition>, SourceError> {
        loop {
            let next = self.lines.next_line().await.map_err(|e| SourceError::Io {
                message: format!("{}: {e}", self.origin),
            })?;
            let Some(text) = next else {
                tracing::debug!(origin = %self.origin, lines = self.line, "Event source exhausted");
                return Ok(None);
            };
            self.line += 1;

            let record = text.trim();
            if record.is_empty() {
                continue;
            }
            return serde_json::from_str(record)
                .map(Some)
                .map_err(|e| SourceError::Malformed {
                    record: self.line,
                    message: e.to_string(),
                });
        }
    }
}

/// Opens the input named on the command line: `-` or `None` for stdin,
/// anything else as a file path.
pub async fn open_input(path: Option<&Path>) -> Result<Box<dyn TransitionSource>, SourceError> {
    match path {
        None => Ok(Box::new(JsonLinesSource::stdin())),
        Some(p) if p.as_os_str() == "-" => Ok(Box::new(JsonLinesSource::stdin())),
        Some(p) => Ok(Box::new(JsonLinesSource::from_path(p).await?)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use notifications::{ChannelKind, ExecutionPhase};

    use super::*;

    const FAILED: &str = r#"{"execution":{"id":{"project":"flytesnacks","domain":"development","name":"f3a9"},"phase":"FAILED","workflow":{"name":"int_doubler_wf"},"launch_plan":{"name":"int_doubler_wf"},"error":"OOMKilled"},"notifications":[{"channel":"email","phases":["FAILED"],"recipients":["oncall@example.com"]}]}"#;
    const SUCCEEDED: &str = r#"{"execution":{"id":{"project":"flytesnacks","domain":"development","name":"b7c1"},"phase":"SUCCEEDED","workflow":{"name":"int_doubler_wf"},"launch_plan":{"name":"int_doubler_wf"}}}"#;

    fn source(input: &str) -> JsonLinesSource<&[u8]> {
        JsonLinesSource::new(input.as_bytes(), "test")
    }

    #[tokio::test]
    async fn reads_records_and_skips_blank_lines() {
        let input = format!("{FAILED}\n\n   \n{SUCCEEDED}\n");
        let mut src = source(&input);

        let first = src.next_transition().await.unwrap().unwrap();
        assert_eq!(first.execution.phase, ExecutionPhase::Failed);
        assert_eq!(first.execution.error.as_deref(), Some("OOMKilled"));
        assert_eq!(first.notifications[0].channel(), ChannelKind::Email);

        let second = src.next_transition().await.unwrap().unwrap();
        assert_eq!(second.execution.id.name.as_str(), "b7c1");
        assert!(second.notifications.is_empty());

        assert!(src.next_transition().await.unwrap().is_none());
        assert_eq!(src.lines_read(), 4);
    }

    #[tokio::test]
    async fn malformed_line_is_recoverable() {
        let input = format!("{{not json\n{SUCCEEDED}\n");
        let mut src = source(&input);

        let err = src.next_transition().await.unwrap_err();
        assert!(err.is_recoverable());
        assert_matches!(err, SourceError::Malformed { record: 1, .. });

        assert!(src.next_transition().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_rule_is_reported_as_malformed() {
        let input = r#"{"execution":{"id":{"project":"p","domain":"d","name":"n"},"phase":"FAILED","workflow":{"name":"w"},"launch_plan":{"name":"lp"}},"notifications":[{"channel":"email","phases":[],"recipients":["a@b.c"]}]}"#;
        let err = source(input).next_transition().await.unwrap_err();
        assert_matches!(err, SourceError::Malformed { record: 1, .. });
    }

    #[tokio::test]
    async fn reads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transitions.jsonl");
        tokio::fs::write(&path, format!("{FAILED}\n")).await.unwrap();

        let mut src = open_input(Some(path.as_path())).await.unwrap();
        assert!(src.next_transition().await.unwrap().is_some());
        assert!(src.next_transition().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesSource::from_path(dir.path().join("absent.jsonl"))
            .await
            .err()
            .unwrap();
        assert_matches!(err, SourceError::Io { .. });
        assert!(!err.is_recoverable());
    }
}
