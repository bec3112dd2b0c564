//! Dead-letter sinks.
//!
//! A dead letter is written when a delivery cannot complete: the channel is
//! misconfigured, the transport rejected the message, or every retry failed.
//! The CLI combines [`TracingDeadLetters`] with an optional
//! [`JsonLinesDeadLetters`] file through [`FanoutDeadLetters`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use notifications::{DeadLetter, DeadLetterSink, NotifyError};
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps dead letters in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryDeadLetters {
    letters: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every letter recorded so far, in recording order.
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetters {
    async fn record(&self, letter: &DeadLetter) -> Result<(), NotifyError> {
        self.letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(letter.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Emits every dead letter as a structured `error!` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDeadLetters;

#[async_trait]
impl DeadLetterSink for TracingDeadLetters {
    async fn record(&self, letter: &DeadLetter) -> Result<(), NotifyError> {
        tracing::error!(
            delivery_id = %letter.delivery_id,
            execution = %letter.execution_id,
            phase = %letter.phase,
            rule = %letter.rule_key,
            channel = %letter.channel,
            recipient = letter.recipient.as_ref().map(|r| r.as_str()),
            reason = ?letter.reason,
            attempts = letter.attempts,
            error = %letter.error,
            "Notification dead-lettered"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON lines file
// ---------------------------------------------------------------------------

/// Appends each dead letter as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesDeadLetters {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonLinesDeadLetters {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, NotifyError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                NotifyError::configuration(format!(
                    "cannot open dead-letter file {}: {e}",
                    path.display()
                ))
            })?;
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for JsonLinesDeadLetters {
    async fn record(&self, letter: &DeadLetter) -> Result<(), NotifyError> {
        let sink_error = |message: String| NotifyError::DeadLetterSink { message };

        let mut line = serde_json::to_string(letter).map_err(|e| sink_error(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| sink_error(format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| sink_error(format!("{}: {e}", self.path.display())))
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Records every letter in each inner sink, in order.
///
/// All sinks are attempted even if one fails; the first failure is returned.
pub struct FanoutDeadLetters {
    sinks: Vec<Arc<dyn DeadLetterSink>>,
}

impl FanoutDeadLetters {
    pub fn new(sinks: Vec<Arc<dyn DeadLetterSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl DeadLetterSink for FanoutDeadLetters {
    async fn record(&self, letter: &DeadLetter) -> Result<(), NotifyError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(letter).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use notifications::{
        ChannelKind, DeadLetterReason, DeliveryId, DomainName, ExecutionId, ExecutionName,
        ExecutionPhase, LaunchPlanName, ProjectName, Recipient, RuleKey, Timestamp,
    };

    use super::*;

    fn letter() -> DeadLetter {
        let project = ProjectName::new("flytesnacks").unwrap();
        let domain = DomainName::new("production").unwrap();
        DeadLetter {
            delivery_id: DeliveryId::new_random(),
            execution_id: ExecutionId::new(
                project.clone(),
                domain.clone(),
                ExecutionName::new("a1b2").unwrap(),
            ),
            phase: ExecutionPhase::Failed,
            rule_key: RuleKey {
                project,
                domain,
                launch_plan: LaunchPlanName::new("nightly").unwrap(),
                index: 0,
            },
            channel: ChannelKind::Email,
            recipient: Recipient::new("oncall@example.com"),
            reason: DeadLetterReason::RetriesExhausted,
            attempts: 4,
            error: "connection refused".into(),
            recorded_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn json_lines_appends_one_object_per_letter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");

        let sink = JsonLinesDeadLetters::open(&path).await.unwrap();
        sink.record(&letter()).await.unwrap();
        sink.record(&letter()).await.unwrap();
        drop(sink);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DeadLetter = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.reason, DeadLetterReason::RetriesExhausted);
        assert_eq!(parsed.attempts, 4);
    }

    #[tokio::test]
    async fn fanout_records_in_every_sink() {
        let a = Arc::new(MemoryDeadLetters::new());
        let b = Arc::new(MemoryDeadLetters::new());
        let sinks: Vec<Arc<dyn DeadLetterSink>> =
            vec![a.clone(), b.clone(), Arc::new(TracingDeadLetters)];
        let fanout = FanoutDeadLetters::new(sinks);

        fanout.record(&letter()).await.unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesDeadLetters::open(dir.path().join("missing/dead.jsonl"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot open dead-letter file"));
    }
}
