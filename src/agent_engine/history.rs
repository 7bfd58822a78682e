use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::PilotResult;
use crate::llm::types::HistoryItem;

#[derive(Debug, Clone, Serialize)]
struct TranscriptLine<'a> {
    ts: i64,
    session: &'a str,
    #[serde(flatten)]
    item: &'a HistoryItem,
}

/// Append-only JSONL record of a run's history items.
pub struct SessionTranscript {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionTranscript {
    pub fn new(dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Ok(Self {
            session_id,
            file_path,
        })
    }

    /// Transcript for `agent.transcript_dir`; `None` disables it.
    pub fn from_setting(setting: Option<&str>) -> Option<Self> {
        let dir = match setting? {
            "default" => default_dir()?,
            other => PathBuf::from(other),
        };
        match Self::new(&dir) {
            Ok(t) => {
                tracing::info!(path = %t.file_path.display(), "session transcript enabled");
                Some(t)
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot create transcript dir");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, item: &HistoryItem) -> PilotResult<()> {
        let line = serde_json::to_string(&TranscriptLine {
            ts: chrono::Utc::now().timestamp_millis(),
            session: &self.session_id,
            item,
        })?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), step = item.step, "history item flushed");
        Ok(())
    }

    /// Like `append`, but failures are only logged.
    pub fn record(&self, item: &HistoryItem) {
        if let Err(e) = self.append(item) {
            tracing::warn!(error = %e, "transcript write failed");
        }
    }
}

/// `<data_local_dir>/jobpilot/sessions`
fn default_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("jobpilot").join("sessions"))
}
