/// Notification collaborator interface
///
/// The engine reports one transient message per run (or per validation
/// failure). Rendering is up to the collaborator; the in-memory board keeps the
/// most recent notices for the HTTP layer to poll.

use crate::runtime::recorder::{Execution, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Fallback text when a failed run has no entry carrying `output.error`
pub const GENERIC_FAILURE_MESSAGE: &str = "Workflow finished with errors";

const BOARD_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into(), at: Utc::now() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into(), at: Utc::now() }
    }

    /// Summarize a finished execution as one message
    ///
    /// Failed runs report the first error entry's message, or a generic fallback.
    pub fn for_execution(execution: &Execution) -> Self {
        match execution.status {
            ExecutionStatus::Success => Self::success(format!(
                "Workflow executed successfully ({} nodes in {} ms)",
                execution.entries.len(),
                execution.duration_ms
            )),
            ExecutionStatus::Error => Self::error(
                execution
                    .first_error()
                    .and_then(|entry| entry.error_message())
                    .unwrap_or(GENERIC_FAILURE_MESSAGE),
            ),
        }
    }
}

/// Receiver of engine status messages
pub trait Notifier: Send + Sync + std::fmt::Debug {
    fn notify(&self, notice: Notice);
}

/// Notifier that logs every notice and keeps the most recent ones in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<VecDeque<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Notice> {
        self.notices.lock().ok().and_then(|notices| notices.back().cloned())
    }

    pub fn all(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().map(|notices| notices.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!("🔔 {}", notice.message),
            NoticeLevel::Error => tracing::warn!("🔔 {}", notice.message),
        }
        if let Ok(mut notices) = self.notices.lock() {
            if notices.len() == BOARD_CAPACITY {
                notices.pop_front();
            }
            notices.push_back(notice);
        }
    }
}
