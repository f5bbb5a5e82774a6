//! Boundary contracts consumed by the session engine.
//!
//! The CRUD/storage layer behind these contracts is out of scope; the engine
//! only ever talks to it through [`ContestBackend`]. The HTTP implementation
//! lives in [`http`], test doubles live next to the tests that use them.

mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;

use crate::types::{Contest, QuestionOutcome};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur at the backend boundary
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("already submitted")]
    AlreadySubmitted,

    #[error("contest still running")]
    ContestRunning,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response parsing failed: {0}")]
    Parse(String),
}

impl BackendError {
    /// True for failures worth retrying (network blips, 5xx), false for
    /// definitive server answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Status(500..=599))
    }
}

/// Whether this user already holds a participation for a contest, and how
/// far it got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationStatus {
    pub participation_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub violation_count: u32,
}

/// Created or resumed participation, as returned by the join endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub participation_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub violation_count: u32,
}

/// Server response to a violation report. The returned count is the sole
/// escalation authority; the client never counts on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationAck {
    pub violation_count: u32,
    #[serde(default)]
    pub force_submit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: String,
    /// Empty string for unattempted questions, which are still transmitted.
    pub selected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub answers: Vec<AnswerEntry>,
    pub auto_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_type: Option<String>,
}

/// Committed score breakdown returned by the idempotent submit endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub participation_id: String,
    pub details: Vec<QuestionOutcome>,
    pub time_taken_seconds: i64,
    #[serde(default)]
    pub violation_count: u32,
    #[serde(default)]
    pub auto_submitted: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Post-end result payload: the participant's own breakdown plus the
/// scoreboard used for rank computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestResult {
    pub receipt: SubmitReceipt,
    /// Final scores of all participants, in no particular order.
    #[serde(default)]
    pub scores: Vec<f64>,
}

/// The contracts of the excluded backend layer, as the engine consumes them.
#[async_trait]
pub trait ContestBackend: Send + Sync {
    /// Contest metadata + ordered question list + authoritative end time.
    async fn fetch_contest(&self, contest_id: &str) -> BackendResult<Contest>;

    /// Existing participation for this user, if any.
    async fn participation_status(
        &self,
        contest_id: &str,
        user_id: &str,
    ) -> BackendResult<ParticipationStatus>;

    /// Create or resume a participation; may require a join code.
    async fn join(
        &self,
        contest_id: &str,
        user_id: &str,
        access_code: Option<&str>,
    ) -> BackendResult<JoinReceipt>;

    /// Increment the server-side violation counter.
    async fn report_violation(
        &self,
        contest_id: &str,
        participation_id: &str,
        label: &str,
    ) -> BackendResult<ViolationAck>;

    /// Idempotent commit of the final answer set.
    async fn submit(
        &self,
        contest_id: &str,
        participation_id: &str,
        request: &SubmitRequest,
    ) -> BackendResult<SubmitReceipt>;

    /// Post-end result retrieval. Returns [`BackendError::ContestRunning`]
    /// while the contest is still running.
    async fn result(
        &self,
        contest_id: &str,
        participation_id: &str,
    ) -> BackendResult<ContestResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Transport("connection refused".to_string()).is_transient());
        assert!(BackendError::Status(503).is_transient());
        assert!(!BackendError::AlreadySubmitted.is_transient());
        assert!(!BackendError::Rejected("bad code".to_string()).is_transient());
        assert!(!BackendError::Status(404).is_transient());
    }

    #[test]
    fn test_submit_request_omits_absent_violation() {
        let request = SubmitRequest {
            answers: vec![AnswerEntry {
                question_id: "q1".to_string(),
                selected: String::new(),
            }],
            auto_submitted: false,
            violation_type: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("violation_type"));
        // Unattempted answers stay in the payload as empty strings.
        assert!(json.contains(r#""selected":"""#));
    }
}
