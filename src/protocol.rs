use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AnswerRecord, ContestId, ContestView, PageEvent, ParticipationId, QuestionId, QuestionOutcome,
    QuestionView, ScoreSummary,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Join {
        contest_id: ContestId,
        access_code: Option<String>,
    },
    SelectAnswer {
        question_id: QuestionId,
        selection: String,
    },
    MarkVisited {
        index: usize,
    },
    ToggleReview {
        index: usize,
    },
    /// Raw integrity-sensitive page event for engine-side classification.
    Page {
        event: PageEvent,
    },
    Submit,
    /// Works with or without a live session, so the results view can be
    /// reached after the session object is gone.
    FetchResult {
        contest_id: ContestId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: DateTime<Utc>,
    },
    /// Session materialized (fresh or restored). Questions arrive in this
    /// participant's fixed shuffled order, answer keys withheld.
    SessionReady {
        participation_id: ParticipationId,
        contest: ContestView,
        questions: Vec<QuestionView>,
        records: Vec<AnswerRecord>,
        current_index: usize,
        remaining_seconds: u64,
        violation_count: u32,
        server_now: DateTime<Utc>,
    },
    /// Re-entry denied: this participation already committed.
    AlreadySubmitted {
        participation_id: Option<ParticipationId>,
    },
    /// Full palette state after an answer-store mutation.
    AnswerState {
        records: Vec<AnswerRecord>,
        current_index: usize,
    },
    Tick {
        remaining_seconds: u64,
    },
    /// Dismissible on the first violation; `final_warning` when the next
    /// step is forced submission.
    ViolationWarning {
        label: String,
        violation_count: u32,
        final_warning: bool,
    },
    /// Non-dismissible notice; submission fires after `delay_ms`.
    ForcedSubmitPending {
        label: String,
        delay_ms: u64,
    },
    Submitted {
        summary: ScoreSummary,
    },
    /// Transient commit failure; the guard has been rolled back.
    SubmissionFailed {
        message: String,
        retryable: bool,
    },
    /// Results are withheld until the contest ends.
    ResultPending {
        ends_at: DateTime<Utc>,
    },
    ResultReady {
        summary: ScoreSummary,
        rank: usize,
        details: Vec<QuestionOutcome>,
    },
    Error {
        code: String,
        msg: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"select_answer","question_id":"q1","selection":"Paris"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SelectAnswer {
                question_id,
                selection,
            } => {
                assert_eq!(question_id, "q1");
                assert_eq!(selection, "Paris");
            }
            _ => panic!("expected select_answer"),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"page","event":{"kind":"resize","width":200,"height":150}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Page { .. }));
    }

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::Tick {
            remaining_seconds: 42,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""t":"tick""#));
        assert!(json.contains(r#""remaining_seconds":42"#));
    }
}
