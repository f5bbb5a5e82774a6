//! Single-flight, idempotent submission.
//!
//! Manual submit, clock expiry, and violation escalation all enter through
//! [`Session::submit`]; the commit state resolves the race to exactly one
//! accepted commit. Guard order: the in-memory one-shot state before any
//! network call, the persisted marker at session open, and finally the
//! server's own idempotency as the authority on ambiguous outcomes.

use crate::backend::{AnswerEntry, BackendError, SubmitRequest};
use crate::protocol::ServerMessage;
use crate::types::{ScoreSummary, ViolationKind};

use super::{score, Session};

/// Who asked for the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    Manual,
    Expiry,
    Violation(ViolationKind),
}

impl CommitTrigger {
    fn auto_submitted(&self) -> bool {
        !matches!(self, CommitTrigger::Manual)
    }

    fn violation_label(&self) -> Option<&'static str> {
        match self {
            CommitTrigger::Violation(kind) => Some(kind.label()),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            CommitTrigger::Manual => "manual",
            CommitTrigger::Expiry => "expiry",
            CommitTrigger::Violation(_) => "violation",
        }
    }
}

/// One-shot commit state replacing ad hoc boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitState {
    Idle,
    InFlight,
    Committed,
}

/// Tagged outcome of a submit attempt.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// This call performed the commit.
    Committed(ScoreSummary),
    /// A commit already happened — locally or, per the server, elsewhere.
    AlreadySubmitted,
    /// Another trigger is mid-commit; this call was a no-op.
    InFlight,
    /// Transient failure; the guard was rolled back so a retry can run.
    RetryableError(String),
}

impl Session {
    /// The single entry point for all three submission triggers.
    pub async fn submit(&self, trigger: CommitTrigger) -> SubmitOutcome {
        // Guard 1: the in-memory one-shot state, checked and flipped before
        // any network call.
        {
            let mut commit = self.commit.lock().await;
            match *commit {
                CommitState::Committed => return SubmitOutcome::AlreadySubmitted,
                CommitState::InFlight => return SubmitOutcome::InFlight,
                CommitState::Idle => *commit = CommitState::InFlight,
            }
        }

        let request = self.build_submit_request(trigger).await;

        tracing::info!(
            participation_id = %self.participation.id,
            trigger = trigger.describe(),
            answers = request.answers.len(),
            "Submitting contest session"
        );

        match self
            .backend
            .submit(&self.contest.id, &self.participation.id, &request)
            .await
        {
            Ok(receipt) => {
                *self.commit.lock().await = CommitState::Committed;
                self.finish().await;

                let summary = score::summarize(&self.contest, &receipt);
                let _ = self.events.send(ServerMessage::Submitted {
                    summary: summary.clone(),
                });
                SubmitOutcome::Committed(summary)
            }
            Err(BackendError::AlreadySubmitted) => {
                // The server is authoritative: a conflict is success-
                // equivalent, not an error.
                *self.commit.lock().await = CommitState::Committed;
                self.finish().await;
                SubmitOutcome::AlreadySubmitted
            }
            Err(e) => {
                // Roll back so a retry can run; the marker is only written
                // on confirmed success.
                *self.commit.lock().await = CommitState::Idle;
                tracing::error!(
                    participation_id = %self.participation.id,
                    trigger = trigger.describe(),
                    error = %e,
                    "Submission failed, guard rolled back"
                );
                let _ = self.events.send(ServerMessage::SubmissionFailed {
                    message: e.to_string(),
                    retryable: true,
                });
                SubmitOutcome::RetryableError(e.to_string())
            }
        }
    }

    /// One entry per question, unattempted ones as empty strings, so
    /// "unattempted" never collapses into "missing".
    async fn build_submit_request(&self, trigger: CommitTrigger) -> SubmitRequest {
        let (records, _) = self.snapshot().await;
        let answers = self
            .questions
            .iter()
            .zip(records)
            .map(|(question, record)| AnswerEntry {
                question_id: question.id.clone(),
                selected: record.selected,
            })
            .collect();

        SubmitRequest {
            answers,
            auto_submitted: trigger.auto_submitted(),
            violation_type: trigger.violation_label().map(str::to_string),
        }
    }

    /// Terminal transition after a confirmed commit: the session stops
    /// listening, the pre-submission snapshot is erased, and the submitted
    /// marker is written.
    pub(crate) async fn finish(&self) {
        self.close().await;
        self.store.clear(&self.participation.id);
        if let Err(e) = self.store.mark_submitted(&self.participation.id) {
            tracing::warn!(
                participation_id = %self.participation.id,
                error = %e,
                "Failed to write submitted marker"
            );
        }
    }
}
