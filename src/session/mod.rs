pub mod answers;
pub mod clock;
pub mod escalation;
pub mod monitor;
pub mod score;
pub mod shuffle;
pub mod store;
pub mod submit;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::backend::{ContestBackend, JoinReceipt};
use crate::config::EngineConfig;
use crate::protocol::ServerMessage;
use crate::types::{
    AnswerRecord, Contest, ContestView, Participation, ParticipationId, QuestionView,
    ShuffledQuestion, ViolationEvent,
};

use store::{SessionSnapshot, SnapshotStore, SNAPSHOT_SCHEMA_VERSION};
use submit::CommitState;

/// Per-question answer state plus the participant's current position.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    pub records: Vec<AnswerRecord>,
    pub current_index: usize,
}

/// One participant's live attempt at one contest.
///
/// Everything that can race into the submission coordinator (clock task,
/// page events, direct user actions) goes through this object; the commit
/// guard inside resolves those races to exactly one commit.
pub struct Session {
    pub participation: Participation,
    pub contest: Contest,
    /// Fixed at materialization; never reshuffled for the session lifetime.
    pub questions: Vec<ShuffledQuestion>,
    pub config: EngineConfig,
    /// Asynchronous engine output: ticks, warnings, submission results.
    pub events: broadcast::Sender<ServerMessage>,
    pub(crate) backend: Arc<dyn ContestBackend>,
    pub(crate) store: SnapshotStore,
    pub(crate) answers: RwLock<AnswerSheet>,
    pub(crate) commit: Mutex<CommitState>,
    /// Server-authoritative violation count; only ever increases.
    pub(crate) violations: RwLock<u32>,
    pub(crate) violation_log: RwLock<Vec<ViolationEvent>>,
    pub(crate) closed: RwLock<bool>,
}

impl Session {
    fn materialize(
        contest: Contest,
        receipt: JoinReceipt,
        user_id: &str,
        backend: Arc<dyn ContestBackend>,
        store: SnapshotStore,
        config: EngineConfig,
    ) -> Self {
        // Shuffle executes exactly once, here — not on every render or
        // navigation. A pre-submission snapshot restores the presentation
        // of an interrupted session instead of rolling new order.
        let (questions, sheet) = match store
            .load(&receipt.participation_id)
            .and_then(|snapshot| restore_session(&contest, snapshot))
        {
            Some(restored) => restored,
            None => {
                let questions = shuffle::shuffle_questions(&contest.questions);
                let records = vec![AnswerRecord::default(); questions.len()];
                (
                    questions,
                    AnswerSheet {
                        records,
                        current_index: 0,
                    },
                )
            }
        };

        let participation = Participation {
            id: receipt.participation_id,
            user_id: user_id.to_string(),
            contest_id: contest.id.clone(),
            started_at: receipt.started_at,
            violation_count: receipt.violation_count,
            submitted_at: None,
        };

        let (events, _rx) = broadcast::channel(64);

        Self {
            participation: participation.clone(),
            contest,
            questions,
            config,
            events,
            backend,
            store,
            answers: RwLock::new(sheet),
            commit: Mutex::new(CommitState::Idle),
            violations: RwLock::new(participation.violation_count),
            violation_log: RwLock::new(Vec::new()),
            closed: RwLock::new(false),
        }
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    pub(crate) async fn close(&self) {
        *self.closed.write().await = true;
    }

    pub async fn violation_count(&self) -> u32 {
        *self.violations.read().await
    }

    /// Adopt the server-returned count. Monotonic: a lagging response can
    /// never lower the cached count.
    pub(crate) async fn record_violation_count(&self, server_count: u32) -> u32 {
        let mut violations = self.violations.write().await;
        *violations = (*violations).max(server_count);
        *violations
    }

    pub(crate) async fn log_violation(&self, event: ViolationEvent) {
        self.violation_log.write().await.push(event);
    }

    /// Audit trail of classified violations, including ones whose report
    /// never reached the server.
    pub async fn violation_log(&self) -> Vec<ViolationEvent> {
        self.violation_log.read().await.clone()
    }

    pub fn index_of(&self, question_id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }

    /// Mirror the current answer state to the local snapshot store.
    pub(crate) async fn persist(&self) {
        let sheet = self.answers.read().await;
        let snapshot = SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            contest_id: self.contest.id.clone(),
            participation_id: self.participation.id.clone(),
            current_index: sheet.current_index,
            order: self.questions.iter().map(Into::into).collect(),
            records: sheet.records.clone(),
        };
        drop(sheet);

        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!(
                participation_id = %self.participation.id,
                error = %e,
                "Failed to persist session snapshot"
            );
        }
    }

    pub async fn ready_message(&self) -> ServerMessage {
        let sheet = self.answers.read().await;
        ServerMessage::SessionReady {
            participation_id: self.participation.id.clone(),
            contest: ContestView::from(&self.contest),
            questions: self.questions.iter().map(QuestionView::from).collect(),
            records: sheet.records.clone(),
            current_index: sheet.current_index,
            remaining_seconds: self.remaining_seconds(),
            violation_count: *self.violations.read().await,
            server_now: Utc::now(),
        }
    }
}

/// Rebuild a session's presentation from a snapshot, or reject it.
///
/// The snapshot carries question order and option order but never answer
/// keys; correct sets are re-derived by value lookup against the freshly
/// fetched contest. Any mismatch with the contest discards the snapshot.
fn restore_session(
    contest: &Contest,
    snapshot: SessionSnapshot,
) -> Option<(Vec<ShuffledQuestion>, AnswerSheet)> {
    if snapshot.contest_id != contest.id
        || snapshot.order.len() != contest.questions.len()
        || snapshot.records.len() != snapshot.order.len()
    {
        return None;
    }

    let mut questions = Vec::with_capacity(snapshot.order.len());
    for entry in &snapshot.order {
        let source = contest.questions.iter().find(|q| q.id == entry.id)?;

        let mut original = source.options.clone();
        let mut persisted = entry.options.clone();
        original.sort();
        persisted.sort();
        if original != persisted {
            return None;
        }

        let correct_answers: Vec<String> = entry
            .options
            .iter()
            .filter(|o| source.correct_answers.contains(o))
            .cloned()
            .collect();

        questions.push(ShuffledQuestion {
            id: source.id.clone(),
            prompt: source.prompt.clone(),
            options: entry.options.clone(),
            correct_answers,
            explanation: source.explanation.clone(),
            difficulty: source.difficulty.clone(),
        });
    }

    let current_index = snapshot.current_index.min(questions.len().saturating_sub(1));

    Some((
        questions,
        AnswerSheet {
            records: snapshot.records,
            current_index,
        },
    ))
}

/// What `open_session` hands back: a live session, or the short-circuit for
/// a participation that already committed.
pub enum SessionGate {
    Active(Arc<Session>),
    AlreadySubmitted {
        participation_id: Option<ParticipationId>,
    },
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionGate::Active(_) => f.write_str("SessionGate::Active(..)"),
            SessionGate::AlreadySubmitted { participation_id } => f
                .debug_struct("SessionGate::AlreadySubmitted")
                .field("participation_id", participation_id)
                .finish(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub backend: Arc<dyn ContestBackend>,
    pub config: EngineConfig,
    pub store: SnapshotStore,
    pub sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ContestBackend>, config: EngineConfig) -> Self {
        let store = SnapshotStore::new(&config.snapshot_dir);
        Self {
            backend,
            config,
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn session_key(contest_id: &str, user_id: &str) -> String {
        format!("{}:{}", contest_id, user_id)
    }

    /// Open (or re-attach to) this user's session for a contest.
    ///
    /// Guard order per the submission design: server `submitted_at` first,
    /// then the local submitted marker, then a fresh join. A live session in
    /// the registry is reused as-is so the participant keeps the same
    /// question order across reconnects.
    pub async fn open_session(
        &self,
        contest_id: &str,
        user_id: &str,
        access_code: Option<&str>,
    ) -> Result<SessionGate, String> {
        let key = Self::session_key(contest_id, user_id);

        if let Some(existing) = self.sessions.read().await.get(&key) {
            if !existing.is_closed().await {
                return Ok(SessionGate::Active(existing.clone()));
            }
        }

        let status = self
            .backend
            .participation_status(contest_id, user_id)
            .await
            .map_err(|e| format!("Failed to fetch participation status: {}", e))?;

        if status.submitted_at.is_some() {
            return Ok(SessionGate::AlreadySubmitted {
                participation_id: status.participation_id,
            });
        }

        if let Some(pid) = &status.participation_id {
            if self.store.is_submitted(pid) {
                return Ok(SessionGate::AlreadySubmitted {
                    participation_id: Some(pid.clone()),
                });
            }
        }

        let contest = self
            .backend
            .fetch_contest(contest_id)
            .await
            .map_err(|e| format!("Failed to fetch contest: {}", e))?;

        let now = Utc::now();
        if now < contest.start_time {
            return Err("Contest has not started yet".to_string());
        }
        if now >= contest.end_time {
            return Err("Contest has already ended".to_string());
        }
        if contest.requires_code && access_code.is_none() {
            return Err("Join code required".to_string());
        }

        let receipt = self
            .backend
            .join(contest_id, user_id, access_code)
            .await
            .map_err(|e| format!("Failed to join contest: {}", e))?;

        // Fresh session start voids any stale marker for this participation.
        self.store.clear_marker(&receipt.participation_id);

        let session = Arc::new(Session::materialize(
            contest,
            receipt,
            user_id,
            self.backend.clone(),
            self.store.clone(),
            self.config.clone(),
        ));

        clock::spawn_countdown(session.clone());

        self.sessions.write().await.insert(key, session.clone());

        tracing::info!(
            contest_id,
            user_id,
            participation_id = %session.participation.id,
            questions = session.questions.len(),
            "Session materialized"
        );

        Ok(SessionGate::Active(session))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_session_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(5, ChronoDuration::hours(1))));
        let state = test_state(backend, dir.path());

        let gate = state.open_session("c1", "u1", None).await.unwrap();
        let session = match gate {
            SessionGate::Active(s) => s,
            _ => panic!("expected active session"),
        };

        assert_eq!(session.questions.len(), 5);
        assert_eq!(session.participation.id, "p1");
        assert!(!session.is_closed().await);

        let (records, current_index) = session.snapshot().await;
        assert_eq!(records.len(), 5);
        assert_eq!(current_index, 0);
        assert!(records.iter().all(|r| !r.attempted()));
    }

    #[tokio::test]
    async fn test_open_session_denied_when_server_says_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(3, ChronoDuration::hours(1))));
        {
            let mut status = backend.status.lock().await;
            status.participation_id = Some("p1".to_string());
            status.submitted_at = Some(chrono::Utc::now());
        }
        let state = test_state(backend, dir.path());

        match state.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::AlreadySubmitted { participation_id } => {
                assert_eq!(participation_id.as_deref(), Some("p1"));
            }
            _ => panic!("expected already-submitted gate"),
        }
    }

    #[tokio::test]
    async fn test_open_session_denied_by_local_marker() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(3, ChronoDuration::hours(1))));
        {
            let mut status = backend.status.lock().await;
            status.participation_id = Some("p1".to_string());
        }
        let state = test_state(backend, dir.path());
        state.store.mark_submitted("p1").unwrap();

        match state.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::AlreadySubmitted { participation_id } => {
                assert_eq!(participation_id.as_deref(), Some("p1"));
            }
            _ => panic!("expected already-submitted gate"),
        }
    }

    #[tokio::test]
    async fn test_open_session_rejects_ended_contest() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(
            3,
            ChronoDuration::minutes(-1),
        )));
        let state = test_state(backend, dir.path());

        let result = state.open_session("c1", "u1", None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("ended"));
    }

    #[tokio::test]
    async fn test_open_session_requires_join_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut contest = sample_contest(3, ChronoDuration::hours(1));
        contest.requires_code = true;
        let backend = Arc::new(StubBackend::new(contest));
        let state = test_state(backend, dir.path());

        let result = state.open_session("c1", "u1", None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("code"));

        let gate = state.open_session("c1", "u1", Some("SECRET")).await.unwrap();
        assert!(matches!(gate, SessionGate::Active(_)));
    }

    #[tokio::test]
    async fn test_reconnect_reuses_session_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(
            10,
            ChronoDuration::hours(1),
        )));
        let state = test_state(backend, dir.path());

        let first = match state.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::Active(s) => s,
            _ => panic!("expected active session"),
        };
        first.set_answer("q3", "B3").await.unwrap();

        let second = match state.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::Active(s) => s,
            _ => panic!("expected active session"),
        };

        // Same live session: same shuffled order, answers intact.
        assert!(Arc::ptr_eq(&first, &second));
        let first_order: Vec<_> = first.questions.iter().map(|q| q.id.clone()).collect();
        let second_order: Vec<_> = second.questions.iter().map(|q| q.id.clone()).collect();
        assert_eq!(first_order, second_order);
    }

    #[tokio::test]
    async fn test_snapshot_restore_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(StubBackend::new(sample_contest(6, ChronoDuration::hours(1))));
        let state = test_state(backend.clone(), dir.path());

        let session = match state.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::Active(s) => s,
            _ => panic!("expected active session"),
        };

        session.set_answer("q2", "B2").await.unwrap();
        session.mark_visited(4).await.unwrap();
        session.toggle_review(4).await.unwrap();
        let original_order: Vec<_> = session.questions.iter().map(|q| q.id.clone()).collect();
        let original_options = session.questions[0].options.clone();

        // Simulate a reload into a fresh engine process: new state, same
        // snapshot dir, same backend participation.
        let state2 = test_state(backend, dir.path());
        let restored = match state2.open_session("c1", "u1", None).await.unwrap() {
            SessionGate::Active(s) => s,
            _ => panic!("expected active session"),
        };

        let restored_order: Vec<_> = restored.questions.iter().map(|q| q.id.clone()).collect();
        assert_eq!(restored_order, original_order);
        assert_eq!(restored.questions[0].options, original_options);

        let (records, current_index) = restored.snapshot().await;
        assert_eq!(current_index, 4);
        let idx = restored.index_of("q2").unwrap();
        assert_eq!(records[idx].selected, "B2");
        assert!(records[4].marked_for_review);

        // Correct sets were re-derived by value, never read from disk.
        for question in &restored.questions {
            assert_eq!(question.correct_answers.len(), 1);
            assert!(question.options.contains(&question.correct_answers[0]));
        }
    }

    #[tokio::test]
    async fn test_restore_rejects_mismatched_contest() {
        let contest = sample_contest(3, ChronoDuration::hours(1));
        let snapshot = SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            contest_id: "other".to_string(),
            participation_id: "p1".to_string(),
            current_index: 0,
            order: vec![],
            records: vec![],
        };
        assert!(restore_session(&contest, snapshot).is_none());
    }

    #[tokio::test]
    async fn test_restore_rejects_tampered_options() {
        let contest = sample_contest(1, ChronoDuration::hours(1));
        let snapshot = SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            contest_id: "c1".to_string(),
            participation_id: "p1".to_string(),
            current_index: 0,
            order: vec![store::SnapshotQuestion {
                id: "q0".to_string(),
                options: vec![
                    "A0".to_string(),
                    "B0".to_string(),
                    "C0".to_string(),
                    "X0".to_string(),
                ],
            }],
            records: vec![AnswerRecord::default()],
        };
        assert!(restore_session(&contest, snapshot).is_none());
    }
}
