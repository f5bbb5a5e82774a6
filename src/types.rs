use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type ContestId = String;
pub type QuestionId = String;
pub type ParticipationId = String;
pub type UserId = String;

/// Contest metadata plus its ordered question list, as fetched from the
/// backend. Immutable for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    /// Authoritative end time. The countdown is always derived from this,
    /// never from a client-supplied duration.
    pub end_time: DateTime<Utc>,
    pub questions: Vec<Question>,
    pub requires_code: bool,
    pub has_negative_marking: bool,
    #[serde(default)]
    pub negative_marking_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    /// Correct answers by option text. Always a subset of `options`,
    /// before and after shuffling.
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: String,
}

/// A per-session, per-participant transformation of a [`Question`]: options
/// reordered, correct-answer set re-expressed against the new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffledQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answers: Vec<String>,
    pub explanation: String,
    pub difficulty: String,
}

/// Participant-facing projection of a [`ShuffledQuestion`] with the
/// correct-answer set and explanation withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub difficulty: String,
}

impl From<&ShuffledQuestion> for QuestionView {
    fn from(q: &ShuffledQuestion) -> Self {
        Self {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            options: q.options.clone(),
            difficulty: q.difficulty.clone(),
        }
    }
}

/// Contest header sent to participants (no questions, no answer keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestView {
    pub id: ContestId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub question_count: usize,
    pub has_negative_marking: bool,
    pub negative_marking_value: f64,
}

impl From<&Contest> for ContestView {
    fn from(c: &Contest) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            start_time: c.start_time,
            end_time: c.end_time,
            question_count: c.questions.len(),
            has_negative_marking: c.has_negative_marking,
            negative_marking_value: c.negative_marking_value,
        }
    }
}

/// Per-question answer state. `selected` is the empty string while the
/// question is unattempted; unattempted questions are still transmitted on
/// submit so "unattempted" and "not visited" stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(default)]
    pub selected: String,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub marked_for_review: bool,
}

impl AnswerRecord {
    pub fn attempted(&self) -> bool {
        !self.selected.is_empty()
    }
}

/// The engine's cached view of the server-side participation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub id: ParticipationId,
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub started_at: DateTime<Utc>,
    pub violation_count: u32,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Classified integrity violations. Labels match what is reported to the
/// backend and shown in warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabSwitch,
    FullscreenExit,
    FocusLoss,
    BackNavigation,
    EscapeKey,
    AltTab,
    CtrlTab,
    CloseWindowKey,
    NewWindowKey,
    NewTabKey,
    AltF4,
    FullscreenToggleKey,
    FunctionKey,
    ContextMenu,
    ExternalLink,
    WindowMinimized,
}

impl ViolationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "Tab switching",
            ViolationKind::FullscreenExit => "Fullscreen exited",
            ViolationKind::FocusLoss => "Window focus lost",
            ViolationKind::BackNavigation => "Back navigation",
            ViolationKind::EscapeKey => "Escape key",
            ViolationKind::AltTab => "Alt+Tab switch",
            ViolationKind::CtrlTab => "Ctrl+Tab switch",
            ViolationKind::CloseWindowKey => "Window close shortcut",
            ViolationKind::NewWindowKey => "New window shortcut",
            ViolationKind::NewTabKey => "New tab shortcut",
            ViolationKind::AltF4 => "Alt+F4",
            ViolationKind::FullscreenToggleKey => "F11 fullscreen toggle",
            ViolationKind::FunctionKey => "Function key",
            ViolationKind::ContextMenu => "Context menu",
            ViolationKind::ExternalLink => "External link",
            ViolationKind::WindowMinimized => "Window minimized",
        }
    }
}

/// One detected violation, kept in the session's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub id: String,
    pub kind: ViolationKind,
    pub label: String,
    pub at: DateTime<Utc>,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            label: kind.label().to_string(),
            at: Utc::now(),
        }
    }
}

/// Raw page events forwarded by the participant UI. These are untrusted
/// observations; classification into violations happens engine-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageEvent {
    VisibilityHidden,
    FullscreenExit,
    WindowBlur {
        /// True only for window-level blur. In-page focus changes between
        /// form controls also fire blur and must not count.
        window_level: bool,
    },
    BackNavigation,
    KeyCombo {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        alt: bool,
    },
    ContextMenu,
    ExternalLink,
    Resize {
        width: u32,
        height: u32,
    },
}

/// Per-question detail of a committed result, as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub selected: String,
    pub correct_answers: Vec<String>,
    pub is_correct: bool,
}

/// Display figures computed by the scoring presenter from a committed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub negative_marks: f64,
    pub final_score: f64,
    pub percentage: f64,
    pub time_taken_seconds: i64,
    pub violation_count: u32,
    pub auto_submitted: bool,
}
