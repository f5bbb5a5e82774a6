//! Classification and reporting of integrity-sensitive page events.
//!
//! The participant UI forwards raw events; classification into violations
//! happens here so the client cannot pick and choose what counts. Detection
//! is best-effort by nature — it is a deterrent and an audit trail, not a
//! guarantee — and reporting fails open: a network blip never blocks a
//! legitimate participant.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::protocol::ServerMessage;
use crate::types::{PageEvent, ViolationEvent, ViolationKind};

use super::escalation::{self, Escalation};
use super::Session;

/// What a reported page event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Filtered out, or the session is no longer listening.
    Ignored,
    Warned {
        kind: ViolationKind,
        count: u32,
    },
    ForcedSubmitScheduled {
        kind: ViolationKind,
        count: u32,
    },
    /// Report never reached the server; the contest continues.
    ReportFailed {
        kind: ViolationKind,
    },
}

/// Classify a raw page event against the violation catalogue.
pub fn classify(config: &EngineConfig, event: &PageEvent) -> Option<ViolationKind> {
    match event {
        PageEvent::VisibilityHidden => Some(ViolationKind::TabSwitch),
        PageEvent::FullscreenExit => Some(ViolationKind::FullscreenExit),
        // Only window-level blur counts; in-page focus changes between
        // form controls also fire blur and must not.
        PageEvent::WindowBlur { window_level: true } => Some(ViolationKind::FocusLoss),
        PageEvent::WindowBlur { window_level: false } => None,
        PageEvent::BackNavigation => Some(ViolationKind::BackNavigation),
        PageEvent::KeyCombo { key, ctrl, alt } => classify_key(key, *ctrl, *alt),
        PageEvent::ContextMenu => Some(ViolationKind::ContextMenu),
        PageEvent::ExternalLink => Some(ViolationKind::ExternalLink),
        PageEvent::Resize { width, height } => {
            if *width < config.min_window_width || *height < config.min_window_height {
                Some(ViolationKind::WindowMinimized)
            } else {
                None
            }
        }
    }
}

fn classify_key(key: &str, ctrl: bool, alt: bool) -> Option<ViolationKind> {
    if key.eq_ignore_ascii_case("escape") {
        Some(ViolationKind::EscapeKey)
    } else if alt && key.eq_ignore_ascii_case("tab") {
        Some(ViolationKind::AltTab)
    } else if ctrl && key.eq_ignore_ascii_case("tab") {
        Some(ViolationKind::CtrlTab)
    } else if ctrl && key.eq_ignore_ascii_case("w") {
        Some(ViolationKind::CloseWindowKey)
    } else if ctrl && key.eq_ignore_ascii_case("n") {
        Some(ViolationKind::NewWindowKey)
    } else if ctrl && key.eq_ignore_ascii_case("t") {
        Some(ViolationKind::NewTabKey)
    } else if alt && key.eq_ignore_ascii_case("f4") {
        Some(ViolationKind::AltF4)
    } else if key.eq_ignore_ascii_case("f11") {
        Some(ViolationKind::FullscreenToggleKey)
    } else if is_function_key(key) {
        Some(ViolationKind::FunctionKey)
    } else {
        None
    }
}

/// F1 through F12.
fn is_function_key(key: &str) -> bool {
    let Some(number) = key.strip_prefix(['f', 'F']) else {
        return false;
    };
    matches!(number.parse::<u8>(), Ok(1..=12))
}

/// Entry point for every raw page event during a session.
pub async fn report_page_event(session: &Arc<Session>, event: PageEvent) -> ViolationOutcome {
    // Terminal sessions no longer listen; a late event is a no-op.
    if session.is_closed().await {
        return ViolationOutcome::Ignored;
    }

    let Some(kind) = classify(&session.config, &event) else {
        return ViolationOutcome::Ignored;
    };

    session.log_violation(ViolationEvent::new(kind)).await;

    match session
        .backend
        .report_violation(&session.contest.id, &session.participation.id, kind.label())
        .await
    {
        Ok(ack) => {
            // The server-returned count is the sole escalation authority.
            let count = session.record_violation_count(ack.violation_count).await;

            match escalation::escalate(count, ack.force_submit, session.config.violation_limit) {
                Escalation::Warn => {
                    tracing::info!(
                        participation_id = %session.participation.id,
                        label = kind.label(),
                        count,
                        "Violation warning issued"
                    );
                    let _ = session.events.send(ServerMessage::ViolationWarning {
                        label: kind.label().to_string(),
                        violation_count: count,
                        final_warning: count + 1 >= session.config.violation_limit,
                    });
                    ViolationOutcome::Warned { kind, count }
                }
                Escalation::Force => {
                    tracing::warn!(
                        participation_id = %session.participation.id,
                        label = kind.label(),
                        count,
                        "Violation limit reached, forcing submission"
                    );
                    let _ = session.events.send(ServerMessage::ForcedSubmitPending {
                        label: kind.label().to_string(),
                        delay_ms: session.config.forced_submit_delay.as_millis() as u64,
                    });
                    escalation::schedule_forced_submit(session.clone(), kind);
                    ViolationOutcome::ForcedSubmitScheduled { kind, count }
                }
            }
        }
        Err(e) => {
            // Fail open: the assessment continues, the event stays in the
            // local audit log.
            tracing::warn!(
                participation_id = %session.participation.id,
                label = kind.label(),
                error = %e,
                "Violation report failed, continuing session"
            );
            ViolationOutcome::ReportFailed { kind }
        }
    }
}
