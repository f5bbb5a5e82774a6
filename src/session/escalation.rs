//! Escalation of confirmed violations into warnings or forced submission.
//!
//! The counter that drives escalation is the one the server returned for the
//! report, persisted across reloads server-side. A purely local counter
//! would reset on reload and let a participant warn-cycle forever.

use std::sync::Arc;

use crate::types::ViolationKind;

use super::submit::CommitTrigger;
use super::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Dismissible warning naming the violation.
    Warn,
    /// Non-dismissible notice followed by forced submission.
    Force,
}

/// Decide what a confirmed violation count amounts to. The server can also
/// demand submission directly regardless of the local threshold.
pub fn escalate(count: u32, server_force: bool, limit: u32) -> Escalation {
    if server_force || count >= limit {
        Escalation::Force
    } else {
        Escalation::Warn
    }
}

/// Schedule the forced submission after the configured delay, giving the
/// non-dismissible notice time to render. The commit guard makes a second
/// schedule, or a race with the clock or a manual submit, a no-op.
pub fn schedule_forced_submit(session: Arc<Session>, kind: ViolationKind) {
    let delay = session.config.forced_submit_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = session.submit(CommitTrigger::Violation(kind)).await;
    });
}
