//! Countdown driven by the authoritative contest end time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::protocol::ServerMessage;

use super::submit::CommitTrigger;
use super::Session;

/// Clock lifecycle, derived from the contest window rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    Pending,
    Running,
    Expired,
}

impl Session {
    pub fn clock_phase(&self) -> ClockPhase {
        let now = Utc::now();
        if now < self.contest.start_time {
            ClockPhase::Pending
        } else if now < self.contest.end_time {
            ClockPhase::Running
        } else {
            ClockPhase::Expired
        }
    }

    /// Whole seconds until the authoritative end time, clamped at zero.
    pub fn remaining_seconds(&self) -> u64 {
        (self.contest.end_time - Utc::now()).num_seconds().max(0) as u64
    }
}

/// Spawn the one-second countdown task for a session.
///
/// Publishes remaining time on every tick and fires the expiry submission
/// exactly once. The task exits as soon as the session closes, so a tick
/// racing a submission is a no-op — the commit guard absorbs the rest.
pub fn spawn_countdown(session: Arc<Session>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if session.is_closed().await {
                break;
            }

            let remaining = session.remaining_seconds();
            let _ = session.events.send(ServerMessage::Tick {
                remaining_seconds: remaining,
            });

            if remaining == 0 {
                tracing::info!(
                    participation_id = %session.participation.id,
                    "Countdown expired, auto-submitting"
                );
                let _ = session.submit(CommitTrigger::Expiry).await;
                break;
            }
        }
    })
}
