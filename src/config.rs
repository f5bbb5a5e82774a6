use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Violation count at which submission is forced (server count is
    /// authoritative; this mirrors the server's configured threshold).
    pub violation_limit: u32,
    /// Delay between the final violation notice and the forced submission,
    /// so the notice can render before the session ends.
    pub forced_submit_delay: Duration,
    /// Window dimensions below which a resize counts as minimization.
    pub min_window_width: u32,
    pub min_window_height: u32,
    /// Directory for pre-submission session snapshots.
    pub snapshot_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            violation_limit: 2,
            forced_submit_delay: Duration::from_millis(2000),
            min_window_width: 400,
            min_window_height: 300,
            snapshot_dir: std::env::temp_dir().join("invigil-sessions"),
        }
    }
}

impl EngineConfig {
    /// Load config from environment variables, falling back to defaults on
    /// missing or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let violation_limit = std::env::var("VIOLATION_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.violation_limit);

        let forced_submit_delay = std::env::var("FORCED_SUBMIT_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.forced_submit_delay);

        let min_window_width = std::env::var("MIN_WINDOW_WIDTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_window_width);

        let min_window_height = std::env::var("MIN_WINDOW_HEIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_window_height);

        let snapshot_dir = std::env::var("SNAPSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_dir);

        tracing::info!(
            violation_limit,
            forced_submit_delay_ms = forced_submit_delay.as_millis() as u64,
            min_window_width,
            min_window_height,
            snapshot_dir = %snapshot_dir.display(),
            "Engine config loaded"
        );

        Self {
            violation_limit,
            forced_submit_delay,
            min_window_width,
            min_window_height,
            snapshot_dir,
        }
    }
}
