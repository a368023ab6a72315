//! Per-session debug logger.
//!
//! Built from the `debug` init flag. Logs event names and state transitions
//! under the `pvault::sandbox` / `pvault::host` targets; never field values.

/// A gate in front of `tracing::debug!` scoped to one session side.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    side: &'static str,
    enabled: bool,
}

impl Logger {
    /// Logger for the given side, gated by the `debug` flag.
    pub fn new(side: &'static str, debug: bool) -> Self {
        Self {
            side,
            enabled: debug,
        }
    }

    /// Logger that emits nothing.
    pub fn disabled(side: &'static str) -> Self {
        Self::new(side, false)
    }

    /// Emit a protocol trace when `debug` was set.
    pub fn log(&self, message: &str) {
        if !self.enabled {
            return;
        }
        match self.side {
            "host" => tracing::debug!(target: "pvault::host", "{message}"),
            _ => tracing::debug!(target: "pvault::sandbox", side = self.side, "{message}"),
        }
    }
}
