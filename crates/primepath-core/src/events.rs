use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::display::ColorClass;

/// Every state change in the engine produces an Event.
/// Listeners are dispatched synchronously, in subscription order, within
/// the same tick that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Started {
        remaining_secs: u64,
        total_secs: u64,
        /// True when the countdown was recovered from a persisted snapshot
        /// rather than starting at the full duration.
        restored: bool,
        at: DateTime<Utc>,
    },
    Paused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Resumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Tick {
        remaining_secs: u64,
        elapsed_secs: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
    Warning {
        remaining_secs: u64,
        message: String,
        severity: ColorClass,
        at: DateTime<Utc>,
    },
    TimeAdded {
        added_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Reset {
        total_secs: u64,
        at: DateTime<Utc>,
    },
    Stopped {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// An already-expired countdown was started; expiry fires after the
    /// grace delay so the user sees the "time expired" indication first.
    ExpiryPending {
        grace_delay_secs: u64,
        at: DateTime<Utc>,
    },
    Expired {
        total_secs: u64,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable kind tag, useful for log lines and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Started { .. } => "started",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Tick { .. } => "tick",
            Event::Warning { .. } => "warning",
            Event::TimeAdded { .. } => "time_added",
            Event::Reset { .. } => "reset",
            Event::Stopped { .. } => "stopped",
            Event::ExpiryPending { .. } => "expiry_pending",
            Event::Expired { .. } => "expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = Event::Expired {
            total_secs: 3600,
            elapsed_secs: 3600,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "Expired");
        assert_eq!(json["total_secs"], 3600);
    }

    #[test]
    fn kind_matches_variant() {
        let ev = Event::Reset {
            total_secs: 60,
            at: Utc::now(),
        };
        assert_eq!(ev.kind(), "reset");
    }
}
