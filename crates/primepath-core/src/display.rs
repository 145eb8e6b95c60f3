//! Display formatting and the injected display sink.
//!
//! The engine never touches a rendering surface directly; callers inject a
//! [`DisplaySink`] and the engine pushes pre-formatted time strings plus a
//! color class keyed to remaining time. Skipping the sink entirely is valid.

use serde::{Deserialize, Serialize};

/// Output surface for the countdown. Implementations render however they
/// like (terminal line, DOM element, test buffer).
pub trait DisplaySink {
    fn render(&mut self, formatted: &str, color: ColorClass);
}

/// Urgency class keyed to remaining time. Cosmetic, but deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    Normal,
    /// Five minutes or less remaining.
    Notice,
    /// One minute or less remaining.
    Warning,
    /// Thirty seconds or less remaining.
    Critical,
}

impl ColorClass {
    pub fn for_remaining(remaining_secs: u64) -> Self {
        match remaining_secs {
            0..=30 => ColorClass::Critical,
            31..=60 => ColorClass::Warning,
            61..=300 => ColorClass::Notice,
            _ => ColorClass::Normal,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            ColorClass::Normal => "timer-normal",
            ColorClass::Notice => "timer-notice",
            ColorClass::Warning => "timer-warning",
            ColorClass::Critical => "timer-critical",
        }
    }
}

/// Format seconds as `H:MM:SS` when hours are present (or forced via
/// `show_hours`), otherwise `M:SS`. No leading zero on the leading unit,
/// always two digits on the trailing ones.
pub fn format_time(total_secs: u64, show_hours: bool) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if show_hours || hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_minutes_seconds() {
        assert_eq!(format_time(125, false), "2:05");
        assert_eq!(format_time(0, false), "0:00");
        assert_eq!(format_time(59, false), "0:59");
        assert_eq!(format_time(600, false), "10:00");
    }

    #[test]
    fn format_with_hours() {
        assert_eq!(format_time(3661, true), "1:01:01");
        assert_eq!(format_time(3661, false), "1:01:01");
        assert_eq!(format_time(125, true), "0:02:05");
        assert_eq!(format_time(36000, false), "10:00:00");
    }

    #[test]
    fn color_class_thresholds() {
        assert_eq!(ColorClass::for_remaining(0), ColorClass::Critical);
        assert_eq!(ColorClass::for_remaining(30), ColorClass::Critical);
        assert_eq!(ColorClass::for_remaining(31), ColorClass::Warning);
        assert_eq!(ColorClass::for_remaining(60), ColorClass::Warning);
        assert_eq!(ColorClass::for_remaining(61), ColorClass::Notice);
        assert_eq!(ColorClass::for_remaining(300), ColorClass::Notice);
        assert_eq!(ColorClass::for_remaining(301), ColorClass::Normal);
    }
}
