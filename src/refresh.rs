//! How long the device should sleep before polling again.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Timelike};

use crate::Error;

#[cfg(feature = "schedule")]
use crate::schedule::RefreshSchedule;

/// Strategy for the `refresh_rate` hint in display responses.
#[derive(Debug, Clone)]
pub enum RefreshPolicy {
    /// Always the same number of seconds
    Fixed(u32),

    /// Wake just after the next minute boundary, but never sooner than
    /// `floor` seconds. Only the poll is aligned; the device fetches a new
    /// image only when the filename changes, which happens on text updates
    MinuteAligned {
        /// Shortest interval ever suggested
        floor: u32,
    },

    /// Time-of-day rules loaded from YAML
    #[cfg(feature = "schedule")]
    Scheduled(RefreshSchedule),
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy::MinuteAligned { floor: 10 }
    }
}

impl RefreshPolicy {
    /// Refresh rate for a poll arriving now.
    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate_at(Local::now())
    }

    /// Refresh rate for a poll arriving at `now`.
    pub fn refresh_rate_at<T: TimeZone>(&self, now: DateTime<T>) -> u32 {
        match self {
            RefreshPolicy::Fixed(seconds) => *seconds,
            RefreshPolicy::MinuteAligned { floor } => (60 - now.second().min(59)).max(*floor),
            #[cfg(feature = "schedule")]
            RefreshPolicy::Scheduled(schedule) => {
                schedule.get_refresh_rate_for_time(now.with_timezone(&schedule.tz()))
            }
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshPolicy::Fixed(seconds) => write!(f, "fixed:{}", seconds),
            RefreshPolicy::MinuteAligned { floor } => write!(f, "minute:{}", floor),
            #[cfg(feature = "schedule")]
            RefreshPolicy::Scheduled(schedule) => {
                write!(f, "scheduled ({} rules)", schedule.schedule.len())
            }
        }
    }
}

/// Parses `fixed:<secs>`, `minute` or `minute:<floor>`.
impl FromStr for RefreshPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let seconds = |arg: &str| {
            arg.trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| Error::Config(format!("Invalid refresh seconds '{}'", arg)))
        };

        match (kind.trim().to_lowercase().as_str(), arg) {
            ("fixed", Some(arg)) => Ok(RefreshPolicy::Fixed(seconds(arg)?)),
            ("minute", None) => Ok(RefreshPolicy::default()),
            ("minute", Some(arg)) => Ok(RefreshPolicy::MinuteAligned {
                floor: seconds(arg)?,
            }),
            _ => Err(Error::Config(format!(
                "Unknown refresh policy '{}' (expected fixed:<secs> or minute[:<floor>])",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, second).unwrap()
    }

    #[test]
    fn test_fixed() {
        let policy = RefreshPolicy::Fixed(300);
        assert_eq!(policy.refresh_rate_at(at(0)), 300);
        assert_eq!(policy.refresh_rate_at(at(59)), 300);
    }

    #[test]
    fn test_minute_aligned() {
        let policy = RefreshPolicy::default();
        assert_eq!(policy.refresh_rate_at(at(0)), 60);
        assert_eq!(policy.refresh_rate_at(at(15)), 45);
        assert_eq!(policy.refresh_rate_at(at(50)), 10);
        assert_eq!(policy.refresh_rate_at(at(58)), 10);
    }

    #[test]
    fn test_parse() {
        assert!(matches!("fixed:120".parse::<RefreshPolicy>(), Ok(RefreshPolicy::Fixed(120))));
        assert!(matches!(
            "minute".parse::<RefreshPolicy>(),
            Ok(RefreshPolicy::MinuteAligned { floor: 10 })
        ));
        assert!(matches!(
            "minute:5".parse::<RefreshPolicy>(),
            Ok(RefreshPolicy::MinuteAligned { floor: 5 })
        ));
        assert!("fixed".parse::<RefreshPolicy>().is_err());
        assert!("fixed:0".parse::<RefreshPolicy>().is_err());
        assert!("hourly".parse::<RefreshPolicy>().is_err());
    }

    #[cfg(feature = "schedule")]
    #[test]
    fn test_scheduled() {
        let schedule = RefreshSchedule::from_yaml(
            r#"
timezone: "UTC"
default_refresh_rate: 300
schedule:
  - days: all
    start: "12:00"
    end: "13:00"
    refresh_rate: 30
"#,
        )
        .unwrap();
        let policy = RefreshPolicy::Scheduled(schedule);
        assert_eq!(policy.refresh_rate_at(at(0)), 30);
        assert_eq!(
            policy.refresh_rate_at(Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()),
            300
        );
    }
}
