//! Refresh rate scheduling based on time of day and day of week.
//!
//! Lets the device poll often while someone is likely to look at it and
//! rarely overnight, which matters on battery.
//!
//! # Example Schedule (YAML)
//!
//! ```yaml
//! timezone: "Europe/Oslo"
//! default_refresh_rate: 300  # 5 minutes
//!
//! schedule:
//!   # Sleep hours - very infrequent updates
//!   - days: all
//!     start: "23:00"
//!     end: "06:00"
//!     refresh_rate: 1800  # 30 minutes
//!
//!   # Working day - keep the clock fresh
//!   - days: [mon, tue, wed, thu, fri]
//!     start: "07:00"
//!     end: "17:00"
//!     refresh_rate: 60
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use framed::{RefreshPolicy, RefreshSchedule};
//!
//! let schedule = RefreshSchedule::load("schedule.yaml")?;
//! let policy = RefreshPolicy::Scheduled(schedule);
//! ```

use std::path::Path;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

use crate::Error;

/// A refresh rate schedule.
///
/// Rules are evaluated in order; the first match wins.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSchedule {
    /// Timezone the rule times are written in (e.g., "Europe/Oslo")
    #[serde(deserialize_with = "deserialize_tz")]
    pub timezone: Tz,
    /// Refresh rate when no rule matches (seconds)
    pub default_refresh_rate: u32,
    /// Rules, first match wins
    #[serde(default)]
    pub schedule: Vec<ScheduleRule>,
}

/// A single schedule rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRule {
    /// Days this rule applies to
    pub days: DaySelector,
    /// Start time, inclusive (HH:MM)
    #[serde(deserialize_with = "deserialize_hhmm")]
    pub start: NaiveTime,
    /// End time, exclusive (HH:MM). Earlier than `start` means overnight.
    #[serde(deserialize_with = "deserialize_hhmm")]
    pub end: NaiveTime,
    /// Refresh rate in seconds
    pub refresh_rate: u32,
}

/// Day selector for schedule rules.
///
/// Either a group name (`all`, `weekdays`, `weekends`), a single day name,
/// or a list of day names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DaySelector {
    /// A list of days (e.g., `[mon, wed, fri]`)
    List(Vec<String>),
    /// A group or single day name
    Named(String),
}

impl RefreshSchedule {
    /// Load a schedule from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read schedule file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a schedule from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let schedule: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Invalid schedule YAML: {}", e)))?;
        for rule in &schedule.schedule {
            rule.days.validate()?;
        }
        Ok(schedule)
    }

    /// The schedule's timezone.
    pub fn tz(&self) -> Tz {
        self.timezone
    }

    /// Refresh rate for the current time in the schedule's timezone.
    pub fn get_refresh_rate(&self) -> u32 {
        self.get_refresh_rate_for_time(Utc::now().with_timezone(&self.timezone))
    }

    /// Refresh rate for a specific time.
    ///
    /// `dt` is taken at face value; convert it to [`tz`](Self::tz) first if
    /// it comes from another zone.
    pub fn get_refresh_rate_for_time<T: TimeZone>(&self, dt: DateTime<T>) -> u32 {
        let weekday = dt.weekday();
        let time = NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or_default();

        match self.schedule.iter().find(|rule| rule.matches(weekday, time)) {
            Some(rule) => {
                tracing::debug!(
                    days = ?rule.days,
                    start = %rule.start,
                    end = %rule.end,
                    refresh_rate = rule.refresh_rate,
                    "Schedule rule matched"
                );
                rule.refresh_rate
            }
            None => self.default_refresh_rate,
        }
    }
}

impl ScheduleRule {
    fn matches(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if !self.days.contains(weekday) {
            return false;
        }
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl DaySelector {
    fn contains(&self, weekday: Weekday) -> bool {
        match self {
            DaySelector::Named(name) => match name.to_lowercase().as_str() {
                "all" => true,
                "weekdays" => !matches!(weekday, Weekday::Sat | Weekday::Sun),
                "weekends" => matches!(weekday, Weekday::Sat | Weekday::Sun),
                _ => weekday_from_str(name) == Some(weekday),
            },
            DaySelector::List(days) => days.iter().any(|d| weekday_from_str(d) == Some(weekday)),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let names: Vec<&str> = match self {
            DaySelector::Named(name) => match name.to_lowercase().as_str() {
                "all" | "weekdays" | "weekends" => return Ok(()),
                _ => vec![name.as_str()],
            },
            DaySelector::List(days) => days.iter().map(String::as_str).collect(),
        };
        match names.into_iter().find(|d| weekday_from_str(d).is_none()) {
            Some(bad) => Err(Error::Config(format!("Unknown day '{}' in schedule", bad))),
            None => Ok(()),
        }
    }
}

fn deserialize_tz<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|_| serde::de::Error::custom(format!("unknown timezone '{}'", name)))
}

fn deserialize_hhmm<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_time(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", text)))
}

/// Parse `HH:MM` (24-hour).
fn parse_time(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.trim().split_once(':')?;
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

fn weekday_from_str(s: &str) -> Option<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
