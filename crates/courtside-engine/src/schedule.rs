//! Date and time arithmetic for the booking target, plus the labels the
//! booking site shows for them.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Source of "today" for the booking site.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Today in the site's IANA time zone.
pub struct SiteClock {
    tz: Tz,
}

impl SiteClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SiteClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// A clock pinned to one day.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// `today + days_ahead`, calendar-aware. `None` only past chrono's range.
pub fn target_date(today: NaiveDate, days_ahead: u32) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(u64::from(days_ahead)))
}

pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Day tab label as the grid shows it, e.g. `Mon 5th`.
pub fn day_tab_label(date: NaiveDate) -> String {
    format!(
        "{} {}{}",
        date.format("%a"),
        date.day(),
        ordinal_suffix(date.day())
    )
}

/// Every textual form of the target date the page may display.
#[derive(Debug, Clone)]
pub struct DateLabels {
    pub date: NaiveDate,
    pub iso: String,
    pub day_tab: String,
    pub long: String,
}

impl DateLabels {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            iso: date.format("%Y-%m-%d").to_string(),
            day_tab: day_tab_label(date),
            long: date.format("%B %-d, %Y").to_string(),
        }
    }

    /// Forms accepted when reading back the selected date.
    fn accepted(&self) -> Vec<String> {
        vec![
            self.iso.clone(),
            self.day_tab.clone(),
            self.long.clone(),
            self.date.format("%a %-d %b").to_string(),
            self.date.format("%-d %B %Y").to_string(),
            self.date.format("%b %-d").to_string(),
            self.date.format("%d/%m/%Y").to_string(),
            self.date.format("%m/%d/%Y").to_string(),
        ]
    }

    /// True when the text names this date in one of the known forms.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.accepted()
            .iter()
            .any(|form| contains_token(&text, &form.to_lowercase()))
    }
}

/// Substring match that does not run into neighbouring digits
/// ("feb 1" must not match "feb 15").
fn contains_token(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

#[derive(Debug, Error)]
#[error("unrecognized time '{0}' (expected HH:MM or h:mm am/pm)")]
pub struct TimeParseError(String);

/// Slot start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    fn twelve_hour(&self) -> (u32, &'static str) {
        let (pm, hour) = self.0.hour12();
        (hour, if pm { "pm" } else { "am" })
    }

    /// Label as the grid renders it, e.g. `6:00 pm`.
    pub fn label(&self) -> String {
        let (hour, meridiem) = self.twelve_hour();
        format!("{}:{:02} {}", hour, self.0.minute(), meridiem)
    }

    /// `18:00`.
    pub fn as_24h(&self) -> String {
        self.0.format("%H:%M").to_string()
    }

    /// Textual variants in the order they are tried.
    pub fn variants(&self) -> Vec<String> {
        let (hour, meridiem) = self.twelve_hour();
        let minute = self.0.minute();
        let mut out = vec![
            self.label(),
            format!("{hour}:{minute:02}{meridiem}"),
            format!("{hour}:{minute:02} {}", meridiem.to_uppercase()),
        ];
        if minute == 0 {
            out.push(format!("{hour} {meridiem}"));
            out.push(format!("{hour}{meridiem}"));
        }
        out.push(self.as_24h());
        if minute == 0 {
            out.push(self.0.hour().to_string());
        }
        out
    }
}

impl FromStr for SlotTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();
        for (input, fmt) in [
            (trimmed, "%H:%M"),
            (upper.as_str(), "%I:%M %p"),
            (upper.as_str(), "%I:%M%p"),
        ] {
            if let Ok(t) = NaiveTime::parse_from_str(input, fmt) {
                return Ok(SlotTime(t));
            }
        }
        for suffix in ["AM", "PM"] {
            if let Some(hour) = upper.strip_suffix(suffix)
                && let Ok(h) = hour.trim().parse::<u32>()
                && (1..=12).contains(&h)
            {
                let h24 = (h % 12) + if suffix == "PM" { 12 } else { 0 };
                if let Some(t) = SlotTime::new(h24, 0) {
                    return Ok(t);
                }
            }
        }
        Err(TimeParseError(s.to_string()))
    }
}

impl TryFrom<String> for SlotTime {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.as_24h()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Labels a duration option may carry, most specific first
/// (`120` gives `2.0 hr`, `2 hr`, `2hr`, `2 hour`, `2 hours`, `120 min`).
pub fn duration_labels(minutes: u32) -> Vec<String> {
    let mut out = Vec::new();
    if minutes % 30 == 0 {
        let hours = f64::from(minutes) / 60.0;
        out.push(format!("{hours:.1} hr"));
        if minutes % 60 == 0 {
            let whole = minutes / 60;
            out.push(format!("{whole} hr"));
            out.push(format!("{whole}hr"));
            out.push(format!("{whole} hour"));
            if whole > 1 {
                out.push(format!("{whole} hours"));
            }
        } else {
            out.push(format!("{hours} hrs"));
        }
    }
    out.push(format!("{minutes} min"));
    out.push(format!("{minutes} mins"));
    out
}
