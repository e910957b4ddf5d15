//! Date window queries
//!
//! Answers "which episodes air between these two days" for a single show.

use crate::show::{EpisodeRecord, ShowRecord};
use crate::staleness::whole_days;
use chrono::{Duration, NaiveDate};

/// One end of a query window
///
/// Relative bounds count away from today: the lower bound into the past,
/// the upper bound into the future.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayBound {
    /// Number of days from today
    Days(i64),
    /// A fixed calendar date
    Date(NaiveDate),
    /// A duration from today, truncated to whole days
    Span(Duration),
}

impl From<i64> for DayBound {
    fn from(days: i64) -> Self {
        DayBound::Days(days)
    }
}

impl From<NaiveDate> for DayBound {
    fn from(date: NaiveDate) -> Self {
        DayBound::Date(date)
    }
}

impl From<Duration> for DayBound {
    fn from(span: Duration) -> Self {
        DayBound::Span(span)
    }
}

impl DayBound {
    /// Absolute date of this bound, counting `direction` (+1/-1) days away from today
    fn resolve(self, today: NaiveDate, direction: i64) -> NaiveDate {
        match self {
            DayBound::Date(date) => date,
            DayBound::Days(days) => offset(today, days.saturating_mul(direction)),
            DayBound::Span(span) => offset(today, whole_days(span).saturating_mul(direction)),
        }
    }
}

/// An inclusive range of UTC calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Turns two bounds into absolute dates around `today`
    ///
    /// Missing bounds mean today. Bounds given in the wrong order are
    /// swapped.
    pub fn resolve(min: Option<DayBound>, max: Option<DayBound>, today: NaiveDate) -> Self {
        let start = min.unwrap_or(DayBound::Days(0)).resolve(today, -1);
        let end = max.unwrap_or(DayBound::Days(0)).resolve(today, 1);

        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn offset(today: NaiveDate, days: i64) -> NaiveDate {
    let shifted = Duration::try_days(days).and_then(|delta| today.checked_add_signed(delta));
    match shifted {
        Some(date) => date,
        None if days < 0 => NaiveDate::MIN,
        None => NaiveDate::MAX,
    }
}

/// Episodes of `show` airing within `window`, newest first
///
/// Episodes without an air date are skipped. The records are copies, so
/// the caller cannot change the store through them.
pub fn episodes_in_window(key: &str, show: &ShowRecord, window: DateWindow) -> Vec<(String, EpisodeRecord)> {
    show.flatten_episodes()
        .into_iter()
        .rev()
        .filter(|episode| {
            episode
                .aired
                .is_some_and(|aired| window.contains(aired.date_naive()))
        })
        .map(|episode| (key.to_string(), episode.clone()))
        .collect()
}
