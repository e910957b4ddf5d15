//! Listing helpers for the command line
//!
//! Turns show records and query results into printable lines.

use crate::show::{EpisodeRecord, ShowRecord};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use std::fmt;

/// Lifecycle state of a show
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShowState {
    Active,
    Hiatus,
    Inactive,
}

impl ShowState {
    pub fn of(show: &ShowRecord) -> Self {
        if !show.active {
            ShowState::Inactive
        } else if show.hiatus {
            ShowState::Hiatus
        } else {
            ShowState::Active
        }
    }
}

impl fmt::Display for ShowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShowState::Active => "ACTIVE",
            ShowState::Hiatus => "HIATUS",
            ShowState::Inactive => "INACTIVE",
        };
        f.write_str(name)
    }
}

/// Formats episodes as one line each
///
/// When every episode airs on the same day only the time is shown,
/// otherwise the full date and how far away it is.
pub fn format_episodes(episodes: &[(String, EpisodeRecord)], now: DateTime<Utc>) -> Vec<String> {
    let mut dates = episodes.iter().map(|(_, episode)| episode.aired.map(|a| a.date_naive()));
    let omit_date = match dates.next() {
        Some(Some(first)) => dates.all(|date| date == Some(first)),
        Some(None) => false,
        None => true,
    };
    let today = now.date_naive();

    episodes
        .iter()
        .map(|(key, episode)| {
            let mut line = String::new();

            if let Some(aired) = episode.aired {
                if omit_date {
                    line.push_str(&format!("{}: ", aired.format("%H:%M")));
                } else {
                    let days = (today - aired.date_naive()).num_days();
                    let relative = match days {
                        d if d < 0 => format!("{}d", -d),
                        0 => "today".to_string(),
                        d => format!("{}d ago", d),
                    };
                    line.push_str(&format!("{} ({}): ", aired.format("%Y-%m-%d %H:%M"), relative));
                }
            }

            line.push_str(&format!("{} ({}", key.to_uppercase(), episode.id));
            if let Some(name) = episode.name.as_deref().filter(|n| !n.is_empty()) {
                line.push_str(&format!(" - {}", name));
            }
            line.push(')');
            line
        })
        .collect()
}

/// Show names grouped by state: active, then hiatus, then inactive
pub fn shows_by_state(shows: &IndexMap<String, ShowRecord>) -> Vec<(String, ShowState)> {
    let mut states: Vec<(String, ShowState)> = shows
        .iter()
        .map(|(key, show)| (key.clone(), ShowState::of(show)))
        .collect();
    states.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    states
}

/// Names of shows without any episodes, sorted
pub fn shows_missing_episodes(shows: &IndexMap<String, ShowRecord>) -> Vec<String> {
    let mut keys: Vec<String> = shows
        .iter()
        .filter(|(_, show)| show.flatten_episodes().is_empty())
        .map(|(key, _)| key.clone())
        .collect();
    keys.sort();
    keys
}

/// Whether `span` is shorter than `days`
///
/// No limit, or one too large to represent, lets everything through.
fn within(span: Duration, days: Option<i64>) -> bool {
    days.and_then(Duration::try_days)
        .is_none_or(|limit| span < limit)
}

fn selected<'a>(
    shows: &'a IndexMap<String, ShowRecord>,
    select: Option<&'a str>,
) -> Vec<(&'a String, &'a ShowRecord)> {
    match select {
        Some(key) => shows.get_key_value(key).into_iter().collect(),
        None => shows.iter().collect(),
    }
}

/// Episodes aired within `days_past` or airing within `days_ahead`
///
/// A missing limit does not restrict that direction. Episodes without an
/// air date count as long past. Sorted by air date within each show.
pub fn episodes_in_range(
    shows: &IndexMap<String, ShowRecord>,
    select: Option<&str>,
    days_past: Option<i64>,
    days_ahead: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<(String, EpisodeRecord)> {
    let in_range = |episode: &EpisodeRecord| {
        let aired = episode.aired.unwrap_or(DateTime::<Utc>::MIN_UTC);
        if aired < now {
            within(now - aired, days_past)
        } else {
            within(aired - now, days_ahead)
        }
    };

    let mut results = Vec::new();
    for (key, show) in selected(shows, select) {
        let mut episodes: Vec<&EpisodeRecord> = show
            .flatten_episodes()
            .into_iter()
            .filter(|episode| in_range(episode))
            .collect();
        episodes.sort_by_key(|episode| episode.aired);
        results.extend(episodes.into_iter().map(|episode| (key.clone(), episode.clone())));
    }
    results
}

/// The next upcoming episode of each show
///
/// Only episodes airing within `days_ahead` are considered, if given.
pub fn next_episodes(
    shows: &IndexMap<String, ShowRecord>,
    select: Option<&str>,
    days_ahead: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<(String, EpisodeRecord)> {
    selected(shows, select)
        .into_iter()
        .filter_map(|(key, show)| {
            show.flatten_episodes()
                .into_iter()
                .filter(|episode| {
                    episode
                        .aired
                        .is_some_and(|aired| aired >= now && within(aired - now, days_ahead))
                })
                .min_by_key(|episode| episode.aired)
                .map(|episode| (key.clone(), episode.clone()))
        })
        .collect()
}
