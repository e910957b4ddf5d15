//! Show and episode records
//!
//! These are the shapes kept in the show store and written to the cache
//! file. Provider data is merged into them via [`ShowRecord::apply`].

use crate::metadata_retrieval::ShowData;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Episodes of a show, keyed by season number and then episode number
pub type Episodes = BTreeMap<u32, BTreeMap<u32, EpisodeRecord>>;

/// A single episode as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Display identifier in the form `SSxEE`
    pub id: String,
    /// Episode title, if announced
    #[serde(default)]
    pub name: Option<String>,
    /// First air instant in UTC, if known
    #[serde(default, deserialize_with = "deserialize_aired")]
    pub aired: Option<DateTime<Utc>>,
    /// Provider specific identifiers (e.g. `tvmaze`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
}

/// Everything known about a tracked show
///
/// Every field has a default so partially initialised records (for example
/// a show that was just added by name) deserialize and evaluate cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    /// Whether the show is still producing episodes
    #[serde(default = "default_active")]
    pub active: bool,
    /// Show is between seasons but has not ended
    #[serde(default)]
    pub hiatus: bool,
    /// Timezone new episode air times are interpreted in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_timezone: Option<Tz>,
    /// Last time a refresh attempt completed
    #[serde(default)]
    pub accessed: Option<DateTime<Utc>>,
    /// Consecutive failed refreshes since the last success
    #[serde(default)]
    pub errors: u32,
    #[serde(default)]
    pub episodes: Episodes,

    /// Canonical name reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Upper-cased provider status (e.g. `RUNNING`, `ENDED`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Runtime in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_day: Option<String>,
    /// Local air time, if the provider knows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
}

fn default_active() -> bool {
    true
}

impl Default for ShowRecord {
    fn default() -> Self {
        Self {
            active: true,
            hiatus: false,
            air_timezone: None,
            accessed: None,
            errors: 0,
            episodes: Episodes::new(),
            name: None,
            overview: None,
            status: None,
            runtime: None,
            air_day: None,
            air_time: None,
            external_ids: BTreeMap::new(),
        }
    }
}

impl ShowRecord {
    /// Returns all episodes as a flat list
    ///
    /// Ordered by season, then episode number. Callers wanting the newest
    /// episodes first iterate the result in reverse.
    pub fn flatten_episodes(&self) -> Vec<&EpisodeRecord> {
        self.episodes
            .values()
            .flat_map(|season| season.values())
            .collect()
    }

    /// Merges freshly fetched provider data into this record
    ///
    /// Provider fields are overwritten and the episode list is replaced in
    /// full. An explicitly configured air timezone is kept; otherwise the
    /// provider's network timezone is used, falling back to `default_timezone`.
    /// Marks the record as successfully refreshed at `now`.
    pub fn apply(&mut self, data: ShowData, default_timezone: Tz, now: DateTime<Utc>) {
        let ShowData {
            name,
            overview,
            status,
            active,
            hiatus,
            runtime,
            air_day,
            air_time,
            air_timezone,
            external_ids,
            seasons,
        } = data;

        let timezone =
            *self
                .air_timezone
                .get_or_insert(air_timezone.unwrap_or(default_timezone));

        self.episodes = seasons
            .into_iter()
            .map(|(season, episodes)| {
                let episodes = episodes
                    .into_iter()
                    .map(|(number, episode)| {
                        let record = EpisodeRecord {
                            id: episode_id(season, number),
                            name: episode.name,
                            aired: episode
                                .first_aired
                                .map(|date| air_instant(date, air_time, timezone)),
                            external_ids: episode.external_ids,
                        };
                        (number, record)
                    })
                    .collect();
                (season, episodes)
            })
            .collect();

        self.name = Some(name);
        self.overview = overview;
        self.status = status.map(|s| s.to_uppercase());
        self.active = active;
        self.hiatus = hiatus;
        self.runtime = runtime;
        self.air_day = air_day;
        self.air_time = air_time;
        self.external_ids = external_ids;
        self.accessed = Some(now);
        self.errors = 0;
    }
}

/// Formats the display identifier of an episode, e.g. `01x02`
pub fn episode_id(season: u32, episode: u32) -> String {
    format!("{:02}x{:02}", season, episode)
}

/// Air time used when the provider has none: last second of the day
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Combines an air date with the show's air time and converts it to UTC
///
/// Without an air time the last second of the day is used, so the result
/// is an upper bound. Ambiguous local times (DST fall-back) resolve to the
/// earlier instant, non-existent ones (DST spring-forward) are moved one
/// hour ahead.
pub fn air_instant(date: NaiveDate, air_time: Option<NaiveTime>, timezone: Tz) -> DateTime<Utc> {
    let local = date.and_time(air_time.unwrap_or_else(end_of_day));

    let zoned = match timezone.from_local_datetime(&local) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => timezone
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| timezone.from_utc_datetime(&local)),
    };

    zoned.with_timezone(&Utc)
}

/// Accepts RFC 3339 timestamps as well as naive ones
///
/// A naive timestamp should never be produced by a provider; if one shows
/// up in the cache it is taken as UTC.
fn deserialize_aired<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(instant) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, format) {
            warn!(aired = %raw, "Unset timezone on air date, assuming UTC");
            return Ok(Some(Utc.from_utc_datetime(&naive)));
        }
    }

    Err(serde::de::Error::custom(format!(
        "invalid air date '{}'",
        raw
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_retrieval::EpisodeData;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn show_data() -> ShowData {
        let mut season = BTreeMap::new();
        season.insert(
            1,
            EpisodeData {
                name: Some("Pilot".to_string()),
                first_aired: Some(date(2024, 7, 1)),
                external_ids: BTreeMap::new(),
            },
        );
        season.insert(
            2,
            EpisodeData {
                name: None,
                first_aired: None,
                external_ids: BTreeMap::new(),
            },
        );
        let mut seasons = BTreeMap::new();
        seasons.insert(1, season);

        ShowData {
            name: "Some Show".to_string(),
            overview: Some("Things happen.".to_string()),
            status: Some("Running".to_string()),
            active: true,
            hiatus: false,
            runtime: Some(45),
            air_day: Some("Monday".to_string()),
            air_time: NaiveTime::from_hms_opt(21, 0, 0),
            air_timezone: Some(chrono_tz::America::New_York),
            external_ids: BTreeMap::new(),
            seasons,
        }
    }

    #[test]
    fn test_episode_id() {
        assert_eq!(episode_id(1, 2), "01x02");
        assert_eq!(episode_id(0, 0), "00x00");
        assert_eq!(episode_id(12, 105), "12x105");
    }

    #[test]
    fn test_air_instant_localizes_in_show_timezone() {
        let instant = air_instant(
            date(2024, 7, 1),
            NaiveTime::from_hms_opt(20, 0, 0),
            chrono_tz::US::Pacific,
        );
        // PDT is UTC-7
        assert_eq!(instant.to_rfc3339(), "2024-07-02T03:00:00+00:00");
    }

    #[test]
    fn test_air_instant_without_time_uses_end_of_day() {
        let instant = air_instant(date(2024, 1, 15), None, chrono_tz::UTC);
        assert_eq!(instant.to_rfc3339(), "2024-01-15T23:59:59+00:00");
    }

    #[test]
    fn test_air_instant_in_dst_gap_moves_forward() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let instant = air_instant(
            date(2024, 3, 31),
            NaiveTime::from_hms_opt(2, 30, 0),
            chrono_tz::Europe::Berlin,
        );
        assert_eq!(instant.to_rfc3339(), "2024-03-31T01:30:00+00:00");
    }

    #[test]
    fn test_apply_replaces_episodes_and_resets_errors() {
        let now = Utc::now();
        let mut show = ShowRecord {
            errors: 2,
            ..ShowRecord::default()
        };
        show.episodes
            .entry(9)
            .or_default()
            .insert(9, EpisodeRecord {
                id: episode_id(9, 9),
                name: None,
                aired: None,
                external_ids: BTreeMap::new(),
            });

        show.apply(show_data(), chrono_tz::US::Pacific, now);

        assert_eq!(show.errors, 0);
        assert_eq!(show.accessed, Some(now));
        assert_eq!(show.status.as_deref(), Some("RUNNING"));
        assert_eq!(show.air_timezone, Some(chrono_tz::America::New_York));
        assert!(!show.episodes.contains_key(&9));

        let episodes = show.flatten_episodes();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "01x01");
        // 21:00 EDT is 01:00 UTC the next day
        assert_eq!(
            episodes[0].aired.map(|a| a.to_rfc3339()),
            Some("2024-07-02T01:00:00+00:00".to_string())
        );
        assert_eq!(episodes[1].id, "01x02");
        assert_eq!(episodes[1].aired, None);
    }

    #[test]
    fn test_apply_keeps_configured_timezone() {
        let mut show = ShowRecord {
            air_timezone: Some(chrono_tz::Europe::London),
            ..ShowRecord::default()
        };
        show.apply(show_data(), chrono_tz::US::Pacific, Utc::now());
        assert_eq!(show.air_timezone, Some(chrono_tz::Europe::London));
    }

    #[test]
    fn test_partial_record_gets_defaults() {
        let show: ShowRecord = serde_json::from_str("{}").unwrap();
        assert!(show.active);
        assert!(!show.hiatus);
        assert_eq!(show.errors, 0);
        assert!(show.accessed.is_none());
        assert!(show.episodes.is_empty());
    }

    #[test]
    fn test_naive_aired_is_read_as_utc() {
        let episode: EpisodeRecord =
            serde_json::from_str(r#"{"id": "01x01", "aired": "2020-05-11T20:00:00"}"#).unwrap();
        assert_eq!(
            episode.aired.map(|a| a.to_rfc3339()),
            Some("2020-05-11T20:00:00+00:00".to_string())
        );

        let episode: EpisodeRecord =
            serde_json::from_str(r#"{"id": "01x01", "aired": null}"#).unwrap();
        assert_eq!(episode.aired, None);
    }
}
