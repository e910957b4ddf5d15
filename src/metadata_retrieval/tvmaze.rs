/// TVMaze metadata provider implementation.
use super::selection::{Candidate, select_best_match, split_year_hint};
use super::tvmaze_types::{TvMazeEpisode, TvMazeSearchResult, TvMazeShow};
use super::{EpisodeData, FetchError, MetadataProvider, ShowData};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::error::Error as _;
use tracing::{debug, info, warn};

/// Default address of the TVMaze API
pub const TVMAZE_URL: &str = "https://api.tvmaze.com";

/// Metadata provider for the TVMaze API.
///
/// This provider searches https://api.tvmaze.com for the show key, picks the
/// best matching result and fetches it with embedded episodes.
pub struct TvMazeProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl Default for TvMazeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TvMazeProvider {
    /// Creates a new TVMaze provider instance.
    pub fn new() -> Self {
        Self::with_base_url(TVMAZE_URL)
    }

    /// Creates a provider talking to a different API address.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Performs a GET request and decodes the JSON body.
    ///
    /// Returns `Ok(None)` on a 404.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| FetchError::Request(error_chain(&e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(FetchError::Request(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json()
            .map(Some)
            .map_err(|e| FetchError::Parse(error_chain(&e)))
    }

    /// Searches for shows matching `query`.
    fn search(&self, query: &str) -> Result<Vec<Candidate>, FetchError> {
        let results: Vec<TvMazeSearchResult> = self
            .get_json("/search/shows", &[("q", query)])?
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .map(|result| Candidate {
                id: result.show.id,
                name: result.show.name,
                premiered: result.show.premiered.as_deref().and_then(parse_date),
            })
            .collect())
    }

    /// Resolves a key to a TVMaze show id, retrying without a year hint.
    fn resolve(&self, key: &str) -> Result<u64, FetchError> {
        let (base, hint) = split_year_hint(key);

        let candidates = self.search(key)?;
        if let Some(best) = select_best_match(&candidates, key, hint) {
            return Ok(best.id);
        }

        if hint.is_some() {
            info!(show = %key, "Trying {} instead..", base);
            let candidates = self.search(base)?;
            if let Some(best) = select_best_match(&candidates, key, hint) {
                return Ok(best.id);
            }
            return Err(FetchError::NotFound(base.to_string()));
        }

        Err(FetchError::NotFound(key.to_string()))
    }

    /// Converts a TVMaze episode to the provider-neutral structure.
    fn convert_episode(key: &str, tvmaze_episode: TvMazeEpisode) -> EpisodeData {
        let first_aired = tvmaze_episode
            .airdate
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    warn!(
                        show = %key,
                        season = tvmaze_episode.season,
                        episode = ?tvmaze_episode.number,
                        "Invalid air date: {}",
                        raw
                    );
                }
                parsed
            });

        EpisodeData {
            name: tvmaze_episode.name,
            first_aired,
            external_ids: BTreeMap::from([("tvmaze".to_string(), tvmaze_episode.id.to_string())]),
        }
    }

    /// Converts TVMaze show data to the provider-neutral structure.
    ///
    /// Groups episodes by season. Specials without an episode number are
    /// skipped since they cannot be addressed.
    fn convert_to_show(key: &str, tvmaze_show: TvMazeShow) -> Result<ShowData, FetchError> {
        // Extract episodes from embedded data
        let episodes = tvmaze_show
            .embedded
            .ok_or_else(|| FetchError::InvalidData("No episodes found in API response".to_string()))?
            .episodes;

        let mut seasons: BTreeMap<u32, BTreeMap<u32, EpisodeData>> = BTreeMap::new();
        for tvmaze_episode in episodes {
            let Some(number) = tvmaze_episode.number else {
                debug!(show = %key, season = tvmaze_episode.season, "Skipping unnumbered special");
                continue;
            };
            seasons
                .entry(tvmaze_episode.season)
                .or_default()
                .insert(number, Self::convert_episode(key, tvmaze_episode));
        }

        let status = tvmaze_show.status;
        let state = status.as_deref().map(str::to_uppercase);
        let active = state.as_deref() != Some("ENDED");
        let hiatus = state.as_deref() == Some("TO BE DETERMINED");

        let (air_time, air_day) = match tvmaze_show.schedule {
            Some(schedule) => (
                NaiveTime::parse_from_str(&schedule.time, "%H:%M").ok(),
                schedule.days.first().cloned(),
            ),
            None => (None, None),
        };

        let air_timezone = tvmaze_show
            .network
            .or(tvmaze_show.web_channel)
            .and_then(|network| network.country)
            .and_then(|country| country.timezone)
            .and_then(|name| name.parse::<Tz>().ok());

        let mut external_ids = BTreeMap::from([("tvmaze".to_string(), tvmaze_show.id.to_string())]);
        if let Some(externals) = tvmaze_show.externals {
            if let Some(id) = externals.thetvdb {
                external_ids.insert("tvdb".to_string(), id.to_string());
            }
            if let Some(id) = externals.tvrage {
                external_ids.insert("tvrage".to_string(), id.to_string());
            }
            if let Some(id) = externals.imdb {
                external_ids.insert("imdb".to_string(), id);
            }
        }

        Ok(ShowData {
            name: tvmaze_show.name,
            overview: tvmaze_show
                .summary
                .map(|s| nanohtml2text::html2text(&s).trim().to_string()),
            status,
            active,
            hiatus,
            runtime: tvmaze_show.runtime,
            air_day,
            air_time,
            air_timezone,
            external_ids,
            seasons,
        })
    }
}

impl MetadataProvider for TvMazeProvider {
    fn fetch(&self, key: &str) -> Result<ShowData, FetchError> {
        debug!(show = %key, "Updating {}..", key);
        let id = self.resolve(key)?;

        let tvmaze_show: TvMazeShow = self
            .get_json(&format!("/shows/{}", id), &[("embed", "episodes")])?
            .ok_or_else(|| FetchError::NotFound(key.to_string()))?;

        Self::convert_to_show(key, tvmaze_show)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Joins an error with all of its sources
///
/// reqwest hides the interesting part ("Connection reset by peer") in the
/// source chain.
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
