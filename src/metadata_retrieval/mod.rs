/// Data structures and traits for TV show metadata retrieval.
///
/// This module provides the provider-neutral shapes a metadata source hands
/// back to the tracker, the error taxonomy the refresh loop reacts to, and
/// the trait for implementing metadata providers.
mod selection;
mod tvmaze;
mod tvmaze_types;

pub use selection::{Candidate, select_best_match, similarity_ratio, split_year_hint};
pub use tvmaze::{TVMAZE_URL, TvMazeProvider};

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider could not resolve the show key
    #[error("Show not found: {0}")]
    NotFound(String),

    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Failed to parse the provider's JSON response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// The API returned invalid or unexpected data
    #[error("API returned invalid data: {0}")]
    InvalidData(String),
}

impl FetchError {
    /// Whether this failure is worth waiting out before retrying
    ///
    /// Covers dropped connections ("connection reset by peer") and
    /// provider rate limiting.
    pub fn is_connection_reset(&self) -> bool {
        match self {
            FetchError::Request(message) => {
                let message = message.to_lowercase();
                message.contains("connection reset") || message.contains("http 429")
            }
            _ => false,
        }
    }
}

/// A single episode as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeData {
    /// The episode title, if announced
    pub name: Option<String>,
    /// Calendar date of the first airing, if known and valid
    pub first_aired: Option<NaiveDate>,
    /// Provider specific identifiers
    pub external_ids: BTreeMap<String, String>,
}

/// A complete show as reported by a provider.
///
/// Air dates are calendar dates; combining them with `air_time` in the
/// show's timezone happens when the data is merged into a
/// [`ShowRecord`](crate::ShowRecord).
#[derive(Debug, Clone, PartialEq)]
pub struct ShowData {
    /// The canonical name of the show
    pub name: String,
    pub overview: Option<String>,
    /// Provider status string (e.g. "Running", "Ended")
    pub status: Option<String>,
    /// Whether the show still produces episodes
    pub active: bool,
    /// Whether the show is paused between seasons
    pub hiatus: bool,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    pub air_day: Option<String>,
    /// Local time of day new episodes air at
    pub air_time: Option<NaiveTime>,
    /// Timezone of the airing network, if the provider knows it
    pub air_timezone: Option<Tz>,
    pub external_ids: BTreeMap<String, String>,
    /// Episodes keyed by season number, then episode number
    pub seasons: BTreeMap<u32, BTreeMap<u32, EpisodeData>>,
}

/// Trait for metadata providers that can fetch TV show information.
///
/// Implementors of this trait can retrieve episode metadata from various sources
/// such as TVMaze, TVDB or TMDB.
pub trait MetadataProvider {
    /// Fetches metadata for a show.
    ///
    /// # Arguments
    ///
    /// * `key` - The show key, optionally suffixed with a year hint like `(2004)`
    ///
    /// # Returns
    ///
    /// The show with all of its episodes, `FetchError::NotFound` if the key
    /// cannot be resolved, or another `FetchError` on failure
    fn fetch(&self, key: &str) -> Result<ShowData, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_reset_classification() {
        assert!(
            FetchError::Request("error sending request: Connection reset by peer (os error 104)".into())
                .is_connection_reset()
        );
        assert!(FetchError::Request("HTTP 429 Too Many Requests".into()).is_connection_reset());
        assert!(!FetchError::Request("HTTP 500 Internal Server Error".into()).is_connection_reset());
        assert!(!FetchError::Parse("connection reset".into()).is_connection_reset());
        assert!(!FetchError::NotFound("Lost".into()).is_connection_reset());
    }
}
