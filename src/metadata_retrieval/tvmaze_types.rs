/// TVMaze API response types for deserialization.
///
/// These structures mirror the JSON response format from the TVMaze API.
use serde::Deserialize;

/// A single entry of the `/search/shows` response.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeSearchResult {
    pub show: TvMazeSearchShow,
}

/// The show part of a search result.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeSearchShow {
    pub id: u64,
    pub name: String,
    /// Premiere date as `YYYY-MM-DD`
    pub premiered: Option<String>,
}

/// The `/shows/{id}` response.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeShow {
    pub id: u64,
    /// The name of the TV show
    pub name: String,
    /// "Running", "Ended", "To Be Determined", "In Development"
    pub status: Option<String>,
    pub runtime: Option<u32>,
    /// Show summary in HTML format (may be null)
    pub summary: Option<String>,
    pub schedule: Option<TvMazeSchedule>,
    pub network: Option<TvMazeNetwork>,
    #[serde(rename = "webChannel")]
    pub web_channel: Option<TvMazeNetwork>,
    pub externals: Option<TvMazeExternals>,
    /// Embedded resources (like episodes) when requested with ?embed=
    #[serde(rename = "_embedded")]
    pub embedded: Option<TvMazeEmbedded>,
}

/// Regular airing slot of a show.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeSchedule {
    /// Local air time as `HH:MM`, empty if unknown
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub days: Vec<String>,
}

/// Network or web channel a show airs on.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeNetwork {
    pub country: Option<TvMazeCountry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TvMazeCountry {
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: Option<String>,
}

/// Identifiers of the show on other services.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeExternals {
    pub tvrage: Option<u64>,
    pub thetvdb: Option<u64>,
    pub imdb: Option<String>,
}

/// Embedded resources in a TVMaze show response.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeEmbedded {
    /// List of episodes when embed=episodes is used
    pub episodes: Vec<TvMazeEpisode>,
}

/// A single episode from the TVMaze API.
#[derive(Debug, Deserialize)]
pub(super) struct TvMazeEpisode {
    pub id: u64,
    /// Season number (0 for specials)
    pub season: u32,
    /// Episode number within the season (null for specials)
    pub number: Option<u32>,
    /// Episode title (may be null for episodes without a title)
    pub name: Option<String>,
    /// Air date as `YYYY-MM-DD`, empty or null if unknown
    pub airdate: Option<String>,
}
