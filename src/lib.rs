//! Sallie - Keep track of the TV shows you watch
//!
//! This library tracks a set of TV shows, refreshes their episode lists from
//! an online metadata service when they become stale, and answers which
//! episodes air within a given date window.

mod listing;
mod metadata_retrieval;
mod query;
mod settings;
mod show;
mod staleness;
mod store;
mod temp;
mod tracker;

// Re-export error types
pub use metadata_retrieval::FetchError;
pub use settings::SettingsError;
pub use store::StoreError;

pub use listing::{
    ShowState, episodes_in_range, format_episodes, next_episodes, shows_by_state,
    shows_missing_episodes,
};
pub use metadata_retrieval::{
    Candidate, EpisodeData, MetadataProvider, ShowData, TVMAZE_URL, TvMazeProvider,
    select_best_match, similarity_ratio, split_year_hint,
};
pub use query::{DateWindow, DayBound, episodes_in_window};
pub use settings::{Settings, parse_timezone};
pub use show::{EpisodeRecord, Episodes, ShowRecord, air_instant, episode_id};
pub use staleness::{ERROR_THRESHOLD, RefreshPolicy, should_update};
pub use store::{ShowName, ShowStore, load_show_names};
pub use tracker::{CheckResult, Tracker};

use thiserror::Error;

/// Top-level error type for Sallie
#[derive(Debug, Error)]
pub enum SallieError {
    /// Error in the settings file
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Error reading or writing the show store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
