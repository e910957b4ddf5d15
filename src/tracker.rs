//! Show tracker
//!
//! Ties the pieces together: decides which shows are stale, refreshes them
//! from a metadata provider with retries and backoff, persists the store
//! and answers date window queries.
//!
//! A single mutex guards the store. Every public operation holds it for
//! its whole duration, so a batch check refreshes and queries without
//! another caller observing a half-updated record in between.

use crate::metadata_retrieval::{FetchError, MetadataProvider};
use crate::query::{DateWindow, DayBound, episodes_in_window};
use crate::settings::{Settings, parse_timezone};
use crate::show::{EpisodeRecord, ShowRecord};
use crate::staleness::{RefreshPolicy, should_update};
use crate::store::{ShowStore, load_show_names};
use crate::SallieError;
use chrono::Utc;
use chrono_tz::Tz;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// Episodes matched by a query, paired with their show key
pub type CheckResult = Vec<(String, EpisodeRecord)>;

/// Keeps track of a set of shows and their episodes
pub struct Tracker<P> {
    provider: P,
    policy: RefreshPolicy,
    default_timezone: Tz,
    cache_file: PathBuf,
    store: Mutex<ShowStore>,
}

impl<P> Tracker<P>
where
    P: MetadataProvider,
{
    /// Creates a tracker with an empty store
    pub fn new(provider: P, policy: RefreshPolicy, default_timezone: Tz, cache_file: PathBuf) -> Self {
        Self {
            provider,
            policy,
            default_timezone,
            cache_file,
            store: Mutex::new(ShowStore::new()),
        }
    }

    /// Replaces the in-memory store
    pub fn with_store(self, store: ShowStore) -> Self {
        Self {
            store: Mutex::new(store),
            ..self
        }
    }

    /// Creates a tracker from settings
    ///
    /// Loads the cache file (if present), lays the shows from the settings
    /// over it and registers every show of the show-name list file. A
    /// configured but missing show-name file is an error.
    pub fn open(settings: &Settings, provider: P) -> Result<Self, SallieError> {
        let default_timezone = settings.default_timezone()?;
        let cache_file = settings.cache_file_path();

        let mut store = ShowStore::load(&cache_file)?;
        debug!(path = %cache_file.display(), shows = store.len(), "Loaded cache");

        for (key, show) in &settings.shows {
            store.insert(key.clone(), show.clone());
        }

        if let Some(show_file) = settings.show_file_path() {
            for entry in load_show_names(&show_file)? {
                let timezone = match entry.timezone() {
                    Some(name) => parse_timezone(name)?,
                    None => default_timezone,
                };
                store.entry(entry.name()).air_timezone = Some(timezone);
            }
            debug!(path = %show_file.display(), "Loaded show names");
        }

        Ok(Self::new(provider, settings.refresh_policy(), default_timezone, cache_file).with_store(store))
    }

    fn lock(&self) -> MutexGuard<'_, ShowStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path the store is saved to
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Starts tracking a show
    ///
    /// Existing shows keep their data; a given timezone replaces theirs.
    pub fn show_add(&self, key: &str, timezone: Option<Tz>) {
        let mut store = self.lock();
        let show = store.entry(key);
        if timezone.is_some() {
            show.air_timezone = timezone;
        }
    }

    /// Stops tracking a show, returns whether it was tracked
    pub fn show_remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Snapshot of all shows in insertion order
    pub fn shows(&self) -> IndexMap<String, ShowRecord> {
        self.lock().shows().clone()
    }

    /// Snapshot of a single show
    pub fn show(&self, key: &str) -> Option<ShowRecord> {
        self.lock().get(key).cloned()
    }

    /// All episodes of a show, oldest season first
    pub fn show_episodes_flatten(&self, key: &str) -> Option<Vec<EpisodeRecord>> {
        self.lock()
            .get(key)
            .map(|show| show.flatten_episodes().into_iter().cloned().collect())
    }

    /// Writes all shows to the cache file
    ///
    /// Failures are logged and reported as `false`; the in-memory store
    /// stays authoritative.
    pub fn show_save_all(&self) -> bool {
        let store = self.lock();
        self.save(&store)
    }

    fn save(&self, store: &ShowStore) -> bool {
        match store.save(&self.cache_file) {
            Ok(()) => {
                info!(path = %self.cache_file.display(), "Saved shows to {}", self.cache_file.display());
                true
            }
            Err(e) => {
                error!(path = %self.cache_file.display(), error = %e, "Failed to save shows");
                false
            }
        }
    }

    /// Refreshes a show if it is due (or `force` is set)
    ///
    /// Unknown shows are added first. Returns whether the record changed.
    pub fn update(&self, key: &str, force: bool, auto_save: bool) -> bool {
        let mut store = self.lock();
        self.update_show(&mut store, key, force, auto_save)
    }

    /// Refreshes every show that is due, in key order
    ///
    /// With `auto_save` every changed show is saved right away; otherwise
    /// the store is saved once at the end if anything changed.
    pub fn update_all(&self, force: bool, auto_save: bool) -> bool {
        let mut store = self.lock();
        self.update_shows(&mut store, force, auto_save)
    }

    fn update_shows(&self, store: &mut ShowStore, force: bool, auto_save: bool) -> bool {
        let mut changed = false;
        for key in store.keys() {
            changed |= self.update_show(store, &key, force, auto_save);
        }
        if !auto_save && changed {
            self.save(store);
        }
        changed
    }

    fn update_show(&self, store: &mut ShowStore, key: &str, force: bool, auto_save: bool) -> bool {
        if !should_update(key, store.entry(key), Utc::now(), force, &self.policy) {
            return false;
        }

        let max_retries = self.policy.max_retries;
        let mut backoff = self.policy.retry_delay;
        let mut changed = false;
        let mut failed = false;

        // A due show always gets at least one attempt
        let show = store.entry(key);
        if show.errors >= max_retries {
            show.errors = max_retries.saturating_sub(1);
        }

        while store.entry(key).errors < max_retries {
            let result = self.provider.fetch(key);
            let show = store.entry(key);
            changed = true;

            match result {
                Ok(data) => {
                    show.apply(data, self.default_timezone, Utc::now());
                    failed = false;
                    info!(show = %key, "Updated {}", key);
                    break;
                }
                Err(FetchError::NotFound(name)) => {
                    error!(show = %key, "Show {} not found", name);
                    show.errors = max_retries;
                    show.accessed = Some(Utc::now());
                    failed = false;
                    break;
                }
                Err(e) => {
                    show.errors += 1;
                    failed = true;
                    let retry = self.policy.should_retry && show.errors < max_retries;

                    if !e.is_connection_reset() {
                        error!(show = %key, error = %e, "Failed to load {}", key);
                    } else if retry {
                        warn!(show = %key, error = %e, "Connection reset by peer (Sleeping {:?})", backoff);
                        thread::sleep(backoff);
                        backoff *= 2;
                    } else {
                        warn!(show = %key, error = %e, "Connection reset by peer");
                    }

                    if !retry {
                        break;
                    }
                }
            }
        }

        let show = store.entry(key);
        if failed && show.errors >= max_retries {
            warn!(show = %key, errors = show.errors, "Giving up on {}", key);
            show.accessed = Some(Utc::now());
        }

        if auto_save && changed {
            self.save(store);
        }
        changed
    }

    /// Episodes of a show airing within a date window
    ///
    /// The show is added if unknown and refreshed if due. `delta_min`
    /// reaches into the past, `delta_max` into the future; both default to
    /// today. Matches are returned newest first.
    pub fn check(
        &self,
        key: &str,
        force: bool,
        delta_min: Option<DayBound>,
        delta_max: Option<DayBound>,
        auto_save: bool,
    ) -> CheckResult {
        let window = DateWindow::resolve(delta_min, delta_max, Utc::now().date_naive());
        let mut store = self.lock();
        self.check_show(&mut store, key, force, window, auto_save)
    }

    fn check_show(
        &self,
        store: &mut ShowStore,
        key: &str,
        force: bool,
        window: DateWindow,
        auto_save: bool,
    ) -> CheckResult {
        self.update_show(store, key, force, auto_save);
        match store.get(key) {
            Some(show) => episodes_in_window(key, show, window),
            None => Vec::new(),
        }
    }

    /// Runs [`check`](Self::check) for several shows
    ///
    /// Without `keys` all shows are refreshed in one batch first, after
    /// which each show is queried without forcing or saving again. Results
    /// are concatenated in processing order.
    pub fn check_all(
        &self,
        keys: Option<&[String]>,
        delta_min: Option<DayBound>,
        delta_max: Option<DayBound>,
        force: bool,
        auto_save: bool,
    ) -> CheckResult {
        let window = DateWindow::resolve(delta_min, delta_max, Utc::now().date_naive());
        let mut store = self.lock();

        let (keys, force, auto_save) = match keys {
            Some(keys) => (keys.to_vec(), force, auto_save),
            None => {
                let keys = store.keys();
                self.update_shows(&mut store, force, auto_save);
                (keys, false, false)
            }
        };

        let mut results = Vec::new();
        for key in &keys {
            results.extend(self.check_show(&mut store, key, force, window, auto_save));
        }
        results
    }
}
