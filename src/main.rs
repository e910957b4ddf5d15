use chrono::{DateTime, Utc};
use clap::Parser;
use sallie::{
    DayBound, MetadataProvider, SallieError, Settings, Tracker, TvMazeProvider, episodes_in_range,
    format_episodes, next_episodes, shows_by_state, shows_missing_episodes,
};
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Keep track of the TV shows you watch
#[derive(Parser, Debug)]
#[command(name = "sallie", version, about)]
struct Cli {
    /// Use debug level output
    #[arg(long)]
    debug: bool,

    /// Settings file
    #[arg(short, long, default_value = "sallie.json")]
    settings: PathBuf,

    /// Base path for relative paths in the settings
    #[arg(long = "pre-path")]
    pre_path: Option<PathBuf>,

    /// Check for episodes in the given period
    #[arg(short, long)]
    check: bool,

    /// How many days in the past to check
    #[arg(long)]
    min: Option<i64>,

    /// How many days in the future to check
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    max: Option<i64>,

    /// Force updates regardless of the update rules
    #[arg(long)]
    force: bool,

    /// Save after every updated show
    #[arg(long)]
    autosave: bool,

    /// Do not save at the end
    #[arg(long)]
    nosave: bool,

    /// List shows without episodes
    #[arg(long)]
    missing: bool,

    /// Update all shows or the given one
    #[arg(long, value_name = "SHOW", num_args = 0..=1, default_missing_value = "all")]
    update: Option<String>,

    /// List all tracked shows
    #[arg(long)]
    shows: bool,

    /// List episodes of all shows or the given one
    #[arg(long, value_name = "SHOW", num_args = 0..=1, default_missing_value = "all")]
    list: Option<String>,

    /// Show the next upcoming episode of all shows or the given one
    #[arg(long, value_name = "SHOW", num_args = 0..=1, default_missing_value = "all")]
    next: Option<String>,

    /// Sort order, separated by ';' (values: date, state)
    #[arg(long, default_value = "date;state")]
    sort: String,

    /// Reverse the output order
    #[arg(long)]
    reverse: bool,

    /// With --list: list every show with its state
    #[arg(long)]
    all: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `None` for "all", otherwise the named show
fn selection(select: &str) -> Option<&str> {
    (select != "all").then_some(select)
}

/// Applies the requested order
fn ordered(mut lines: Vec<String>, sort: &str, reverse: bool) -> Vec<String> {
    if sort.split(';').any(|s| s == "date") {
        lines.sort();
    }
    if reverse {
        lines.reverse();
    }
    lines
}

/// What a run printed and whether it already wrote the store
#[derive(Debug, Default)]
struct Outcome {
    lines: Vec<String>,
    saved: bool,
}

/// Runs the actions requested on the command line
///
/// Without an explicit action (and without `--update`) the default is a
/// check of all shows.
fn dispatch<P: MetadataProvider>(cli: &Cli, tracker: &Tracker<P>, now: DateTime<Utc>) -> Outcome {
    let mut outcome = Outcome::default();
    let mut check = cli.check;

    if let Some(update) = &cli.update {
        match selection(update) {
            None => {
                tracker.update_all(cli.force, cli.autosave);
                outcome.saved = true;
            }
            Some(key) if tracker.show(key).is_none() => error!("Show {} not found", key),
            Some(key) => {
                outcome.saved = tracker.update(key, cli.force, cli.autosave) && cli.autosave;
            }
        }
    }

    if let Some(list) = &cli.list {
        let shows = tracker.shows();
        if cli.all {
            let mut states = shows_by_state(&shows);
            if cli.reverse {
                states.reverse();
            }
            outcome.lines.extend(
                states
                    .into_iter()
                    .map(|(key, state)| format!("{} ({})", key, state)),
            );
        } else {
            let select = selection(list);
            match select {
                Some(key) if !shows.contains_key(key) => error!("Show {} not found", key),
                _ => {
                    let episodes = episodes_in_range(&shows, select, cli.min, cli.max, now);
                    outcome.lines = ordered(format_episodes(&episodes, now), &cli.sort, cli.reverse);
                }
            }
        }
    } else if let Some(next) = &cli.next {
        let shows = tracker.shows();
        let select = selection(next);
        match select {
            Some(key) if !shows.contains_key(key) => error!("Show {} not found", key),
            _ => {
                let episodes = next_episodes(&shows, select, cli.max, now);
                outcome.lines = ordered(format_episodes(&episodes, now), &cli.sort, cli.reverse);
            }
        }
    } else if cli.shows {
        let mut keys: Vec<String> = tracker.shows().into_keys().collect();
        keys.sort();
        if cli.reverse {
            keys.reverse();
        }
        outcome.lines = keys;
    } else if cli.missing {
        let mut keys = shows_missing_episodes(&tracker.shows());
        if cli.reverse {
            keys.reverse();
        }
        outcome.lines = keys
            .into_iter()
            .map(|key| format!("Missing episodes for {}", key))
            .collect();
    } else if cli.update.is_none() {
        check = true;
    }

    if check {
        let results = tracker.check_all(
            None,
            cli.min.map(DayBound::Days),
            cli.max.map(DayBound::Days),
            cli.force,
            cli.autosave,
        );
        let mut lines = format_episodes(&results, now);
        lines.sort();
        outcome.lines.extend(lines);
        outcome.saved = true;
    }

    outcome
}

fn run(cli: Cli) -> Result<(), SallieError> {
    let mut settings = Settings::load(&cli.settings)?;
    if cli.pre_path.is_some() {
        settings.path_prefix = cli.pre_path.clone();
    }
    settings.use_platform_cache_dir()?;

    let provider = TvMazeProvider::with_base_url(settings.tvmaze_url.clone());
    let tracker = Tracker::open(&settings, provider)?;

    let outcome = dispatch(&cli, &tracker, Utc::now());
    for line in &outcome.lines {
        println!("{}", line);
    }

    if !cli.nosave && !outcome.saved {
        tracker.show_save_all();
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sallie::{EpisodeData, FetchError, RefreshPolicy, ShowData};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider that records every fetched key
    #[derive(Default)]
    struct CountingProvider {
        calls: Mutex<Vec<String>>,
    }

    impl CountingProvider {
        fn calls_for(&self, key: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
        }
    }

    impl MetadataProvider for &CountingProvider {
        fn fetch(&self, key: &str) -> Result<ShowData, FetchError> {
            self.calls.lock().unwrap().push(key.to_string());
            let episode = EpisodeData {
                name: Some("Pilot".to_string()),
                first_aired: Some(Utc::now().date_naive()),
                external_ids: BTreeMap::new(),
            };
            Ok(ShowData {
                name: key.to_string(),
                overview: None,
                status: None,
                active: true,
                hiatus: false,
                runtime: None,
                air_day: None,
                air_time: None,
                air_timezone: None,
                external_ids: BTreeMap::new(),
                seasons: BTreeMap::from([(1, BTreeMap::from([(1, episode)]))]),
            })
        }
    }

    fn tracker<'a>(dir: &Path, provider: &'a CountingProvider) -> Tracker<&'a CountingProvider> {
        let policy = RefreshPolicy {
            retry_delay: Duration::ZERO,
            ..RefreshPolicy::default()
        };
        let tracker = Tracker::new(provider, policy, chrono_tz::UTC, dir.join("sallie.tmp.json"));
        tracker.show_add("Dark", None);
        tracker.show_add("Lost", None);
        tracker
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("sallie").chain(args.iter().copied()))
    }

    #[test]
    fn test_forced_update_all_fetches_each_show_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::default();
        let tracker = tracker(dir.path(), &provider);

        let outcome = dispatch(&cli(&["--update", "--force"]), &tracker, Utc::now());

        assert_eq!(provider.calls_for("Dark"), 1);
        assert_eq!(provider.calls_for("Lost"), 1);
        assert!(outcome.lines.is_empty());
        assert!(outcome.saved);
    }

    #[test]
    fn test_forced_update_of_one_show_leaves_others_alone() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::default();
        let tracker = tracker(dir.path(), &provider);

        let outcome = dispatch(&cli(&["--update", "Lost", "--force"]), &tracker, Utc::now());

        assert_eq!(provider.calls_for("Lost"), 1);
        assert_eq!(provider.calls_for("Dark"), 0);
        assert!(!outcome.saved);
    }

    #[test]
    fn test_update_with_check_flag_runs_check() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::default();
        let tracker = tracker(dir.path(), &provider);

        let outcome = dispatch(&cli(&["--update", "--check"]), &tracker, Utc::now());

        assert_eq!(provider.calls_for("Dark"), 1);
        assert_eq!(provider.calls_for("Lost"), 1);
        assert_eq!(outcome.lines.len(), 2);
    }

    #[test]
    fn test_default_action_is_check() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::default();
        let tracker = tracker(dir.path(), &provider);

        let outcome = dispatch(&cli(&[]), &tracker, Utc::now());

        assert_eq!(provider.calls_for("Dark"), 1);
        assert_eq!(outcome.lines.len(), 2);
        assert!(outcome.lines[0].contains("DARK (01x01 - Pilot)"));
        assert!(outcome.saved);
    }

    #[test]
    fn test_shows_listing_does_not_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::default();
        let tracker = tracker(dir.path(), &provider);

        let outcome = dispatch(&cli(&["--shows", "--reverse"]), &tracker, Utc::now());

        assert_eq!(outcome.lines, vec!["Lost", "Dark"]);
        assert_eq!(provider.calls_for("Lost"), 0);
        assert!(!outcome.saved);
    }
}
