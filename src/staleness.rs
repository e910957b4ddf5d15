//! Refresh policy
//!
//! Decides per show whether the cached data is old enough to ask the
//! metadata provider again. Shows in different lifecycle states (active,
//! on hiatus, ended, failing) are refreshed at different intervals.

use crate::show::ShowRecord;
use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;
use tracing::{debug, info};

/// Consecutive errors after which a show is only retried every
/// `interval_error` days
pub const ERROR_THRESHOLD: u32 = 3;

/// Refresh intervals (in days) and retry behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    /// Interval for active shows
    pub interval: i64,
    /// Interval for shows on hiatus, never refreshed if `None`
    pub interval_hiatus: Option<i64>,
    /// Interval for ended shows, never refreshed if `None`
    pub interval_inactive: Option<i64>,
    /// Refresh once an episode aired this many days after the last refresh
    pub interval_aired: Option<i64>,
    /// Interval for shows that exhausted their retries
    pub interval_error: i64,
    /// Maximum attempts per refresh
    pub max_retries: u32,
    /// Whether failed attempts are retried
    pub should_retry: bool,
    /// Backoff before the first retry after a dropped connection
    pub retry_delay: StdDuration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: 7,
            interval_hiatus: None,
            interval_inactive: None,
            interval_aired: None,
            interval_error: 10,
            max_retries: 3,
            should_retry: true,
            retry_delay: StdDuration::from_secs(2),
        }
    }
}

/// Whole days in `elapsed`, rounded towards negative infinity
pub(crate) fn whole_days(elapsed: Duration) -> i64 {
    elapsed.num_seconds().div_euclid(86_400)
}

/// Error count that leaves room for exactly one more attempt
fn retry_errors(policy: &RefreshPolicy) -> u32 {
    policy.max_retries.saturating_sub(1).max(1)
}

/// Decides whether a show needs refreshing
///
/// Rules, first match wins:
///
/// 1. Never accessed. An exhausted error count is lowered as in rule 2.
/// 2. At least [`ERROR_THRESHOLD`] errors and either `interval_error` days
///    passed or `force` is set. The error count is lowered to
///    `max(1, max_retries - 1)` so exactly one more attempt is made.
/// 3. `force`.
/// 4. An episode aired at least `interval_aired` days after the last access.
///    Episodes are scanned newest first and the scan stops at the first past
///    episode that does not qualify, which assumes episodes are ordered by
///    air date.
/// 5. Ended shows: `interval_inactive` days passed (never if unset).
/// 6. Shows on hiatus: `interval_hiatus` days passed (never if unset).
/// 7. `interval` days passed.
pub fn should_update(
    key: &str,
    show: &mut ShowRecord,
    now: DateTime<Utc>,
    force: bool,
    policy: &RefreshPolicy,
) -> bool {
    let Some(accessed) = show.accessed else {
        info!(show = %key, "Never accessed {}", key);
        if show.errors >= policy.max_retries {
            show.errors = retry_errors(policy);
        }
        return true;
    };
    let days = whole_days(now - accessed);

    if show.errors >= ERROR_THRESHOLD && (days >= policy.interval_error || force) {
        info!(show = %key, errors = show.errors, "Error retry {}", key);
        show.errors = retry_errors(policy);
        return true;
    }

    if force {
        return true;
    }

    if let Some(interval_aired) = policy.interval_aired {
        for episode in show.flatten_episodes().into_iter().rev() {
            let Some(aired) = episode.aired else {
                continue;
            };
            if aired > now {
                continue;
            }
            if whole_days(aired - accessed) >= interval_aired {
                debug!(show = %key, episode = %episode.id, "Aired {} ago", now - aired);
                return true;
            }
            break;
        }
    }

    if !show.active {
        return policy
            .interval_inactive
            .is_some_and(|interval| days >= interval);
    }

    if show.hiatus {
        return policy
            .interval_hiatus
            .is_some_and(|interval| days >= interval);
    }

    days >= policy.interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::{EpisodeRecord, episode_id};
    use std::collections::BTreeMap;

    fn accessed_days_ago(days: i64, now: DateTime<Utc>) -> ShowRecord {
        ShowRecord {
            accessed: Some(now - Duration::days(days)),
            ..ShowRecord::default()
        }
    }

    fn add_episode(show: &mut ShowRecord, season: u32, number: u32, aired: Option<DateTime<Utc>>) {
        show.episodes.entry(season).or_default().insert(
            number,
            EpisodeRecord {
                id: episode_id(season, number),
                name: None,
                aired,
                external_ids: BTreeMap::new(),
            },
        );
    }

    #[test]
    fn test_never_accessed_always_updates() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        let mut show = ShowRecord {
            active: false,
            errors: 10,
            ..ShowRecord::default()
        };
        assert!(should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 2);

        let mut show = ShowRecord {
            errors: 1,
            ..ShowRecord::default()
        };
        assert!(should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 1);
    }

    #[test]
    fn test_error_retry_caps_errors() {
        let now = Utc::now();
        let policy = RefreshPolicy {
            max_retries: 5,
            ..RefreshPolicy::default()
        };

        let mut show = accessed_days_ago(10, now);
        show.errors = 5;
        assert!(should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 4);
    }

    #[test]
    fn test_error_retry_cap_is_at_least_one() {
        let now = Utc::now();
        let policy = RefreshPolicy {
            max_retries: 1,
            ..RefreshPolicy::default()
        };

        let mut show = accessed_days_ago(10, now);
        show.errors = 3;
        assert!(should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 1);
    }

    #[test]
    fn test_error_retry_waits_for_interval() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        let mut show = accessed_days_ago(9, now);
        show.errors = 3;
        // Active show, 9 days >= 7 day interval still refreshes via rule 7,
        // but errors stay untouched
        assert!(should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 3);

        let mut show = accessed_days_ago(2, now);
        show.errors = 3;
        assert!(!should_update("Lost", &mut show, now, false, &policy));
        assert_eq!(show.errors, 3);
    }

    #[test]
    fn test_force_caps_errors_of_failing_show() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        let mut show = accessed_days_ago(0, now);
        show.errors = 3;
        assert!(should_update("Lost", &mut show, now, true, &policy));
        assert_eq!(show.errors, 2);
    }

    #[test]
    fn test_active_show_within_interval_is_fresh() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        let mut show = accessed_days_ago(6, now);
        assert!(!should_update("Lost", &mut show, now, false, &policy));

        let mut show = accessed_days_ago(7, now);
        assert!(should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_elapsed_days_are_truncated() {
        let now = Utc::now();
        let policy = RefreshPolicy::default();

        let mut show = ShowRecord {
            accessed: Some(now - Duration::days(7) + Duration::minutes(1)),
            ..ShowRecord::default()
        };
        assert!(!should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_force_updates_fresh_show() {
        let now = Utc::now();
        let mut show = accessed_days_ago(0, now);
        assert!(should_update("Lost", &mut show, now, true, &RefreshPolicy::default()));
    }

    #[test]
    fn test_recently_aired_episode_triggers_update() {
        let now = Utc::now();
        let policy = RefreshPolicy {
            interval_aired: Some(1),
            ..RefreshPolicy::default()
        };

        let mut show = accessed_days_ago(3, now);
        add_episode(&mut show, 1, 1, Some(now - Duration::days(20)));
        add_episode(&mut show, 1, 2, Some(now - Duration::hours(12)));
        add_episode(&mut show, 1, 3, Some(now + Duration::days(7)));
        add_episode(&mut show, 1, 4, None);

        assert!(should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_recently_aired_scan_stops_at_first_old_episode() {
        let now = Utc::now();
        let policy = RefreshPolicy {
            interval_aired: Some(1),
            interval: 30,
            ..RefreshPolicy::default()
        };

        // 01x02 aired before the last access and stops the scan, so the
        // misordered 01x01 is never looked at
        let mut show = accessed_days_ago(5, now);
        add_episode(&mut show, 1, 1, Some(now - Duration::days(1)));
        add_episode(&mut show, 1, 2, Some(now - Duration::days(10)));

        assert!(!should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_inactive_show() {
        let now = Utc::now();

        let mut show = accessed_days_ago(100, now);
        show.active = false;
        assert!(!should_update("Lost", &mut show, now, false, &RefreshPolicy::default()));

        let policy = RefreshPolicy {
            interval_inactive: Some(30),
            ..RefreshPolicy::default()
        };
        assert!(should_update("Lost", &mut show, now, false, &policy));

        let mut show = accessed_days_ago(29, now);
        show.active = false;
        assert!(!should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_hiatus_show() {
        let now = Utc::now();

        let mut show = accessed_days_ago(100, now);
        show.hiatus = true;
        assert!(!should_update("Lost", &mut show, now, false, &RefreshPolicy::default()));

        let policy = RefreshPolicy {
            interval_hiatus: Some(14),
            ..RefreshPolicy::default()
        };
        assert!(should_update("Lost", &mut show, now, false, &policy));
    }

    #[test]
    fn test_whole_days_floors() {
        assert_eq!(whole_days(Duration::hours(47)), 1);
        assert_eq!(whole_days(Duration::hours(-1)), -1);
        assert_eq!(whole_days(Duration::zero()), 0);
    }
}
