//! Choosing the right show among search results
//!
//! Providers answer a name search with a list of candidates. The strategy
//! here is pure so it can be tested without any network access.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

/// A search result offered by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Provider id used to fetch the full show
    pub id: u64,
    pub name: String,
    /// Date of the first episode, if known
    pub premiered: Option<NaiveDate>,
}

/// Splits a trailing parenthesized hint off a show key
///
/// `"Doctor Who (2005)"` becomes `("Doctor Who", Some("2005"))`. Keys
/// without such a suffix are returned unchanged.
pub fn split_year_hint(key: &str) -> (&str, Option<&str>) {
    let trimmed = key.trim_end();
    let Some(start) = trimmed.rfind(char::is_whitespace) else {
        return (key, None);
    };

    let last = &trimmed[start + 1..];
    if last.len() > 2 && last.starts_with('(') && last.ends_with(')') {
        (trimmed[..start].trim_end(), Some(&last[1..last.len() - 1]))
    } else {
        (key, None)
    }
}

/// Similarity of two strings between 0.0 and 1.0
///
/// Computed as `2 * M / T`, where `T` is the combined length and `M` the
/// number of characters covered by recursively matching the longest common
/// blocks.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }

    len + matching_characters(&a[..start_a], &b[..start_b])
        + matching_characters(&a[start_a + len..], &b[start_b + len..])
}

/// Returns (start in a, start in b, length); earliest block wins ties
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                current[j + 1] = previous[j] + 1;
                if current[j + 1] > best.2 {
                    let len = current[j + 1];
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        previous = current;
    }

    best
}

/// Picks the candidate that best matches a show key
///
/// Candidates are ranked by [`similarity_ratio`] against `query`. With a
/// year hint the best ranked candidate premiering in that year wins;
/// otherwise, or if none premiered that year, the best ranked one does.
pub fn select_best_match<'a>(
    candidates: &'a [Candidate],
    query: &str,
    year_hint: Option<&str>,
) -> Option<&'a Candidate> {
    let mut ranked: Vec<(&Candidate, f64)> = candidates
        .iter()
        .map(|candidate| (candidate, similarity_ratio(query, &candidate.name)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    debug!(
        query,
        options = %ranked
            .iter()
            .map(|(c, ratio)| format!("{} ({:.2})", c.name, ratio))
            .collect::<Vec<_>>()
            .join(", "),
        "Selecting show"
    );

    if let Some(year) = year_hint {
        let same_year = ranked.iter().find(|(candidate, _)| {
            candidate
                .premiered
                .is_some_and(|premiered| premiered.year().to_string() == year)
        });
        if let Some((candidate, _)) = same_year {
            return Some(candidate);
        }
    }

    ranked.first().map(|(candidate, _)| *candidate)
}
