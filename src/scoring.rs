//! Similarity scoring for fuzzy entity lookups.
//!
//! This module contains the candidate ranking used by the resolver:
//! - Exact normalized match
//! - Main-artist match for collaboration credits ("X feat. Y")
//! - Blended fuzzy score (sequence ratio, main-artist ratio, containment)

use similar::TextDiff;

use crate::config::MatchConfig;
use crate::normalize::{extract_main_artist, normalize};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum score to accept a match when the caller has no stronger opinion
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Score of an exact normalized match
pub const EXACT_SCORE: f64 = 1.0;

// ============================================================================
// Ratios
// ============================================================================

/// Sequence-alignment ratio of two already-normalized strings: `2 * M / T`,
/// where `M` is the number of matched characters and `T` the total length.
/// e.g., "rolling stones" vs "the rolling stones" → 28/32
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio() as f64
}

/// Length ratio when one normalized string contains the other, else 0.0.
/// e.g., "radiohead" inside "radiohead live" → 9/14
pub fn containment_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if !a.contains(b) && !b.contains(a) {
        return 0.0;
    }
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    len_a.min(len_b) as f64 / len_a.max(len_b) as f64
}

/// Fuzzy score of a single candidate: the best of the full-string ratio,
/// the main-artist ratio and the containment ratio.
pub fn blended_score(query_norm: &str, query_main: &str, cand_norm: &str, cand_main: &str) -> f64 {
    let full = sequence_ratio(query_norm, cand_norm);
    let main = sequence_ratio(query_main, cand_main);
    let contained = containment_ratio(query_norm, cand_norm);
    full.max(main).max(contained)
}

// ============================================================================
// Best Match
// ============================================================================

struct Prepared<T> {
    norm: String,
    main: String,
    payload: T,
}

fn accept<T>(prepared: Vec<Prepared<T>>, idx: usize, score: f64, threshold: f64) -> Option<(T, f64)> {
    if score < threshold {
        return None;
    }
    prepared.into_iter().nth(idx).map(|p| (p.payload, score))
}

/// Find the best candidate for `name` using the default score constants.
/// Candidates are `(name, payload)` pairs; the payload of the winner is returned.
pub fn find_best_match<T, S, I>(name: &str, candidates: I, threshold: f64) -> Option<(T, f64)>
where
    S: AsRef<str>,
    I: IntoIterator<Item = (S, T)>,
{
    find_best_match_with(name, candidates, threshold, &MatchConfig::default())
}

/// Same as [`find_best_match`] with explicit score constants.
///
/// Tiers are tried in order and the first tier that produces a candidate
/// decides the result; its score must still reach `threshold`.
pub fn find_best_match_with<T, S, I>(
    name: &str,
    candidates: I,
    threshold: f64,
    config: &MatchConfig,
) -> Option<(T, f64)>
where
    S: AsRef<str>,
    I: IntoIterator<Item = (S, T)>,
{
    let query_norm = normalize(name);
    let query_main = extract_main_artist(name);

    let prepared: Vec<Prepared<T>> = candidates
        .into_iter()
        .map(|(cand, payload)| Prepared {
            norm: normalize(cand.as_ref()),
            main: extract_main_artist(cand.as_ref()),
            payload,
        })
        .collect();

    if prepared.is_empty() {
        return None;
    }

    // Tier 1: exact normalized match
    if let Some(idx) = prepared.iter().position(|p| p.norm == query_norm) {
        return accept(prepared, idx, EXACT_SCORE, threshold);
    }

    // Tier 2: main artists collapse to the same name
    if !query_main.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, p) in prepared.iter().enumerate() {
            if p.main != query_main {
                continue;
            }
            let score = if p.norm == query_main {
                config.main_artist_exact_score
            } else {
                config.main_artist_score
            };
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((idx, score));
            }
        }
        if let Some((idx, score)) = best {
            return accept(prepared, idx, score, threshold);
        }
    }

    // Tier 3: blended fuzzy score, first candidate wins ties
    let mut best: Option<(usize, f64)> = None;
    for (idx, p) in prepared.iter().enumerate() {
        let score = blended_score(&query_norm, &query_main, &p.norm, &p.main);
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((idx, score));
        }
    }

    best.and_then(|(idx, score)| accept(prepared, idx, score, threshold))
}

/// Flat-list form of [`find_best_match`]: returns the matched candidate name.
pub fn find_best_name<'a, S: AsRef<str>>(name: &str, candidates: &'a [S], threshold: f64) -> Option<(&'a str, f64)> {
    find_best_match(
        name,
        candidates.iter().map(|c| (c.as_ref(), c.as_ref())),
        threshold,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_self_match() {
        for name in ["Radiohead", "Sigur Rós", "!!!", "Artist feat. Other"] {
            assert_eq!(find_best_name(name, &[name], DEFAULT_THRESHOLD), Some((name, 1.0)));
        }
    }

    #[test]
    fn test_exact_match_ignores_case_and_accents() {
        let result = find_best_name("BEYONCE", &["Beyoncé", "Beyond"], DEFAULT_THRESHOLD);
        assert_eq!(result, Some(("Beyoncé", 1.0)));
    }

    #[test]
    fn test_collaboration_collapses_to_main_artist() {
        let (matched, score) = find_best_name("Artist Feat. Other", &["Artist"], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(matched, "Artist");
        assert!(score >= 0.9);
        assert_eq!(score, 0.95);
    }

    #[test]
    fn test_shared_main_artist_scores_lower() {
        // Both sides are collaborations, the candidate is not the bare main artist
        let (_, score) = find_best_name("Drake feat. Rihanna", &["Drake & Future"], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(score, 0.9);
    }

    #[test]
    fn test_main_artist_prefers_bare_name() {
        let candidates = ["Drake & Future", "Drake"];
        let (matched, score) = find_best_name("Drake ft. Rihanna", &candidates, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(matched, "Drake");
        assert_eq!(score, 0.95);
    }

    #[test]
    fn test_unrelated_names_rejected() {
        assert_eq!(find_best_name("Completely Different", &["Unrelated Xyz"], 0.8), None);
    }

    #[test]
    fn test_fuzzy_typo_match() {
        let (matched, score) = find_best_name("Metalica", &["Megadeth", "Metallica"], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(matched, "Metallica");
        assert!(score > 0.85 && score < 1.0);
    }

    #[test]
    fn test_containment_ratio() {
        assert!((containment_ratio("rolling stones", "the rolling stones") - 14.0 / 18.0).abs() < 1e-9);
        assert_eq!(containment_ratio("abc", "xyz"), 0.0);
        assert_eq!(containment_ratio("", "xyz"), 0.0);
    }

    #[test]
    fn test_sequence_ratio_counts_matched_characters() {
        assert_eq!(sequence_ratio("rolling stones", "the rolling stones"), 0.875);
        assert_eq!(sequence_ratio("abcd", "abcd"), 1.0);
        assert_eq!(sequence_ratio("abcd", "wxyz"), 0.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
    }

    #[test]
    fn test_leading_article_still_matches() {
        let (matched, score) = find_best_name("Rolling Stones", &["The Rolling Stones"], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(matched, "The Rolling Stones");
        assert_eq!(score, 0.875);
    }

    #[test]
    fn test_threshold_applies_to_fuzzy_tier() {
        let candidates = ["The Rolling Stones"];
        assert_eq!(find_best_name("Rolling Stones", &candidates, 0.9), None);
        let (_, score) = find_best_name("Rolling Stones", &candidates, 0.85).unwrap();
        assert!(score >= 0.85);
    }

    #[test]
    fn test_threshold_applies_to_main_artist_tier() {
        assert_eq!(find_best_name("Artist feat. Other", &["Artist"], 0.97), None);
    }

    #[test]
    fn test_mapping_returns_payload() {
        let candidates = vec![("Pink Floyd", 10_i64), ("Pink", 11), ("Floyd", 12)];
        assert_eq!(find_best_match("pink floyd", candidates, DEFAULT_THRESHOLD), Some((10, 1.0)));
    }

    #[test]
    fn test_empty_candidates() {
        let empty: [&str; 0] = [];
        assert_eq!(find_best_name("Anything", &empty, 0.0), None);
    }

    #[test]
    fn test_custom_scores() {
        let config = MatchConfig {
            main_artist_exact_score: 0.99,
            ..MatchConfig::default()
        };
        let result = find_best_match_with("Artist feat. Other", [("Artist", ())], 0.8, &config);
        assert_eq!(result, Some(((), 0.99)));
    }
}
