//! Shared name normalization for artist/album/song matching.
//! Used by the scorer, the resolver and the duplicate scanner.
//!
//! CRITICAL: `normalize` must stay idempotent. Grouping keys and cached
//! lookups are built from its output and re-normalized freely.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Anything that is not a word character or whitespace.
pub static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Runs of whitespace, collapsed to a single space.
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collaboration markers, tried in order. The first one that matches decides
/// where the main artist ends, even if a later marker appears earlier in the text.
pub static COLLABORATION_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(.+?)\s+feat\.?\s+").unwrap(),
        Regex::new(r"^(.+?)\s+featuring\s+").unwrap(),
        Regex::new(r"^(.+?)\s+ft\.?\s+").unwrap(),
        Regex::new(r"^(.+?)\s+con\s+").unwrap(),
        Regex::new(r"^(.+?)\s+y\s+").unwrap(),
        Regex::new(r"^(.+?)\s+and\s+").unwrap(),
        Regex::new(r"^(.+?)\s*&\s*").unwrap(),
        Regex::new(r"^(.+?)\s+vs\.?\s+").unwrap(),
        Regex::new(r"^(.+?)\s+versus\s+").unwrap(),
        Regex::new(r"^(.+?)\s+presents\s+").unwrap(),
        Regex::new(r"^(.+?)\s+presenta\s+").unwrap(),
    ]
});

/// Album edition/disc/year decorations (applied in order).
pub static ALBUM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Remaster in brackets: "(2023 Remaster)", "[Remastered 2009]", "(Remastered Edition)"
        Regex::new(r"(?i)\s*[\(\[][^\)\]]*remaster(?:ed)?[^\)\]]*[\)\]]").unwrap(),
        // Remaster after a dash: "- 2011 Remastered", "- Remaster 2009"
        Regex::new(r"(?i)\s*[-–—]\s*(?:\d{4}\s+)?remaster(?:ed)?(?:\s+\d{4})?(?:\s+(?:edition|version))?\s*$").unwrap(),
        // Bare year in brackets: "(1997)", "[2001]"
        Regex::new(r"\s*[\(\[]\s*\d{4}\s*[\)\]]").unwrap(),
        // Disc markers in brackets: "[Disc 2]", "(CD 1)"
        Regex::new(r"(?i)\s*[\(\[]\s*(?:disc|disk|cd)\s*\d+\s*[\)\]]").unwrap(),
        // Trailing disc markers: "Album - Disc 2", "Album CD1"
        Regex::new(r"(?i)\s*[-–—:]?\s*\b(?:disc|disk|cd)\s*\d+\s*$").unwrap(),
        // Deluxe variants: "(Deluxe)", "[Super Deluxe Edition]", "- Deluxe Edition"
        Regex::new(r"(?i)\s*[\(\[](?:super\s+)?deluxe(?:\s+(?:edition|version))?[\)\]]").unwrap(),
        Regex::new(r"(?i)\s*[-–—]\s*(?:super\s+)?deluxe(?:\s+(?:edition|version))?\s*$").unwrap(),
        // Other editions: "(Expanded Edition)", "[25th Anniversary Edition]"
        Regex::new(r"(?i)\s*[\(\[](?:expanded|special|collector'?s?|(?:\d+(?:st|nd|rd|th)\s+)?anniversary)(?:\s+edition)?[\)\]]").unwrap(),
        // Volume numbers: "Vol. 2", ", Volume 3"
        Regex::new(r"(?i)\s*,?\s*\bvol(?:ume|\.)?\s*\d+\b").unwrap(),
    ]
});

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition and
/// removing combining marks, then transliterating what is left.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a name for comparison: folds accents, lowercases, drops
/// punctuation and collapses whitespace. Empty input yields an empty string.
pub fn normalize(text: &str) -> String {
    let folded = fold_to_ascii(text);
    let stripped = NON_WORD.replace_all(&folded, "");
    MULTI_SPACE.replace_all(stripped.trim(), " ").to_string()
}

/// Extract the main artist from a collaboration credit.
/// e.g., "Daft Punk feat. Pharrell" → "daft punk", "Simon & Garfunkel" → "simon"
///
/// Returns the full normalized text when no marker matches.
pub fn extract_main_artist(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    for pattern in COLLABORATION_MARKERS.iter() {
        if let Some(caps) = pattern.captures(&lower) {
            let main = normalize(&caps[1]);
            if !main.is_empty() {
                return main;
            }
        }
    }
    normalize(&lower)
}

/// Normalize an album name for cross-release grouping.
/// Strips years, disc markers, remaster/deluxe/edition tags and volume numbers.
pub fn normalize_album_name(name: &str) -> String {
    let mut result = name.to_string();
    for pattern in ALBUM_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    normalize(&result)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("  The Beatles  "), "the beatles");
        assert_eq!(normalize("AC/DC"), "acdc");
        assert_eq!(normalize("Guns N' Roses"), "guns n roses");
        assert_eq!(normalize("Sigur   Rós"), "sigur ros");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in [
            "Beyoncé feat. JAY-Z",
            "  Héroes   del Silencio!! ",
            "½ Japanese",
            "Sigur Rós — ( ) [Live]",
            "кино",
            "tab\tand\nnewline",
            "",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_extract_main_artist() {
        assert_eq!(extract_main_artist("Artist Feat. Other"), "artist");
        assert_eq!(extract_main_artist("Drake featuring Rihanna"), "drake");
        assert_eq!(extract_main_artist("Drake ft. Rihanna"), "drake");
        assert_eq!(extract_main_artist("Bunbury con Vegas"), "bunbury");
        assert_eq!(extract_main_artist("Ana y Jaime"), "ana");
        assert_eq!(extract_main_artist("Hall and Oates"), "hall");
        assert_eq!(extract_main_artist("Simon & Garfunkel"), "simon");
        assert_eq!(extract_main_artist("Artist1 vs. Artist2"), "artist1");
        assert_eq!(extract_main_artist("Tiësto presents Allure"), "tiesto");
        assert_eq!(extract_main_artist("Radiohead"), "radiohead");
        assert_eq!(extract_main_artist(""), "");
    }

    #[test]
    fn test_extract_main_artist_marker_order() {
        // "feat." is tried before "&" even though "&" appears first
        assert_eq!(extract_main_artist("A & B feat. C"), "a b");
    }

    #[test]
    fn test_normalize_album_name() {
        assert_eq!(normalize_album_name("Album (2023 Remaster)"), normalize_album_name("Album"));
        assert_eq!(normalize_album_name("Abbey Road (1969)"), "abbey road");
        assert_eq!(normalize_album_name("Mellon Collie [Disc 2]"), "mellon collie");
        assert_eq!(normalize_album_name("Mellon Collie - CD 1"), "mellon collie");
        assert_eq!(normalize_album_name("Rumours (Deluxe Edition)"), "rumours");
        assert_eq!(normalize_album_name("Let It Be - Remastered 2009"), "let it be");
        assert_eq!(normalize_album_name("Ten [Remastered]"), "ten");
        assert_eq!(normalize_album_name("Greatest Hits Vol. 2"), "greatest hits");
        assert_eq!(normalize_album_name("OK Computer (Expanded Edition)"), "ok computer");
    }
}
