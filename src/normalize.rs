//! Title normalization for grouping catalog entries.
//!
//! Re-releases, remasters, and regional variants of the same song carry
//! decorated titles ("Supersonic - Remastered 2014", "Wonderwall (Live at
//! Wembley)"). Normalization strips the packaging noise while keeping the
//! words that mark a genuinely different recording, so the clusterer can key
//! on the result.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Featuring annotations (applied in order): "(feat. X)", "[ft. X]",
/// "{featuring X}", "- feat. X".
static FEAT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s*[\(\[\{]\s*feat\.?[^\)\]\}]*[\)\]\}]").unwrap(),
        Regex::new(r"(?i)\s*[\(\[\{]\s*ft\.?[^\)\]\}]*[\)\]\}]").unwrap(),
        Regex::new(r"(?i)\s*[\(\[\{]\s*featuring[^\)\]\}]*[\)\]\}]").unwrap(),
        Regex::new(r"(?i)\s*-\s*feat\.?.*$").unwrap(),
        Regex::new(r"(?i)\s*-\s*ft\.?.*$").unwrap(),
        Regex::new(r"(?i)\s*-\s*featuring.*$").unwrap(),
    ]
});

/// Parenthesized release year: "(2014)", "[1997]".
static PAREN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[\{]\s*\d{4}\s*[\)\]\}]").unwrap());

/// Standalone 4-digit token in [1000, 2099] anywhere in the title, treated as
/// a release-year annotation even without enclosing punctuation. Aggressive:
/// it also eats legitimate numeric titles, which then fall back to the
/// lowercased original.
static BARE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[0-9]{3}|20[0-9]{2})\b").unwrap());

// ============================================================================
// TOKEN SETS
// ============================================================================

/// Version words that denote a truly different recording/performance. Kept.
pub const DISTINCT_VERSIONS: &[&str] = &[
    "live",
    "acoustic",
    "remix",
    "mix",
    "edit",
    "instrumental",
    "karaoke",
    "demo",
    "outtake",
    "reprise",
    "cover",
    "unplugged",
    "orchestral",
    "cappella",
    "acapella",
    "stripped",
    "strings",
    "session",
    "rehearsal",
    "bootleg",
    "alternate",
];

/// Version words that denote the same recording, just repackaged. Dropped.
pub const SAME_RECORDING: &[&str] = &[
    "remastered",
    "remaster",
    "remastering",
    "deluxe",
    "explicit",
    "clean",
    "album",
    "version",
    "single",
    "original",
    "standard",
    "film",
    "edition",
    "anniversary",
    "expanded",
    "extended",
    "bonus",
    "special",
    "collectors",
    "collector",
    "limited",
    "radio",
    "digital",
    "vinyl",
    "cd",
    "stereo",
    "mono",
];

// ============================================================================
// NORMALIZER
// ============================================================================

/// Normalizes raw track titles into grouping keys. The token tables are
/// immutable configuration so tests can run with alternate sets.
#[derive(Clone, Debug)]
pub struct TitleNormalizer {
    distinct_versions: FxHashSet<String>,
    same_recording: FxHashSet<String>,
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::with_tables(
            DISTINCT_VERSIONS.iter().copied(),
            SAME_RECORDING.iter().copied(),
        )
    }
}

impl TitleNormalizer {
    pub fn with_tables<'a>(
        distinct: impl IntoIterator<Item = &'a str>,
        same: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            distinct_versions: distinct.into_iter().map(String::from).collect(),
            same_recording: same.into_iter().map(String::from).collect(),
        }
    }

    /// Normalize a track title into its grouping key.
    ///
    /// Deterministic and total: a non-empty title never maps to an empty key
    /// (the lowercased original is the fallback when stripping consumes
    /// everything).
    ///
    /// Examples:
    ///   "Supersonic - Remastered"       -> "supersonic"
    ///   "Wonderwall (Live at Wembley)"  -> "wonderwall live at wembley"
    ///   "Champagne Supernova (Deluxe)"  -> "champagne supernova"
    pub fn normalize(&self, title: &str) -> String {
        if title.is_empty() {
            return String::new();
        }

        // Unicode-aware case folding: NFKD decomposition + lowercase.
        let mut result: String = title.nfkd().collect::<String>().to_lowercase();

        for pattern in FEAT_PATTERNS.iter() {
            result = pattern.replace_all(&result, "").into_owned();
        }

        result = PAREN_YEAR.replace_all(&result, "").into_owned();
        result = BARE_YEAR.replace_all(&result, "").into_owned();

        result.retain(|c| !c.is_ascii_punctuation());

        let words: Vec<&str> = result.split_whitespace().collect();
        if words.is_empty() {
            return title.to_lowercase();
        }

        let kept: Vec<&str> = words
            .into_iter()
            .filter(|w| self.distinct_versions.contains(*w) || !self.same_recording.contains(*w))
            .collect();

        if kept.is_empty() {
            title.to_lowercase()
        } else {
            kept.join(" ")
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(title: &str) -> String {
        TitleNormalizer::default().normalize(title)
    }

    #[test]
    fn strips_repackaging_suffixes() {
        assert_eq!(norm("Supersonic - Remastered"), "supersonic");
        assert_eq!(norm("Wonderwall - Deluxe Edition"), "wonderwall");
        assert_eq!(norm("Champagne Supernova (Deluxe)"), "champagne supernova");
        assert_eq!(norm("Some Song (Radio Edit)"), "some song edit");
    }

    #[test]
    fn remaster_year_matches_plain_title() {
        assert_eq!(norm("Song Title - Remastered 2011"), norm("Song Title"));
    }

    #[test]
    fn keeps_distinct_version_words() {
        // The feature annotation goes, "live" stays.
        assert_eq!(norm("Song (feat. X) - Live"), "song live");
        assert_eq!(norm("Wonderwall (Live at Wembley)"), "wonderwall live at wembley");
        assert_eq!(norm("Torn (Acoustic Version)"), "torn acoustic");
    }

    #[test]
    fn strips_feature_annotations() {
        assert_eq!(norm("Song (feat. Someone)"), "song");
        assert_eq!(norm("Song [ft. Someone]"), "song");
        assert_eq!(norm("Song {featuring Someone}"), "song");
        assert_eq!(norm("Song - feat. Someone"), "song");
    }

    #[test]
    fn strips_years_anywhere() {
        assert_eq!(norm("Anthem (1997)"), "anthem");
        assert_eq!(norm("Anthem 1997 Tour"), "anthem tour");
        // 4-digit numbers outside [1000, 2099] are not years.
        assert_eq!(norm("Route 6000"), "route 6000");
    }

    #[test]
    fn numeric_title_falls_back_to_lowercased_original() {
        // Everything is stripped as a year, so the key falls back.
        assert_eq!(norm("1979"), "1979");
        assert_eq!(norm("2011 (Remastered)"), "2011 (remastered)");
    }

    #[test]
    fn empty_title_yields_empty_key() {
        assert_eq!(norm(""), "");
    }

    #[test]
    fn case_folds_unicode() {
        assert_eq!(norm("CAFÉ DEL MAR"), norm("Café Del Mar"));
    }

    #[test]
    fn idempotent() {
        let normalizer = TitleNormalizer::default();
        for title in [
            "Song Title - Remastered 2011",
            "Song (feat. X) - Live",
            "Wonderwall (Live at Wembley)",
            "1979",
            "Don't Look Back in Anger - Single Version",
            "Plain Title",
        ] {
            let once = normalizer.normalize(title);
            assert_eq!(normalizer.normalize(&once), once, "title: {title}");
        }
    }

    #[test]
    fn alternate_tables_change_partition() {
        // With "live" declared a repackaging word it gets dropped.
        let normalizer = TitleNormalizer::with_tables(["remix"], ["live"]);
        assert_eq!(normalizer.normalize("Song (Live)"), "song");
        assert_eq!(normalizer.normalize("Song Remix"), "song remix");
    }
}
