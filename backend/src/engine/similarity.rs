//! Per-rule similarity scoring.
//!
//! Every cell is string-cast (see [`Value`]'s `Display`) and, unless the rule
//! is case sensitive, lowercased before comparison. Scores are always in
//! `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::models::Value;
use crate::rules::MatchType;

/// Similarity function used by fuzzy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyScorer {
    /// `rapidfuzz::fuzz::ratio`, normalized InDel similarity.
    #[default]
    Ratio,
    /// `strsim::normalized_levenshtein`
    Levenshtein,
    /// `strsim::jaro_winkler`
    JaroWinkler,
}

impl FuzzyScorer {
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Self::Ratio => ratio(a, b),
            Self::Levenshtein => strsim::normalized_levenshtein(a, b),
            Self::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }
}

/// String form of a cell as seen by a rule.
pub fn normalize(value: &Value, case_sensitive: bool) -> String {
    let text = value.to_string();
    if case_sensitive {
        text
    } else {
        text.to_lowercase()
    }
}

/// Score two already normalized strings.
pub fn score(match_type: MatchType, scorer: FuzzyScorer, a: &str, b: &str) -> f64 {
    match match_type {
        MatchType::Exact => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
        MatchType::Fuzzy => scorer.score(a, b),
    }
}

/// Normalized InDel similarity over chars, `2 * lcs / (len_a + len_b)`.
///
/// Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}
