//! Output verification.
//!
//! Decides whether a command's actual output satisfies its expected output.
//! Regex contracts are pass/fail; JSON output is normalized and compared
//! with Jaro similarity; anything else uses Jaro-Winkler.

use crate::document::ExpectedOutput;
use crate::error::EngineError;

/// Jaro-Winkler boost threshold.
const BOOST_THRESHOLD: f64 = 0.7;

/// Maximum common prefix length rewarded by Jaro-Winkler.
const PREFIX_LENGTH: usize = 4;

/// Result of checking output against an expectation.
#[derive(Debug)]
pub struct Comparison {
    /// Similarity score; always 0.0 for regex contracts
    pub score: f64,
    pub outcome: Result<(), EngineError>,
}

impl Comparison {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Compare `actual` output with `expected`.
pub fn compare(actual: &str, expected: &ExpectedOutput) -> Comparison {
    if let Some(ref pattern) = expected.expected_regex {
        let outcome = if pattern.is_match(actual) {
            Ok(())
        } else {
            Err(EngineError::OutputRegexMismatch {
                pattern: pattern.as_str().to_string(),
                actual: actual.to_string(),
            })
        };
        return Comparison { score: 0.0, outcome };
    }

    let threshold = expected.expected_similarity;

    if expected.language.eq_ignore_ascii_case("json") {
        let (expected_json, actual_json) =
            match (normalize_json(&expected.content), normalize_json(actual)) {
                (Ok(e), Ok(a)) => (e, a),
                (Err(e), _) | (_, Err(e)) => {
                    return Comparison { score: 0.0, outcome: Err(EngineError::OutputNotJson(e)) };
                }
            };
        let score = strsim::jaro(&expected_json, &actual_json);
        tracing::debug!(score, threshold, "compared JSON output");
        return Comparison {
            score,
            outcome: threshold_outcome(score, threshold, expected_json, actual_json),
        };
    }

    let score = jaro_winkler(&expected.content, actual, BOOST_THRESHOLD, PREFIX_LENGTH);
    tracing::debug!(score, threshold, "compared output");
    Comparison {
        score,
        outcome: threshold_outcome(score, threshold, expected.content.clone(), actual.to_string()),
    }
}

fn threshold_outcome(score: f64, threshold: f64, expected: String, actual: String) -> Result<(), EngineError> {
    if score >= threshold {
        Ok(())
    } else {
        Err(EngineError::OutputSimilarityBelowThreshold { threshold, score, expected, actual })
    }
}

/// Re-serialize JSON with object keys sorted.
fn normalize_json(text: &str) -> Result<String, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    serde_json::to_string(&value).map_err(|e| e.to_string())
}

/// Jaro-Winkler similarity with a configurable boost threshold and prefix length.
///
/// The prefix bonus only applies when the Jaro score reaches `boost_threshold`.
pub fn jaro_winkler(a: &str, b: &str, boost_threshold: f64, prefix_length: usize) -> f64 {
    let jaro = strsim::jaro(a, b);
    if jaro < boost_threshold {
        return jaro;
    }
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(prefix_length)
        .take_while(|(x, y)| x == y)
        .count();
    jaro + (prefix as f64 * 0.1 * (1.0 - jaro))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Pattern;

    fn expected(language: &str, content: &str, similarity: f64, regex: Option<&str>) -> ExpectedOutput {
        ExpectedOutput {
            language: language.to_string(),
            content: content.to_string(),
            expected_similarity: similarity,
            expected_regex: regex.map(|r| Pattern::new(r).unwrap()),
        }
    }

    #[test]
    fn test_exact_text_passes() {
        let result = compare("Hello, World!", &expected("text", "Hello, World!", 0.9, None));
        assert!(result.passed());
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_text_fails_with_score() {
        let result = compare("Goodbye", &expected("text", "Hello, World!", 0.9, None));
        assert!(result.score < 0.9);
        assert!(matches!(
            result.outcome,
            Err(EngineError::OutputSimilarityBelowThreshold { .. })
        ));
    }

    #[test]
    fn test_regex_ignores_threshold() {
        let contract = expected("text", "completely different", 1.0, Some(r"id-\d+"));
        let result = compare("created resource id-42 in 3s", &contract);
        assert!(result.passed());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_regex_mismatch() {
        let result = compare("nothing here", &expected("text", "", 0.0, Some(r"^ok$")));
        assert!(matches!(result.outcome, Err(EngineError::OutputRegexMismatch { .. })));
    }

    #[test]
    fn test_json_key_order_irrelevant() {
        let result = compare(r#"{"b":2,"a":1}"#, &expected("json", r#"{"a":1,"b":2}"#, 1.0, None));
        assert!(result.passed());
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_language_case_insensitive() {
        let result = compare("{\n  \"a\": [1, 2]\n}", &expected("JSON", r#"{"a":[1,2]}"#, 1.0, None));
        assert!(result.passed());
    }

    #[test]
    fn test_malformed_json() {
        let result = compare("not json", &expected("json", r#"{"a":1}"#, 0.0, None));
        assert!(matches!(result.outcome, Err(EngineError::OutputNotJson(_))));
        let result = compare(r#"{"a":1}"#, &expected("json", "{broken", 0.0, None));
        assert!(matches!(result.outcome, Err(EngineError::OutputNotJson(_))));
    }

    #[test]
    fn test_jaro_winkler_prefix_boost() {
        let jaro = strsim::jaro("MARTHA", "MARHTA");
        let jw = jaro_winkler("MARTHA", "MARHTA", 0.7, 4);
        assert!((jw - (jaro + 3.0 * 0.1 * (1.0 - jaro))).abs() < 1e-9);
        assert!((jw - 0.961).abs() < 0.001);
    }

    #[test]
    fn test_jaro_winkler_no_boost_below_threshold() {
        let jaro = strsim::jaro("abwxyzuv", "abqrstmn");
        assert!(jaro < 0.7);
        assert_eq!(jaro_winkler("abwxyzuv", "abqrstmn", 0.7, 4), jaro);
        assert_eq!(jaro_winkler("abc", "xyz", 0.7, 4), 0.0);
    }
}
