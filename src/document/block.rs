//! Code blocks and their expected-output contracts.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

/// A compiled expected-output pattern.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What a command's output is expected to look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedOutput {
    /// Language of the expected block; `json` selects JSON comparison
    pub language: String,
    pub content: String,
    /// Minimum similarity score in `[0, 1]`
    pub expected_similarity: f64,
    /// When present, the output must match this pattern and the score is ignored
    pub expected_regex: Option<Pattern>,
}

/// A fenced code block extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    /// Text of the closest preceding heading
    pub header: String,
    /// Paragraph directly before the block
    pub description: String,
    pub expected_output: Option<ExpectedOutput>,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, content: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            content: content.into(),
            header: header.into(),
            description: String::new(),
            expected_output: None,
        }
    }
}
