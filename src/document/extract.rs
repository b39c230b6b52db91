//! Extraction of scenario content from a parsed document.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{Document, Node};
use super::block::{CodeBlock, ExpectedOutput, Pattern};
use crate::error::{EngineError, EngineResult};

static EXPECTED_SIMILARITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<!--\s*expected_similarity\s*=\s*(?:(\d+(?:\.\d*)?)|"(.*)")\s*-->"#)
        .unwrap_or_else(|_| unreachable!("similarity pattern is valid"))
});

static VARIABLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?```variables(.*?)```")
        .unwrap_or_else(|_| unreachable!("variable block pattern is valid"))
});

/// A pending expected-output annotation.
#[derive(Default)]
struct Armed {
    similarity: f64,
    regex: Option<Pattern>,
}

impl Document {
    /// Text of the first level-1 heading.
    pub fn title(&self) -> EngineResult<String> {
        self.nodes
            .iter()
            .find_map(|node| match node {
                Node::Heading { level: 1, text } => Some(text.trim().to_string()),
                _ => None,
            })
            .filter(|title| !title.is_empty())
            .ok_or(EngineError::TitleNotFound)
    }

    /// Front matter as a property map. Malformed YAML yields an empty map.
    pub fn properties(&self) -> BTreeMap<String, serde_json::Value> {
        let Some(raw) = self.metadata.as_deref() else {
            return BTreeMap::new();
        };
        match serde_yaml::from_str::<Option<BTreeMap<String, serde_json::Value>>>(raw) {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed front matter");
                BTreeMap::new()
            }
        }
    }

    /// Fenced blocks whose language is in `languages`, in source order.
    ///
    /// An `<!-- expected_similarity=... -->` comment arms an expectation that
    /// the next fenced block with any other language fulfils. That block
    /// becomes the expected output of the most recent command. With no
    /// command yet, the expectation is kept armed.
    pub fn code_blocks(&self, languages: &[&str]) -> EngineResult<Vec<CodeBlock>> {
        let mut blocks: Vec<CodeBlock> = Vec::new();
        let mut header = String::new();
        let mut previous: Option<&Node> = None;
        let mut armed: Option<Armed> = None;

        for node in &self.nodes {
            match node {
                Node::Heading { text, .. } => {
                    header = text.trim().to_string();
                    previous = Some(node);
                }
                Node::Paragraph { .. } => previous = Some(node),
                Node::Html { content } => {
                    if let Some(annotation) = parse_annotation(content, armed.take())? {
                        armed = Some(annotation);
                    }
                }
                Node::FencedCode { language, content } => {
                    let description = match previous {
                        Some(Node::Paragraph { text }) => text.trim().to_string(),
                        _ => String::new(),
                    };
                    previous = Some(node);

                    if languages.contains(&language.as_str()) {
                        blocks.push(CodeBlock {
                            description,
                            ..CodeBlock::new(language.clone(), content.clone(), header.clone())
                        });
                    } else if let Some(last) = blocks.last_mut() {
                        if let Some(Armed { similarity, regex }) = armed.take() {
                            last.expected_output = Some(ExpectedOutput {
                                language: language.clone(),
                                content: content.clone(),
                                expected_similarity: similarity,
                                expected_regex: regex,
                            });
                        }
                    }
                }
            }
        }

        Ok(blocks)
    }

    /// Variables declared in a ```` ```variables ```` fence inside an HTML comment.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::new();
        for node in &self.nodes {
            let Node::Html { content } = node else {
                continue;
            };
            if let Some(captures) = VARIABLE_BLOCK.captures(content) {
                variables.extend(parse_export_lines(&captures[1]));
            }
        }
        variables
    }
}

/// Parse an expected-output annotation, merging into any already armed one.
fn parse_annotation(content: &str, current: Option<Armed>) -> EngineResult<Option<Armed>> {
    let Some(captures) = EXPECTED_SIMILARITY.captures(content) else {
        return Ok(current);
    };
    let mut armed = current.unwrap_or_default();

    if let Some(score) = captures.get(1) {
        armed.similarity = score.as_str().parse().unwrap_or(0.0);
        tracing::debug!(score = armed.similarity, "found expected similarity");
    } else if let Some(pattern) = captures.get(2) {
        let pattern = pattern.as_str();
        if pattern.is_empty() {
            return Err(EngineError::InvalidExpectedOutput {
                pattern: String::new(),
                reason: "empty pattern".to_string(),
            });
        }
        let compiled = Pattern::new(pattern).map_err(|e| EngineError::InvalidExpectedOutput {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(pattern, "found expected regex");
        armed.regex = Some(compiled);
    }

    Ok(Some(armed))
}

/// Parse `export KEY=VALUE` lines. Other lines are ignored.
fn parse_export_lines(block: &str) -> BTreeMap<String, String> {
    block
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("export")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let (key, value) = rest.trim_start().split_once('=')?;
            Some((key.trim().to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}
