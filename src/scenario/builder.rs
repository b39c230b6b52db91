//! Building scenarios from markdown.

use std::collections::BTreeMap;
use std::path::Path;

use super::rewrite::{apply_overrides, leftover_block};
use super::schema::{group_into_steps, Scenario};
use super::source::{resolve_source, sibling_variables};
use crate::document::Document;
use crate::error::{EngineError, EngineResult};

impl Scenario {
    /// Build a scenario from a local path or URL.
    pub fn from_path(
        path: &str,
        languages: &[&str],
        overrides: &BTreeMap<String, String>,
    ) -> EngineResult<Self> {
        let markdown = resolve_source(path)?;
        let baseline = sibling_variables(path);
        Self::from_markdown(markdown, &fallback_name(path), languages, baseline, overrides)
    }

    /// Build a scenario from markdown text.
    ///
    /// The environment is `baseline`, then variables declared in the
    /// document, then `overrides`. Overrides are also written into the
    /// matching `export` statements; keys never exported by the document are
    /// exported by a synthesized first block.
    pub fn from_markdown(
        markdown: String,
        fallback_name: &str,
        languages: &[&str],
        baseline: BTreeMap<String, String>,
        overrides: &BTreeMap<String, String>,
    ) -> EngineResult<Self> {
        let document = Document::parse(&markdown);

        let name = match document.title() {
            Ok(title) => title,
            Err(EngineError::TitleNotFound) => {
                tracing::warn!(fallback = fallback_name, "no title heading, using fallback name");
                fallback_name.to_string()
            }
            Err(e) => return Err(e),
        };

        let mut environment = baseline;
        environment.extend(document.variables());
        environment.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut blocks = document.code_blocks(languages)?;
        let leftover = apply_overrides(&mut blocks, overrides);
        if let Some(block) = leftover_block(&leftover, overrides) {
            blocks.insert(0, block);
        }

        let steps = group_into_steps(blocks);
        tracing::info!(name, steps = steps.len(), "built scenario");

        Ok(Self { name, steps, environment, markdown, properties: document.properties() })
    }
}

fn fallback_name(path: &str) -> String {
    Path::new(path.trim_end_matches('/'))
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
