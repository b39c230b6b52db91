//! Persisted environment state.
//!
//! Every command dumps its final environment into a state file so that the
//! next, otherwise isolated, shell invocation can pick up exported variables.
//! The file holds one `KEY="VALUE"` pair per line.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineResult;

/// Default location of the state file.
pub const DEFAULT_STATE_FILE: &str = "/tmp/env-vars";

static VALID_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap_or_else(|_| unreachable!("key pattern is valid"))
});

/// Whether `key` is a valid shell identifier.
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY.is_match(key)
}

/// Handle to the on-disk environment state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvState {
    path: PathBuf,
}

impl Default for EnvState {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl EnvState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the state file, dropping keys that are not shell identifiers.
    ///
    /// A missing file yields an empty map.
    pub fn load(&self) -> EngineResult<BTreeMap<String, String>> {
        if !self.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(parse_state(&content))
    }

    /// Rewrite the file keeping only valid keys, each quoted.
    pub fn clean(&self) -> EngineResult<()> {
        let vars = self.load()?;
        self.save(&vars)
    }

    pub fn save(&self, vars: &BTreeMap<String, String>) -> EngineResult<()> {
        fs::write(&self.path, render_state(vars))?;
        Ok(())
    }

    /// Remove the state file. Deleting a missing file is not an error.
    pub fn delete(&self) -> EngineResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse `KEY=VALUE` lines as written by `env` or by [`render_state`].
///
/// Lines without `=` (continuation lines of multi-line values) are skipped.
pub fn parse_state(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if !is_valid_key(key) {
            tracing::debug!(key, "dropping invalid environment key");
            continue;
        }
        vars.insert(key.to_string(), unquote(value).to_string());
    }
    vars
}

pub fn render_state(vars: &BTreeMap<String, String>) -> String {
    vars.iter().map(|(k, v)| format!("{k}=\"{v}\"\n")).collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
