//! Resolving markdown sources and their sibling variable files.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Whether `path` names a remote document.
pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Read a local file or fetch a URL.
pub fn resolve_source(path: &str) -> EngineResult<String> {
    if is_remote(path) {
        return fetch_remote(path);
    }

    let local = Path::new(path);
    if !local.is_file() {
        return Err(EngineError::SourceUnavailable {
            source_path: path.to_string(),
            reason: "file does not exist".to_string(),
        });
    }
    std::fs::read_to_string(local).map_err(|e| EngineError::SourceUnavailable {
        source_path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(feature = "remote")]
fn fetch_remote(url: &str) -> EngineResult<String> {
    let unavailable = |reason: String| EngineError::SourceUnavailable {
        source_path: url.to_string(),
        reason,
    };

    tracing::info!(url, "fetching remote markdown");
    let response = reqwest::blocking::get(url).map_err(|e| unavailable(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(unavailable(format!("HTTP {status}")));
    }
    response.text().map_err(|e| unavailable(e.to_string()))
}

#[cfg(not(feature = "remote"))]
fn fetch_remote(url: &str) -> EngineResult<String> {
    Err(EngineError::SourceUnavailable {
        source_path: url.to_string(),
        reason: "remote documents require the `remote` feature".to_string(),
    })
}

/// Variables from the `.ini` file next to a local document.
///
/// Sections are flattened. A missing file yields an empty map.
pub fn sibling_variables(path: &str) -> BTreeMap<String, String> {
    if is_remote(path) {
        return BTreeMap::new();
    }
    let ini = Path::new(path).with_extension("ini");
    match std::fs::read_to_string(&ini) {
        Ok(content) => {
            tracing::debug!(path = %ini.display(), "loaded sibling variables");
            parse_ini(&content)
        }
        Err(_) => BTreeMap::new(),
    }
}

/// Parse flat `key = value` pairs, skipping sections and comments.
pub fn parse_ini(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', ';', '[']))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = resolve_source("/definitely/not/here.md").unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Hi\n").unwrap();
        assert_eq!(resolve_source(path.to_str().unwrap()).unwrap(), "# Hi\n");
    }

    #[test]
    fn test_parse_ini() {
        let vars = parse_ini("; comment\n[section]\nRG = my-rg\nLOCATION=\"eastus\"\nnot a pair\n");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["RG"], "my-rg");
        assert_eq!(vars["LOCATION"], "eastus");
    }

    #[test]
    fn test_sibling_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("guide.md");
        std::fs::write(dir.path().join("guide.ini"), "NAME=value\n").unwrap();
        let vars = sibling_variables(doc.to_str().unwrap());
        assert_eq!(vars["NAME"], "value");

        assert!(sibling_variables(dir.path().join("other.md").to_str().unwrap()).is_empty());
    }
}
