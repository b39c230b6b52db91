//! Textual rewriting of `export KEY=VALUE` statements.
//!
//! Overrides are applied to the command text itself so that the executed
//! script and the rendered script stay identical. A regex finds the
//! `export KEY=` anchor; the value after it is measured by a small scanner
//! that follows quoting and nested `$(...)`, `$((...))` and `${...}`.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::document::CodeBlock;

/// Build the pattern matching the statement prefix up to and including `=`.
fn export_pattern(key: &str) -> Regex {
    let pattern = format!(r"(?m)(?:^|[\s;&|(])export\s+{}=", regex::escape(key));
    Regex::new(&pattern).unwrap_or_else(|_| unreachable!("escaped export pattern is valid"))
}

/// End of the shell word starting at `start`.
fn word_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        i = match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' | b';' | b'&' | b'|' | b'(' | b')' | b'<' | b'>' => return i,
            _ => skip_unit(bytes, i),
        };
    }
    bytes.len()
}

/// Skip one lexical unit at `i`: an escape, a quoted span, an expansion or a byte.
fn skip_unit(bytes: &[u8], i: usize) -> usize {
    match (bytes[i], bytes.get(i + 1).copied()) {
        (b'\\', _) => (i + 2).min(bytes.len()),
        (b'\'', _) => bytes[i + 1..].iter().position(|&b| b == b'\'').map_or(bytes.len(), |p| i + p + 2),
        (b'"', _) => double_quoted_end(bytes, i + 1),
        (b'`', _) => backtick_end(bytes, i + 1),
        (b'$', Some(b'(')) => group_end(bytes, i + 2, b'(', b')'),
        (b'$', Some(b'{')) => group_end(bytes, i + 2, b'{', b'}'),
        _ => i + 1,
    }
}

fn double_quoted_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        i = match (bytes[i], bytes.get(i + 1).copied()) {
            (b'"', _) => return i + 1,
            (b'\\', _) => (i + 2).min(bytes.len()),
            (b'`', _) => backtick_end(bytes, i + 1),
            (b'$', Some(b'(')) => group_end(bytes, i + 2, b'(', b')'),
            (b'$', Some(b'{')) => group_end(bytes, i + 2, b'{', b'}'),
            _ => i + 1,
        };
    }
    bytes.len()
}

fn backtick_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        i = match bytes[i] {
            b'`' => return i + 1,
            b'\\' => (i + 2).min(bytes.len()),
            _ => i + 1,
        };
    }
    bytes.len()
}

/// End of a group whose opener precedes `i`, counting nested `open`/`close`.
fn group_end(bytes: &[u8], mut i: usize, open: u8, close: u8) -> usize {
    let mut depth = 1usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == close {
            depth -= 1;
            if depth == 0 {
                return i + 1;
            }
            i += 1;
        } else if b == open {
            depth += 1;
            i += 1;
        } else {
            i = skip_unit(bytes, i);
        }
    }
    bytes.len()
}

/// Double-quote `value`, escaping everything the shell expands inside quotes.
pub fn double_quoted(value: &str) -> String {
    let escaped = value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`");
    format!("\"{escaped}\"")
}

/// Quote `value` for the shell if it is not a plain word.
pub fn shell_value(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@%+,=".contains(c));
    if plain {
        value.to_string()
    } else {
        double_quoted(value)
    }
}

/// Replace the value of the first `export key=...` in `content`.
///
/// Returns `None` when `content` has no assignment to `key`.
pub fn rewrite_export(content: &str, key: &str, value: &str) -> Option<String> {
    let anchor = export_pattern(key).find(content)?;
    let end = word_end(content.as_bytes(), anchor.end());
    let mut rewritten = String::with_capacity(content.len() + value.len());
    rewritten.push_str(&content[..anchor.end()]);
    rewritten.push_str(&shell_value(value));
    rewritten.push_str(&content[end..]);
    Some(rewritten)
}

/// Replace the value of every `export key=...` in `content`.
///
/// An assignment nested inside a value that is being replaced goes with it.
pub fn rewrite_all_exports(content: &str, key: &str, value: &str) -> String {
    let replacement = shell_value(value);
    let bytes = content.as_bytes();
    let mut rewritten = String::with_capacity(content.len());
    let mut cursor = 0;
    for anchor in export_pattern(key).find_iter(content) {
        if anchor.start() < cursor {
            continue;
        }
        rewritten.push_str(&content[cursor..anchor.end()]);
        rewritten.push_str(&replacement);
        cursor = word_end(bytes, anchor.end());
    }
    rewritten.push_str(&content[cursor..]);
    rewritten
}

/// Apply every override to every block.
///
/// Returns the keys that had no `export` statement anywhere.
pub fn apply_overrides(
    blocks: &mut [CodeBlock],
    overrides: &BTreeMap<String, String>,
) -> BTreeSet<String> {
    let mut leftover = BTreeSet::new();
    for (key, value) in overrides {
        let mut found = false;
        for block in blocks.iter_mut() {
            if let Some(rewritten) = rewrite_export(&block.content, key, value) {
                tracing::debug!(key, header = %block.header, "rewrote export");
                block.content = rewritten;
                found = true;
            }
        }
        if !found {
            leftover.insert(key.clone());
        }
    }
    leftover
}

/// Build the block that exports overrides the document never assigns.
pub fn leftover_block(keys: &BTreeSet<String>, overrides: &BTreeMap<String, String>) -> Option<CodeBlock> {
    if keys.is_empty() {
        return None;
    }
    let content: String = keys
        .iter()
        .filter_map(|key| overrides.get(key).map(|value| format!("export {key}={}\n", double_quoted(value))))
        .collect();
    Some(CodeBlock::new("bash", content, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_export() {
        assert_eq!(
            rewrite_export("export MY_VAR=default\n", "MY_VAR", "my_value").as_deref(),
            Some("export MY_VAR=my_value\n")
        );
    }

    #[test]
    fn test_chained_with_and() {
        let content = "export NEXT_VAR=1 && export OTHER_VAR=\"Hello, World!\"";
        assert_eq!(
            rewrite_export(content, "NEXT_VAR", "next_value").as_deref(),
            Some("export NEXT_VAR=next_value && export OTHER_VAR=\"Hello, World!\"")
        );
    }

    #[test]
    fn test_chained_with_semicolon() {
        let content = "export THIS_VAR=a ; export THAT_VAR=b";
        let once = rewrite_export(content, "THIS_VAR", "this_value").unwrap();
        let twice = rewrite_export(&once, "THAT_VAR", "that_value").unwrap();
        assert_eq!(twice, "export THIS_VAR=this_value ; export THAT_VAR=that_value");
    }

    #[test]
    fn test_no_space_semicolon() {
        assert_eq!(
            rewrite_export("export A=1;export B=2", "B", "3").as_deref(),
            Some("export A=1;export B=3")
        );
    }

    #[test]
    fn test_subshell_value() {
        let content = "export SUBSHELL_VARIABLE=$(az group show --name rg --query id -o tsv)\necho done";
        assert_eq!(
            rewrite_export(content, "SUBSHELL_VARIABLE", "subshell_value").as_deref(),
            Some("export SUBSHELL_VARIABLE=subshell_value\necho done")
        );
    }

    #[test]
    fn test_variable_reference_value() {
        let content = "export VAR1=x\nexport VAR2=${VAR1}-suffix\n";
        assert_eq!(
            rewrite_export(content, "VAR2", "var2_value").as_deref(),
            Some("export VAR1=x\nexport VAR2=var2_value\n")
        );
    }

    #[test]
    fn test_quoted_values() {
        assert_eq!(
            rewrite_export("export NAME='a b' && echo", "NAME", "c").as_deref(),
            Some("export NAME=c && echo")
        );
        assert_eq!(
            rewrite_export("export NAME=\"a \\\"b\\\"\"\n", "NAME", "c").as_deref(),
            Some("export NAME=c\n")
        );
    }

    #[test]
    fn test_override_needing_quotes() {
        assert_eq!(
            rewrite_export("export LOCATION=eastus", "LOCATION", "east us").as_deref(),
            Some("export LOCATION=\"east us\"")
        );
    }

    #[test]
    fn test_prefix_key_not_matched() {
        assert!(rewrite_export("export MY_VAR_2=x", "MY_VAR", "y").is_none());
        assert!(rewrite_export("export XMY_VAR=x", "MY_VAR", "y").is_none());
        assert!(rewrite_export("echo export_MY_VAR=x", "MY_VAR", "y").is_none());
    }

    #[test]
    fn test_only_first_assignment() {
        assert_eq!(
            rewrite_export("export A=1\nexport A=2\n", "A", "9").as_deref(),
            Some("export A=9\nexport A=2\n")
        );
    }

    #[test]
    fn test_rewrite_all_exports() {
        let markdown = "```bash\nexport A=1\n```\n\n```bash\nexport A=$(date) && echo $A\n```\n";
        assert_eq!(
            rewrite_all_exports(markdown, "A", "fixed"),
            "```bash\nexport A=fixed\n```\n\n```bash\nexport A=fixed && echo $A\n```\n"
        );
    }

    #[test]
    fn test_apply_overrides_tracks_leftovers() {
        let mut blocks = vec![
            CodeBlock::new("bash", "export RG=default-rg\n", "Setup"),
            CodeBlock::new("bash", "az group create -n $RG\n", "Create"),
        ];
        let overrides = BTreeMap::from([
            ("RG".to_string(), "my-rg".to_string()),
            ("EXTRA".to_string(), "value".to_string()),
        ]);

        let leftover = apply_overrides(&mut blocks, &overrides);

        assert_eq!(blocks[0].content, "export RG=my-rg\n");
        assert_eq!(blocks[1].content, "az group create -n $RG\n");
        assert_eq!(leftover, BTreeSet::from(["EXTRA".to_string()]));

        let block = leftover_block(&leftover, &overrides).unwrap();
        assert_eq!(block.content, "export EXTRA=\"value\"\n");
        assert_eq!(block.header, "");
        assert_eq!(block.language, "bash");
    }

    #[test]
    fn test_no_leftover_block_when_all_matched() {
        assert!(leftover_block(&BTreeSet::new(), &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_nested_command_substitution() {
        assert_eq!(
            rewrite_export("export X=$(echo $(date)) && echo ok", "X", "v").as_deref(),
            Some("export X=v && echo ok")
        );
    }

    #[test]
    fn test_arithmetic_expansion() {
        assert_eq!(
            rewrite_export("export PORT=$((RANDOM % 1000))\n", "PORT", "8080").as_deref(),
            Some("export PORT=8080\n")
        );
    }

    #[test]
    fn test_default_expansion_with_quoted_brace() {
        assert_eq!(
            rewrite_export("export NAME=${PREFIX:-\"a}b\"}-x; echo $NAME", "NAME", "n").as_deref(),
            Some("export NAME=n; echo $NAME")
        );
        assert_eq!(
            rewrite_export("export NAME=${A:-${B}}\n", "NAME", "n").as_deref(),
            Some("export NAME=n\n")
        );
    }

    #[test]
    fn test_operators_inside_subshell() {
        let content = "export IDS=$(az vm list | jq -r '.[].id' && echo; true) | tee out";
        assert_eq!(
            rewrite_export(content, "IDS", "ids").as_deref(),
            Some("export IDS=ids | tee out")
        );
    }

    #[test]
    fn test_double_quoted_subshell_with_inner_quotes() {
        assert_eq!(
            rewrite_export("export MSG=\"$(echo \"a) b\")\" && echo", "MSG", "m").as_deref(),
            Some("export MSG=m && echo")
        );
    }

    #[test]
    fn test_backtick_value() {
        assert_eq!(
            rewrite_export("export NOW=`date +%s`;echo", "NOW", "1").as_deref(),
            Some("export NOW=1;echo")
        );
    }

    #[test]
    fn test_rewrite_all_skips_nested_assignment() {
        assert_eq!(
            rewrite_all_exports("export A=$(export A=1; echo $A)\nexport A=2", "A", "z"),
            "export A=z\nexport A=z"
        );
    }

    #[test]
    fn test_leftover_values_are_escaped() {
        let overrides = BTreeMap::from([("K".to_string(), "a\"b $HOME `x` \\n".to_string())]);
        let keys = BTreeSet::from(["K".to_string()]);
        let block = leftover_block(&keys, &overrides).unwrap();
        assert_eq!(block.content, "export K=\"a\\\"b \\$HOME \\`x\\` \\\\n\"\n");
    }

    #[test]
    fn test_escaped_values_reach_the_shell_unchanged() {
        let values = ["a\"b $HOME", "back\\slash", "`uname`", "it's", "plain"];
        for value in values {
            let overrides = BTreeMap::from([("K".to_string(), value.to_string())]);
            let keys = BTreeSet::from(["K".to_string()]);
            let block = leftover_block(&keys, &overrides).unwrap();
            let rewritten = rewrite_export("export K=old\n", "K", value).unwrap();

            for script in [block.content, rewritten] {
                let output = std::process::Command::new("bash")
                    .arg("-c")
                    .arg(format!("{script}printf %s \"$K\""))
                    .output()
                    .unwrap();
                assert_eq!(String::from_utf8_lossy(&output.stdout), value, "script: {script}");
            }
        }
    }
}
