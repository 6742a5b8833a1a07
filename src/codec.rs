//! Text forms of a variable list: `.env` lines, shell `export` blocks and
//! `KEY=VALUE` pairs scraped out of arbitrary shell startup files.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::model::{EnvProfile, EnvVariable};

static SHELL_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("static regex is valid")
});

/// Join variables as `KEY=VALUE` lines in list order.
///
/// Values are written verbatim. A value containing a newline will not survive
/// [`decode_env_file`].
pub fn encode_env_file(variables: &[EnvVariable]) -> String {
    variables
        .iter()
        .map(|v| format!("{}={}", v.key, v.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse `.env` text. Splits each line on the first `=`; lines without one,
/// blank lines, and `#` comments are dropped.
pub fn decode_env_file(text: &str) -> Vec<EnvVariable> {
    text.split('\n')
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(EnvVariable::new(key, value.trim()))
        })
        .collect()
}

pub fn block_header(label: &str, at: DateTime<Utc>) -> String {
    format!(
        "# ----- {label} ({}) -----",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

pub fn block_footer(label: &str) -> String {
    format!("# ----- End {label} -----")
}

/// Render a profile as a delimited block of `export` lines.
///
/// Only `"` is escaped. The block ends with a newline.
pub fn encode_shell_block(profile: &EnvProfile, label: &str, at: DateTime<Utc>) -> String {
    let mut block = block_header(label, at);
    block.push('\n');
    for var in &profile.variables {
        block.push_str(&format!(
            "export {}=\"{}\"\n",
            var.key,
            var.value.replace('"', "\\\"")
        ));
    }
    block.push_str(&block_footer(label));
    block.push('\n');
    block
}

/// Collect `KEY=VALUE` and `export KEY=VALUE` assignments in file order.
///
/// Anything else (control flow, functions, continuation lines) is skipped.
///
/// A value loses its quotes only when it is wrapped in one matching pair.
/// Inside double quotes `\"` is unescaped, so the blocks written by
/// [`encode_shell_block`] read back verbatim. A lone or mismatched quote
/// (`"abc`, `'abc"`) is kept as part of the value rather than trimmed from
/// either end on its own.
pub fn decode_shell_config(text: &str) -> Vec<EnvVariable> {
    text.split('\n')
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let caps = SHELL_ASSIGNMENT.captures(line)?;
            Some(EnvVariable::new(&caps[1], unquote(&caps[2])))
        })
        .collect()
}

fn unquote(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && first == b'"' {
            return raw[1..raw.len() - 1].replace("\\\"", "\"");
        }
        if first == last && first == b'\'' {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    raw.to_string()
}

/// Remove every block written under `label`, returning the new text and how
/// many blocks were dropped. An unterminated header is left in place.
pub fn remove_shell_blocks(text: &str, label: &str) -> (String, usize) {
    let header_prefix = format!("# ----- {label} (");
    let footer = block_footer(label);
    let lines: Vec<&str> = text.split('\n').collect();

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed = 0;
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim_start().starts_with(&header_prefix) {
            let end = lines[idx + 1..]
                .iter()
                .position(|l| l.trim() == footer)
                .map(|offset| idx + 1 + offset);
            if let Some(end) = end {
                if kept.last().is_some_and(|l| l.trim().is_empty()) {
                    kept.pop();
                }
                removed += 1;
                idx = end + 1;
                continue;
            }
        }
        kept.push(line);
        idx += 1;
    }

    (kept.join("\n"), removed)
}
