use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::model::EnvVariable;

/// Default upper bound on value length before a warning is raised.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 10_000;

/// Names that shells and login sessions depend on.
pub const RESERVED_KEYS: &[&str] = &["PATH", "HOME", "USER", "SHELL"];

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

static CONVENTIONAL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("static regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single advisory finding about one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub key: String,
    pub message: String,
    pub severity: Severity,
}

impl Issue {
    fn error(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub error_count: usize,
    pub warning_count: usize,
    pub is_valid: bool,
}

/// Advisory checks on variables. Nothing here blocks a save or apply.
#[derive(Debug, Clone)]
pub struct Validator {
    max_value_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_LENGTH)
    }
}

impl Validator {
    pub fn new(max_value_length: usize) -> Self {
        Self { max_value_length }
    }

    /// First problem with `key`, if any.
    pub fn validate_key(&self, key: &str) -> Option<Issue> {
        if key.trim().is_empty() {
            return Some(Issue::error(key, "variable name must not be empty"));
        }
        if !CONVENTIONAL_KEY.is_match(key) {
            return Some(Issue::warning(
                key,
                "variable names should use upper-case letters, digits and underscores, \
                 starting with a letter or underscore",
            ));
        }
        if RESERVED_KEYS.contains(&key) {
            return Some(Issue::warning(
                key,
                "this name is reserved by the system; changing it may break your shell",
            ));
        }
        None
    }

    /// First problem with `value`, checked in a fixed order.
    pub fn validate_value(&self, key: &str, value: &str, required: bool) -> Option<Issue> {
        if required && value.trim().is_empty() {
            return Some(Issue::error(key, "a value is required"));
        }
        if value.chars().count() > self.max_value_length {
            return Some(Issue::warning(
                key,
                format!("value is longer than {} characters", self.max_value_length),
            ));
        }
        if value.chars().any(is_suspicious_control) {
            return Some(Issue::warning(key, "value contains control characters"));
        }
        if value.is_empty() {
            return None;
        }
        if key.contains("PATH")
            && value
                .split(PATH_LIST_SEPARATOR)
                .any(|segment| segment.trim().is_empty())
        {
            return Some(Issue::warning(key, "path list contains an empty entry"));
        }
        if key.contains("URL") && url::Url::parse(value).is_err() {
            return Some(Issue::warning(key, "value does not look like a valid URL"));
        }
        if key.contains("PORT") {
            let in_range = parse_leading_int(value).is_some_and(|port| (0..=65535).contains(&port));
            if !in_range {
                return Some(Issue::error(key, "port must be a number between 0 and 65535"));
            }
        }
        None
    }

    /// One error per key that occurs more than once, in first-seen order.
    pub fn check_duplicates(&self, variables: &[EnvVariable]) -> Vec<Issue> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for var in variables {
            let count = counts.entry(var.key.as_str()).or_insert(0);
            if *count == 0 {
                order.push(var.key.as_str());
            }
            *count += 1;
        }

        order
            .into_iter()
            .filter_map(|key| {
                let count = counts[key];
                (count > 1).then(|| Issue::error(key, format!("variable is defined {count} times")))
            })
            .collect()
    }

    /// Duplicate errors first, then key and value issues in variable order.
    pub fn validate_profile(&self, variables: &[EnvVariable]) -> Vec<Issue> {
        let mut issues = self.check_duplicates(variables);
        for var in variables {
            issues.extend(self.validate_key(&var.key));
            issues.extend(self.validate_value(&var.key, &var.value, var.is_required()));
        }
        issues
    }

    pub fn summarize(&self, variables: &[EnvVariable]) -> Summary {
        let issues = self.validate_profile(variables);
        let error_count = issues.iter().filter(|i| i.is_error()).count();
        Summary {
            error_count,
            warning_count: issues.len() - error_count,
            is_valid: error_count == 0,
        }
    }
}

fn is_suspicious_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Leading integer of `text`, ignoring surrounding whitespace and trailing
/// garbage (`"8080/tcp"` is 8080). `None` when no digits lead.
fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
