//! Import and export of profiles as JSON documents and `.env` files.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

use crate::codec::{decode_env_file, encode_env_file};
use crate::model::{generate_id, now_millis, EnvProfile, EnvVariable};
use crate::util::fs::write_atomic;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a profile object with 'id' and 'name', or an array of profiles")]
    UnrecognizedShape,
}

fn read(path: &Path) -> Result<String, ImportError> {
    fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn restamp(mut profile: EnvProfile) -> EnvProfile {
    let now = now_millis();
    profile.id = generate_id(None);
    profile.is_active = false;
    profile.created_at = now;
    profile.updated_at = now;
    profile
}

/// Fields every import replaces, whatever type the document gave them.
const RESTAMPED_FIELDS: &[&str] = &["id", "isActive", "createdAt", "updatedAt"];

fn profile_from_value(mut value: Value) -> Result<EnvProfile, ImportError> {
    if let Value::Object(fields) = &mut value {
        for field in RESTAMPED_FIELDS {
            fields.remove(*field);
        }
    }
    Ok(restamp(serde_json::from_value(value)?))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Parse an import document: an array of profiles, or one profile object
/// identified by its `id` and `name`. Every profile gets a fresh id, fresh
/// timestamps, and is inactive.
pub fn parse_profiles_json(text: &str) -> Result<Vec<EnvProfile>, ImportError> {
    let document: Value = serde_json::from_str(text)?;
    match document {
        Value::Array(items) => items.into_iter().map(profile_from_value).collect(),
        Value::Object(fields)
            if is_truthy(fields.get("id")) && is_truthy(fields.get("name")) =>
        {
            Ok(vec![profile_from_value(Value::Object(fields))?])
        }
        _ => Err(ImportError::UnrecognizedShape),
    }
}

pub fn try_import_from_json(path: &Path) -> Result<Vec<EnvProfile>, ImportError> {
    parse_profiles_json(&read(path)?)
}

pub fn import_from_json(path: &Path) -> Option<Vec<EnvProfile>> {
    match try_import_from_json(path) {
        Ok(profiles) => {
            info!(path = %path.display(), count = profiles.len(), "imported profiles");
            Some(profiles)
        }
        Err(err) => {
            error!(path = %path.display(), "failed to import JSON: {err}");
            None
        }
    }
}

pub fn import_from_env(path: &Path) -> Option<Vec<EnvVariable>> {
    match read(path) {
        Ok(text) => Some(decode_env_file(&text)),
        Err(err) => {
            error!(path = %path.display(), "failed to import env file: {err}");
            None
        }
    }
}

pub fn try_export_to_json(profile: &EnvProfile, path: &Path) -> Result<()> {
    let contents = serde_json::to_string_pretty(profile).context("Failed to serialize profile")?;
    write_atomic(path, &contents)
}

pub fn export_to_json(profile: &EnvProfile, path: &Path) -> bool {
    match try_export_to_json(profile, path) {
        Ok(()) => true,
        Err(err) => {
            error!(path = %path.display(), "failed to export JSON: {err:#}");
            false
        }
    }
}

pub fn export_to_env(profile: &EnvProfile, path: &Path) -> bool {
    match write_atomic(path, &encode_env_file(&profile.variables)) {
        Ok(()) => true,
        Err(err) => {
            error!(path = %path.display(), "failed to export env file: {err:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_single_object_is_wrapped_and_restamped() {
        let text = r#"{"id":"old","name":"dev","isActive":true,"createdAt":1,"updatedAt":2,
                       "variables":[{"key":"A","value":"1"}],"group":"web"}"#;

        let profiles = parse_profiles_json(text).unwrap();

        assert_eq!(profiles.len(), 1);
        let profile = &profiles[0];
        assert_ne!(profile.id, "old");
        assert!(!profile.is_active);
        assert!(profile.created_at > 2);
        assert_eq!(profile.created_at, profile.updated_at);
        assert_eq!(profile.group.as_deref(), Some("web"));
        assert_eq!(profile.variables, vec![EnvVariable::new("A", "1")]);
    }

    #[test]
    fn test_array_is_passed_through_with_distinct_ids() {
        let text = r#"[{"id":"1","name":"a","isActive":true},{"name":"b"},{"id":"1","name":"c"}]"#;

        let profiles = parse_profiles_json(text).unwrap();

        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let ids: HashSet<_> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(profiles.iter().all(|p| !p.is_active));
    }

    #[test]
    fn test_restamped_fields_of_any_type_are_discarded() {
        let single = r#"{"id":1,"name":"dev","createdAt":"2024-01-01","isActive":"yes",
                         "variables":[{"key":"A","value":"1"}]}"#;
        let array = r#"[{"name":"a","createdAt":1700000000000.0,"updatedAt":null,"isActive":"yes"}]"#;

        let from_single = parse_profiles_json(single).unwrap();
        let from_array = parse_profiles_json(array).unwrap();

        assert_eq!(from_single[0].name, "dev");
        assert_eq!(from_single[0].variables, vec![EnvVariable::new("A", "1")]);
        assert_ne!(from_single[0].id, "1");
        assert!(!from_single[0].is_active);
        assert_eq!(from_array[0].name, "a");
        assert!(from_array[0].created_at > 1700000000000);
        assert_eq!(from_array[0].created_at, from_array[0].updated_at);
    }

    #[test]
    fn test_unrecognized_shapes_are_rejected() {
        for text in [r#"{"name":"no id"}"#, r#"{"id":"","name":"x"}"#, "42", r#""str""#] {
            assert!(matches!(
                parse_profiles_json(text),
                Err(ImportError::UnrecognizedShape)
            ));
        }
        assert!(matches!(
            parse_profiles_json("{oops"),
            Err(ImportError::Json(_))
        ));
    }

    #[test]
    fn test_import_from_json_returns_none_on_failure() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("bad.json");
        fs::write(&bad, r#"{"variables":[]}"#).unwrap();

        assert!(import_from_json(&bad).is_none());
        assert!(import_from_json(&temp.path().join("missing.json")).is_none());
    }

    #[test]
    fn test_export_then_import_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dev.json");
        let profile = EnvProfile::new("dev", Some("desc".into()))
            .with_variables(vec![EnvVariable::new("A", "1")]);

        assert!(export_to_json(&profile, &path));
        let imported = import_from_json(&path).unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "dev");
        assert_eq!(imported[0].description.as_deref(), Some("desc"));
        assert_eq!(imported[0].variables, profile.variables);
    }

    #[test]
    fn test_export_and_import_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dev.env");
        let profile = EnvProfile::new("dev", None).with_variables(vec![
            EnvVariable::new("A", "1"),
            EnvVariable::new("B", "x=y"),
        ]);

        assert!(export_to_env(&profile, &path));

        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\nB=x=y");
        assert_eq!(import_from_env(&path).unwrap(), profile.variables);
        assert!(import_from_env(&temp.path().join("missing.env")).is_none());
    }
}
