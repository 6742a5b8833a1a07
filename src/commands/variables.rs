use super::{load_for_update, report_issues, resolve, resolve_id};
use crate::model::EnvVariable;
use crate::{ui, Workspace};
use anyhow::{anyhow, bail, Result};

/// Split `KEY=VALUE` on the first `=`.
fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", assignment))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Variable name must not be empty");
    }
    Ok((key, value))
}

pub fn set(
    workspace: &Workspace,
    reference: &str,
    assignment: &str,
    required: bool,
    description: Option<String>,
) -> Result<()> {
    let (key, value) = parse_assignment(assignment)?;
    let mut profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;

    let mut variable = EnvVariable::new(key, value);
    if required {
        variable.required = Some(true);
    }
    variable.description = description;

    profiles.upsert_variable(&id, variable);
    if let Some(profile) = profiles.get(&id) {
        report_issues(workspace, profile);
    }
    workspace.try_save_profiles(&profiles)?;
    ui::success("Set", format!("{key} in '{reference}'"));
    Ok(())
}

pub fn unset(workspace: &Workspace, reference: &str, key: &str) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let profile = resolve(&profiles, reference)?;
    let id = profile.id.clone();
    let index = profile
        .position_of(key)
        .ok_or_else(|| anyhow!("Variable '{}' is not set in '{}'", key, reference))?;

    profiles.delete_variable(&id, index);
    if let Some(profile) = profiles.get(&id) {
        report_issues(workspace, profile);
    }
    workspace.try_save_profiles(&profiles)?;
    ui::success("Unset", format!("{key} in '{reference}'"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A=1", ("A", "1"))]
    #[case("URL=http://x/?a=b", ("URL", "http://x/?a=b"))]
    #[case("EMPTY=", ("EMPTY", ""))]
    #[case(" PADDED =v", ("PADDED", "v"))]
    fn test_parse_assignment(#[case] input: &str, #[case] expected: (&str, &str)) {
        assert_eq!(parse_assignment(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_assignment_rejects_bad_input() {
        assert!(parse_assignment("NOVALUE").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}
