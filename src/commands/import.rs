use super::{load_for_update, report_issues};
use crate::{ui, Workspace};
use anyhow::{bail, Result};
use std::path::Path;

pub fn json(workspace: &Workspace, path: &Path) -> Result<()> {
    let Some(imported) = workspace.import_from_json(path) else {
        bail!("Failed to import profiles from {}", path.display());
    };
    for profile in &imported {
        report_issues(workspace, profile);
    }
    let mut profiles = load_for_update(workspace)?;
    let count = profiles.append_imported(imported);

    workspace.try_save_profiles(&profiles)?;
    ui::success("Imported", format!("{count} profile(s) from {}", path.display()));
    Ok(())
}

pub fn env(workspace: &Workspace, path: &Path, name: Option<String>) -> Result<()> {
    let Some(variables) = workspace.import_from_env(path) else {
        bail!("Failed to import variables from {}", path.display());
    };
    let mut profiles = load_for_update(workspace)?;
    let profile = profiles.create_from_variables(name.as_deref(), variables);
    report_issues(workspace, profile);
    let message = format!(
        "profile '{}' with {} variable(s)",
        profile.name,
        profile.variables.len()
    );

    workspace.try_save_profiles(&profiles)?;
    ui::success("Imported", message);
    Ok(())
}

pub fn system(workspace: &Workspace) -> Result<()> {
    let profile = workspace.import_system_env();
    report_issues(workspace, &profile);
    let message = format!(
        "profile '{}' with {} variable(s)",
        profile.name,
        profile.variables.len()
    );
    let mut profiles = load_for_update(workspace)?;
    profiles.push(profile);

    workspace.try_save_profiles(&profiles)?;
    ui::success("Imported", message);
    Ok(())
}
