use super::{load_for_display, resolve};
use crate::model::Scope;
use crate::system::write_scope_batch;
use crate::{ui, Workspace};
use anyhow::{bail, Result};

pub fn set(workspace: &Workspace, scope: Scope, key: &str, value: &str) -> Result<()> {
    workspace.scopes().write_scope(scope, key, value)?;
    ui::success("Set", format!("{key} in {scope} scope"));
    Ok(())
}

pub fn unset(workspace: &Workspace, scope: Scope, key: &str) -> Result<()> {
    workspace.scopes().delete_scope(scope, key)?;
    ui::success("Unset", format!("{key} in {scope} scope"));
    Ok(())
}

pub fn push(workspace: &Workspace, reference: &str, scope: Scope) -> Result<()> {
    let profiles = load_for_display(workspace);
    let profile = resolve(&profiles, reference)?;

    let outcome = write_scope_batch(workspace.scopes(), &profile.variables, scope);
    if outcome.failed > 0 {
        bail!(
            "Wrote {} of {} variable(s) to {scope} scope ({} failed)",
            outcome.success,
            profile.variables.len(),
            outcome.failed
        );
    }
    ui::success(
        "Pushed",
        format!("{} variable(s) from '{}' to {scope} scope", outcome.success, profile.name),
    );
    Ok(())
}
