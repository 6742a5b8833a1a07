use super::{load_for_update, resolve_id};
use crate::{ui, Workspace};
use anyhow::Result;

pub fn execute(workspace: &mut Workspace, reference: &str) -> Result<()> {
    let profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;

    let profile = workspace.try_activate_profile(&id)?;
    ui::success(
        "Activated",
        format!(
            "profile '{}' ({} variable(s))",
            profile.name,
            profile.variables.len()
        ),
    );
    ui::info(format!(
        "Load it into your shell with: set -a; . {}; set +a",
        workspace.env_file_path().display()
    ));
    Ok(())
}
