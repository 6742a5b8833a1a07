use super::{load_for_display, resolve};
use crate::{ui, Workspace};
use anyhow::{bail, Context, Result};
use std::io::{self, Read};
use std::path::Path;

pub fn apply(workspace: &Workspace, reference: &str, path: &Path) -> Result<()> {
    let profiles = load_for_display(workspace);
    let profile = resolve(&profiles, reference)?;

    workspace.try_apply_profile_to_file(path, profile)?;
    ui::success(
        "Appended",
        format!("profile '{}' to {}", profile.name, path.display()),
    );
    Ok(())
}

pub fn unapply(workspace: &Workspace, path: &Path) -> Result<()> {
    let removed = workspace.try_unapply_from_file(path)?;
    if removed == 0 {
        ui::info(format!("No switchenv blocks found in {}", path.display()));
    } else {
        ui::success(
            "Removed",
            format!("{removed} block(s) from {}", path.display()),
        );
    }
    Ok(())
}

pub fn list(workspace: &Workspace) -> Result<()> {
    let files = workspace.get_env_config_files();
    if files.is_empty() {
        ui::info("No shell startup files found.");
        return Ok(());
    }
    for file in files {
        ui::status(&file.name, file.path.display());
        ui::status("", &file.description);
    }
    Ok(())
}

pub fn read(workspace: &Workspace, path: &Path) -> Result<()> {
    let Some(text) = workspace.read_env_config_file(path) else {
        bail!("Failed to read {}", path.display());
    };
    print!("{text}");
    Ok(())
}

pub fn write(workspace: &Workspace, path: &Path) -> Result<()> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read new contents from stdin")?;

    if !workspace.write_env_config_file(path, &text) {
        bail!("Failed to write {}", path.display());
    }
    ui::success("Wrote", path.display());
    Ok(())
}

pub fn parse(workspace: &Workspace, path: &Path) -> Result<()> {
    let Some(text) = workspace.read_env_config_file(path) else {
        bail!("Failed to read {}", path.display());
    };
    for var in workspace.parse_env_from_config(&text) {
        ui::assignment(&var.key, &var.value);
    }
    Ok(())
}
