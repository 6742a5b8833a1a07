use super::{load_for_display, resolve};
use crate::cli::ExportFormat;
use crate::{ui, Workspace};
use anyhow::{bail, Result};
use std::path::Path;

pub fn export(
    workspace: &Workspace,
    reference: &str,
    path: &Path,
    format: Option<ExportFormat>,
) -> Result<()> {
    let profiles = load_for_display(workspace);
    let profile = resolve(&profiles, reference)?;

    let format = format.unwrap_or_else(|| ExportFormat::infer(path));
    let written = match format {
        ExportFormat::Json => workspace.export_to_json(profile, path),
        ExportFormat::Env => workspace.export_to_env(profile, path),
    };
    if !written {
        bail!("Failed to export '{}' to {}", profile.name, path.display());
    }

    ui::success(
        "Exported",
        format!("profile '{}' to {}", profile.name, path.display()),
    );
    Ok(())
}
