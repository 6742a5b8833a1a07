use super::{load_for_display, report_issues, resolve};
use crate::model::EnvProfile;
use crate::{ui, Workspace};
use anyhow::Result;

pub fn execute(workspace: &Workspace, reference: Option<&str>) -> Result<()> {
    let profiles = load_for_display(workspace);
    let selected: Vec<&EnvProfile> = match reference {
        Some(reference) => vec![resolve(&profiles, reference)?],
        None => profiles.iter().collect(),
    };

    if selected.is_empty() {
        ui::info("No profiles to check.");
        return Ok(());
    }

    let mut errors = 0usize;
    let mut warnings = 0usize;

    for profile in selected {
        let issues = report_issues(workspace, profile);
        let profile_errors = issues.iter().filter(|i| i.is_error()).count();
        errors += profile_errors;
        warnings += issues.len() - profile_errors;
        if profile_errors == 0 {
            ui::success("Valid", &profile.name);
        }
    }

    if errors > 0 {
        anyhow::bail!("Validation failed ({errors} error(s), {warnings} warning(s)).");
    }
    ui::success(
        "Check",
        format!("No errors found ({warnings} warning(s))."),
    );
    Ok(())
}
