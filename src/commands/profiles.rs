use super::{load_for_display, load_for_update, report_issues, resolve, resolve_id};
use crate::collection::ProfileUpdate;
use crate::model::EnvProfile;
use crate::{templates, ui, Workspace};
use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};

fn summary_line(profile: &EnvProfile) -> String {
    let mut line = format!(
        "{} [{}] {} variable(s)",
        profile.name,
        profile.id,
        profile.variables.len()
    );
    if let Some(group) = &profile.group {
        line.push_str(&format!(", group {group}"));
    }
    if !profile.tags().is_empty() {
        line.push_str(&format!(", tags {}", profile.tags().join(", ")));
    }
    line
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

pub fn list(workspace: &Workspace, group: Option<String>, tags: Vec<String>) -> Result<()> {
    let profiles = load_for_display(workspace);
    let shown = profiles.filtered(group.as_deref(), &tags);

    if shown.is_empty() {
        if profiles.is_empty() {
            ui::info("No profiles found. Use 'switchenv create' or 'switchenv import' to add one.");
        } else {
            ui::info("No profiles match the given filters.");
        }
        return Ok(());
    }

    for profile in shown {
        if profile.is_active {
            ui::success("Active", summary_line(profile));
        } else {
            ui::status("Profile", summary_line(profile));
        }
    }
    Ok(())
}

pub fn show(workspace: &Workspace, reference: &str) -> Result<()> {
    let profiles = load_for_display(workspace);
    let profile = resolve(&profiles, reference)?;

    println!("Name:        {}", profile.name);
    println!("Id:          {}", profile.id);
    if let Some(description) = &profile.description {
        println!("Description: {description}");
    }
    if let Some(group) = &profile.group {
        println!("Group:       {group}");
    }
    if !profile.tags().is_empty() {
        println!("Tags:        {}", profile.tags().join(", "));
    }
    println!("Active:      {}", if profile.is_active { "yes" } else { "no" });
    println!("Created:     {}", format_millis(profile.created_at));
    println!("Updated:     {}", format_millis(profile.updated_at));

    if profile.variables.is_empty() {
        println!("Variables:   (none)");
        return Ok(());
    }
    println!("Variables:");
    for var in &profile.variables {
        let marker = if var.is_required() { " (required)" } else { "" };
        println!("  {}={}{marker}", var.key, var.value);
        if let Some(description) = &var.description {
            println!("    # {description}");
        }
    }
    Ok(())
}

pub fn create(
    workspace: &Workspace,
    name: &str,
    description: Option<String>,
    group: Option<String>,
    template: Option<String>,
) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;

    let mut profile = match template.as_deref() {
        Some(reference) => {
            let template = templates::find(reference)
                .ok_or_else(|| anyhow!("Template '{}' not found", reference))?;
            let mut profile = template.instantiate(Some(name));
            if description.is_some() {
                profile.description = description;
            }
            profile
        }
        None => EnvProfile::new(name, description),
    };
    profile.group = group.filter(|g| !g.is_empty());
    report_issues(workspace, &profile);
    let id = profile.id.clone();
    profiles.push(profile);

    workspace.try_save_profiles(&profiles)?;
    ui::success("Created", format!("profile '{name}' [{id}]"));
    Ok(())
}

pub fn edit(
    workspace: &Workspace,
    reference: &str,
    name: Option<String>,
    description: Option<String>,
    group: Option<String>,
) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;

    let update = ProfileUpdate {
        name,
        description,
        group,
        ..Default::default()
    };
    profiles.update(&id, update);
    if let Some(profile) = profiles.get(&id) {
        report_issues(workspace, profile);
    }

    workspace.try_save_profiles(&profiles)?;
    ui::success("Updated", format!("profile [{id}]"));
    Ok(())
}

pub fn delete(workspace: &Workspace, reference: &str) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;
    let removed = profiles
        .delete(&id)
        .ok_or_else(|| anyhow!("Profile '{}' not found", reference))?;

    workspace.try_save_profiles(&profiles)?;
    ui::success("Deleted", format!("profile '{}'", removed.name));
    Ok(())
}

pub fn tag(workspace: &Workspace, reference: &str, tag: &str) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;
    profiles.add_tag(&id, tag);

    workspace.try_save_profiles(&profiles)?;
    ui::success("Tagged", format!("'{reference}' with '{tag}'"));
    Ok(())
}

pub fn untag(workspace: &Workspace, reference: &str, tag: &str) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let id = resolve_id(&profiles, reference)?;
    if !profiles.remove_tag(&id, tag) {
        ui::info(format!("Profile '{reference}' is not tagged '{tag}'"));
        return Ok(());
    }

    workspace.try_save_profiles(&profiles)?;
    ui::success("Untagged", format!("'{tag}' from '{reference}'"));
    Ok(())
}

pub fn untag_everywhere(workspace: &Workspace, tag: &str) -> Result<()> {
    let mut profiles = load_for_update(workspace)?;
    let touched = profiles.remove_tag_everywhere(tag);
    if touched > 0 {
        workspace.try_save_profiles(&profiles)?;
    }
    ui::success("Untagged", format!("'{tag}' from {touched} profile(s)"));
    Ok(())
}

pub fn templates() -> Result<()> {
    for template in templates::TEMPLATES {
        ui::status(
            template.id,
            format!("{}: {}", template.name, template.description),
        );
        let keys: Vec<&str> = template.variables.iter().map(|(key, _)| *key).collect();
        ui::status("", keys.join(", "));
    }
    Ok(())
}
