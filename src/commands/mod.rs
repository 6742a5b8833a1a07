use crate::cli::{Cli, Commands, ImportSource, ScopeAction};
use crate::collection::ProfileCollection;
use crate::model::EnvProfile;
use crate::validate::Issue;
use crate::{ui, Workspace};
use anyhow::{anyhow, Result};

mod check;
mod config_files;
mod import;
mod profiles;
mod scope;
mod system;
mod transfer;
mod use_profile;
mod variables;

pub fn execute(cli: Cli) -> Result<()> {
    // Create workspace - this is the root entry point
    let mut workspace = Workspace::new()?;

    match cli.command {
        Commands::List { group, tags } => profiles::list(&workspace, group, tags),

        Commands::Show { profile } => profiles::show(&workspace, &profile),

        Commands::Create {
            name,
            description,
            group,
            template,
        } => profiles::create(&workspace, &name, description, group, template),

        Commands::Edit {
            profile,
            name,
            description,
            group,
        } => profiles::edit(&workspace, &profile, name, description, group),

        Commands::Delete { profile } => profiles::delete(&workspace, &profile),

        Commands::Set {
            profile,
            assignment,
            required,
            description,
        } => variables::set(&workspace, &profile, &assignment, required, description),

        Commands::Unset { profile, key } => variables::unset(&workspace, &profile, &key),

        Commands::Tag { profile, tag } => profiles::tag(&workspace, &profile, &tag),

        Commands::Untag { profile, tag, all } => match (all, profile, tag) {
            (Some(tag), _, _) => profiles::untag_everywhere(&workspace, &tag),
            (None, Some(profile), Some(tag)) => profiles::untag(&workspace, &profile, &tag),
            _ => Err(anyhow!("Specify a profile and a tag, or --all <TAG>")),
        },

        Commands::Use { profile } => use_profile::execute(&mut workspace, &profile),

        Commands::ApplyFile { profile, path } => {
            config_files::apply(&workspace, &profile, &path)
        }

        Commands::UnapplyFile { path } => config_files::unapply(&workspace, &path),

        Commands::Import(source) => match source {
            ImportSource::Json { path } => import::json(&workspace, &path),
            ImportSource::Env { path, name } => import::env(&workspace, &path, name),
            ImportSource::System => import::system(&workspace),
        },

        Commands::Export {
            profile,
            path,
            format,
        } => transfer::export(&workspace, &profile, &path, format),

        Commands::System { scoped } => system::show(&workspace, scoped),

        Commands::Files => config_files::list(&workspace),

        Commands::ReadFile { path } => config_files::read(&workspace, &path),

        Commands::WriteFile { path } => config_files::write(&workspace, &path),

        Commands::ParseConfig { path } => config_files::parse(&workspace, &path),

        Commands::Check { profile } => check::execute(&workspace, profile.as_deref()),

        Commands::Templates => profiles::templates(),

        Commands::EnvPath => {
            println!("{}", workspace.env_file_path().display());
            Ok(())
        }

        Commands::Scope(action) => match action {
            ScopeAction::Set { scope, key, value } => {
                scope::set(&workspace, scope, &key, &value)
            }
            ScopeAction::Unset { scope, key } => scope::unset(&workspace, scope, &key),
            ScopeAction::Push { profile, scope } => scope::push(&workspace, &profile, scope),
        },
    }
}

/// Load profiles for display, surfacing a degraded document as a warning.
fn load_for_display(workspace: &Workspace) -> ProfileCollection {
    let loaded = workspace.load_profiles_checked();
    if let Some(warning) = &loaded.warning {
        ui::warn(warning);
    }
    loaded.value
}

/// Load profiles for modification. A document that failed to parse is an
/// error here so that saving cannot overwrite it with an empty list.
fn load_for_update(workspace: &Workspace) -> Result<ProfileCollection> {
    workspace.load_profiles_checked().strict()
}

fn resolve<'a>(profiles: &'a ProfileCollection, reference: &str) -> Result<&'a EnvProfile> {
    profiles
        .find(reference)
        .ok_or_else(|| anyhow!("Profile '{}' not found", reference))
}

fn resolve_id(profiles: &ProfileCollection, reference: &str) -> Result<String> {
    resolve(profiles, reference).map(|profile| profile.id.clone())
}

/// Print validator findings for `profile`. Findings never block a save.
fn report_issues(workspace: &Workspace, profile: &EnvProfile) -> Vec<Issue> {
    let issues = workspace.validator().validate_profile(&profile.variables);
    for issue in &issues {
        let line = format!("{} ({}): {}", profile.name, issue.key, issue.message);
        if issue.is_error() {
            ui::error(line);
        } else {
            ui::warn(line);
        }
    }
    issues
}
