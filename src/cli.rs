use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::Scope;

/// SwitchEnv - Environment variable profile switcher
///
/// switchenv keeps named sets of environment variables in a single JSON
/// document and makes one of them live: it writes the generated `.env` file,
/// sets the variables for this process, and can append them to shell startup
/// files as a labelled block.
#[derive(Parser, Debug)]
#[command(name = "switchenv", author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List profiles
    List {
        /// Only profiles in this group
        #[arg(short, long, value_name = "GROUP")]
        group: Option<String>,

        /// Only profiles carrying any of these tags
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// Show a profile and its variables
    Show {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,
    },

    /// Create a new profile
    Create {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(short, long, value_name = "DESCRIPTION")]
        description: Option<String>,

        #[arg(short, long, value_name = "GROUP")]
        group: Option<String>,

        /// Seed the profile from a built-in template (see `switchenv templates`)
        #[arg(short, long, value_name = "TEMPLATE")]
        template: Option<String>,
    },

    /// Edit profile metadata
    Edit {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// New description (empty string clears it)
        #[arg(long, value_name = "DESCRIPTION")]
        description: Option<String>,

        /// New group (empty string clears it)
        #[arg(long, value_name = "GROUP")]
        group: Option<String>,
    },

    /// Delete a profile
    Delete {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,
    },

    /// Set a variable, replacing an existing one with the same key
    Set {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "KEY=VALUE")]
        assignment: String,

        /// Mark the variable as required
        #[arg(long)]
        required: bool,

        #[arg(short, long, value_name = "DESCRIPTION")]
        description: Option<String>,
    },

    /// Remove a variable from a profile
    Unset {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Add a tag to a profile
    Tag {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "TAG")]
        tag: String,
    },

    /// Remove a tag from a profile, or from every profile with --all
    Untag {
        /// Profile id or name
        #[arg(value_name = "PROFILE", required_unless_present = "all")]
        profile: Option<String>,

        #[arg(value_name = "TAG", required_unless_present = "all")]
        tag: Option<String>,

        /// Remove this tag from every profile
        #[arg(long, value_name = "TAG", conflicts_with_all = ["profile", "tag"])]
        all: Option<String>,
    },

    /// Activate a profile and apply it
    Use {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,
    },

    /// Append a profile to a shell startup file as a labelled block
    ApplyFile {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Remove every labelled block from a shell startup file
    UnapplyFile {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Import profiles or variables
    #[command(subcommand)]
    Import(ImportSource),

    /// Export a profile as JSON or as a .env file
    Export {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output format (inferred from the file extension by default)
        #[arg(short, long, value_enum)]
        format: Option<ExportFormat>,
    },

    /// Show the live environment of this process
    System {
        /// Split variables by the scope that defines them
        #[arg(long)]
        scoped: bool,
    },

    /// List shell startup files that exist for this user
    Files,

    /// Print a config file
    ReadFile {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Replace a config file with stdin (a backup is kept)
    WriteFile {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show the variables a shell startup file exports
    ParseConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Validate profile variables
    Check {
        /// Profile id or name (checks every profile if omitted)
        #[arg(value_name = "PROFILE")]
        profile: Option<String>,
    },

    /// List built-in profile templates
    Templates,

    /// Print the path of the generated env file
    EnvPath,

    /// Manage persistent user and system variables
    #[command(subcommand)]
    Scope(ScopeAction),
}

#[derive(Subcommand, Debug)]
pub enum ImportSource {
    /// Import profiles from a JSON document
    #[command(name = "json")]
    Json {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Create a profile from a .env file
    #[command(name = "env")]
    Env {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Name of the new profile
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Create a profile from the live environment
    #[command(name = "system")]
    System,
}

#[derive(Subcommand, Debug)]
pub enum ScopeAction {
    /// Set a persistent variable
    #[command(name = "set")]
    Set {
        #[arg(value_name = "SCOPE", value_parser = parse_scope)]
        scope: Scope,

        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Delete a persistent variable
    #[command(name = "unset")]
    Unset {
        #[arg(value_name = "SCOPE", value_parser = parse_scope)]
        scope: Scope,

        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Write every variable of a profile into a scope
    #[command(name = "push")]
    Push {
        /// Profile id or name
        #[arg(value_name = "PROFILE")]
        profile: String,

        #[arg(value_name = "SCOPE", value_parser = parse_scope)]
        scope: Scope,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Env,
}

impl ExportFormat {
    /// `.json` files export as JSON; anything else as a .env file.
    pub fn infer(path: &std::path::Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Env,
        }
    }
}

fn parse_scope(raw: &str) -> Result<Scope, String> {
    match Scope::from_name(raw) {
        Some(Scope::Process) | None => Err(format!(
            "'{raw}' is not a persistent scope (expected 'user' or 'system')"
        )),
        Some(scope) => Ok(scope),
    }
}
