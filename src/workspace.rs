use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::applier::{self, Applier, EnvSink, ProcessEnv};
use crate::codec::decode_shell_config;
use crate::collection::ProfileCollection;
use crate::config::Settings;
use crate::model::{ConfigFileDescriptor, EnvProfile, EnvVariable};
use crate::store::{Loaded, ProfileStore};
use crate::system::{self, Platform, ScopeStore, ScopedEnv};
use crate::transfer;
use crate::util::xdg;
use crate::validate::Validator;

/// Workspace path types
#[derive(Debug, Clone, Copy)]
pub enum WorkspacePath {
    /// Config root: $XDG_CONFIG_HOME/switchenv
    Root,
    /// Profile document: root/profiles.json
    Profiles,
    /// Settings file: root/config.toml
    Settings,
    /// State directory: $XDG_STATE_HOME/switchenv
    State,
    /// Generated env file: state/.env (unless overridden in settings)
    EnvFile,
}

/// Workspace - the switchenv installation for the current user
///
/// Owns the profile store, the applier, and the OS scope store. Every
/// boundary operation is exposed here in two forms: `try_*` returning a
/// `Result`, and a plain form that logs failures and returns a sentinel.
pub struct Workspace<S: EnvSink = ProcessEnv> {
    /// Config root: $XDG_CONFIG_HOME/switchenv
    config_dir: PathBuf,
    /// State directory: $XDG_STATE_HOME/switchenv
    state_dir: PathBuf,
    /// Home directory searched for shell startup files
    home_dir: PathBuf,
    settings: Settings,
    store: ProfileStore,
    applier: Applier<S>,
    scopes: Box<dyn ScopeStore>,
}

impl Workspace<ProcessEnv> {
    /// Create a new Workspace
    ///
    /// Resolves XDG-compliant directories:
    /// - Config: $XDG_CONFIG_HOME/switchenv (default: ~/.config/switchenv)
    /// - State: $XDG_STATE_HOME/switchenv (default: ~/.local/state/switchenv)
    ///
    /// and makes sure the profile document exists.
    pub fn new() -> Result<Self> {
        let workspace = Self::open(
            xdg::config_dir()?,
            xdg::state_dir()?,
            xdg::home_dir()?,
            ProcessEnv,
            system::platform_scopes(),
        )?;
        Ok(workspace)
    }
}

impl<S: EnvSink> Workspace<S> {
    /// Open a workspace rooted at explicit directories.
    pub fn open(
        config_dir: PathBuf,
        state_dir: PathBuf,
        home_dir: PathBuf,
        sink: S,
        scopes: Box<dyn ScopeStore>,
    ) -> Result<Self> {
        let settings = Settings::load(&config_dir.join("config.toml"))?;
        let env_file = settings
            .env_file_override()?
            .unwrap_or_else(|| state_dir.join(".env"));
        let store = ProfileStore::new(config_dir.join("profiles.json"));
        store
            .ensure_initialized()
            .context("Failed to initialize profile store")?;
        let applier = Applier::new(env_file, settings.block_label.clone(), sink);

        Ok(Self {
            config_dir,
            state_dir,
            home_dir,
            settings,
            store,
            applier,
            scopes,
        })
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::Root => self.config_dir.clone(),
            WorkspacePath::Profiles => self.store.path().to_path_buf(),
            WorkspacePath::Settings => self.config_dir.join("config.toml"),
            WorkspacePath::State => self.state_dir.clone(),
            WorkspacePath::EnvFile => self.applier.env_file().to_path_buf(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.settings.max_value_length)
    }

    pub fn sink(&self) -> &S {
        self.applier.sink()
    }

    pub fn scopes(&self) -> &dyn ScopeStore {
        self.scopes.as_ref()
    }

    pub fn load_profiles(&self) -> ProfileCollection {
        self.store.load()
    }

    pub fn load_profiles_checked(&self) -> Loaded<ProfileCollection> {
        self.store.load_checked()
    }

    pub fn save_profiles(&self, profiles: &ProfileCollection) -> bool {
        self.store.save(profiles)
    }

    pub fn try_save_profiles(&self, profiles: &ProfileCollection) -> Result<()> {
        self.store.try_save(profiles)
    }

    pub fn apply_profile(&mut self, profile: &EnvProfile) -> bool {
        self.applier.apply(profile)
    }

    /// Activate `id`, apply it, and persist the new active flag.
    ///
    /// The profile is applied before the collection is saved; a failed apply
    /// leaves the stored flags untouched.
    pub fn try_activate_profile(&mut self, id: &str) -> Result<EnvProfile> {
        let mut profiles = self.store.load_checked().strict()?;
        let profile = profiles
            .activate(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Profile '{}' does not exist", id))?;
        self.applier.try_apply(&profile)?;
        self.store.try_save(&profiles)?;
        Ok(profile)
    }

    pub fn activate_profile(&mut self, id: &str) -> bool {
        match self.try_activate_profile(id) {
            Ok(_) => true,
            Err(err) => {
                error!(%id, "failed to activate profile: {err:#}");
                false
            }
        }
    }

    pub fn apply_profile_to_file(&self, path: &Path, profile: &EnvProfile) -> bool {
        self.applier.apply_to_file(path, profile)
    }

    pub fn try_apply_profile_to_file(&self, path: &Path, profile: &EnvProfile) -> Result<()> {
        self.applier.try_apply_to_file(path, profile)
    }

    pub fn unapply_from_file(&self, path: &Path) -> bool {
        self.applier.unapply_from_file(path)
    }

    pub fn try_unapply_from_file(&self, path: &Path) -> Result<usize> {
        self.applier.try_unapply_from_file(path)
    }

    pub fn import_from_json(&self, path: &Path) -> Option<Vec<EnvProfile>> {
        transfer::import_from_json(path)
    }

    pub fn import_from_env(&self, path: &Path) -> Option<Vec<EnvVariable>> {
        transfer::import_from_env(path)
    }

    pub fn export_to_json(&self, profile: &EnvProfile, path: &Path) -> bool {
        transfer::export_to_json(profile, path)
    }

    pub fn export_to_env(&self, profile: &EnvProfile, path: &Path) -> bool {
        transfer::export_to_env(profile, path)
    }

    pub fn get_system_env(&self) -> Vec<EnvVariable> {
        system::snapshot_process_env()
    }

    pub fn get_scoped_env(&self) -> ScopedEnv {
        system::snapshot_scoped(self.scopes.as_ref(), system::snapshot_process_env())
    }

    pub fn import_system_env(&self) -> EnvProfile {
        system::import_as_profile()
    }

    pub fn get_env_config_files(&self) -> Vec<ConfigFileDescriptor> {
        system::discover_config_files(Platform::current(), &self.home_dir)
    }

    pub fn read_env_config_file(&self, path: &Path) -> Option<String> {
        applier::read_file(path)
    }

    pub fn write_env_config_file(&self, path: &Path, text: &str) -> bool {
        match applier::write_file(path, text) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), "failed to write config file: {err:#}");
                false
            }
        }
    }

    pub fn parse_env_from_config(&self, text: &str) -> Vec<EnvVariable> {
        decode_shell_config(text)
    }

    pub fn env_file_path(&self) -> &Path {
        self.applier.env_file()
    }
}
