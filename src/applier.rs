use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::codec::{encode_env_file, encode_shell_block, remove_shell_blocks};
use crate::model::EnvProfile;
use crate::util::fs::{backup_existing, write_atomic};

/// Destination for variables set by [`Applier::apply`].
///
/// Values are set and never unset; an applied profile stays in effect until
/// another one overwrites the same keys.
pub trait EnvSink {
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Option<String>;
}

/// The environment table of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSink for ProcessEnv {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            bail!("'{key}' cannot be used as an environment variable name");
        }
        if value.contains('\0') {
            bail!("value for '{key}' contains a NUL byte");
        }
        env::set_var(key, value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// In-memory stand-in for the process environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryEnv(pub BTreeMap<String, String>);

impl EnvSink for MemoryEnv {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("empty variable name");
        }
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Makes a profile live: the generated env file, the process table, and
/// shell startup files on request.
#[derive(Debug)]
pub struct Applier<S: EnvSink> {
    env_file: PathBuf,
    block_label: String,
    sink: S,
}

impl<S: EnvSink> Applier<S> {
    pub fn new(env_file: impl Into<PathBuf>, block_label: impl Into<String>, sink: S) -> Self {
        Self {
            env_file: env_file.into(),
            block_label: block_label.into(),
            sink,
        }
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Write the env file, then copy every variable into the sink.
    ///
    /// Stops at the first failure without undoing earlier steps.
    pub fn try_apply(&mut self, profile: &EnvProfile) -> Result<()> {
        write_atomic(&self.env_file, &encode_env_file(&profile.variables))
            .with_context(|| format!("Failed to write env file {:?}", self.env_file))?;

        for var in &profile.variables {
            self.sink
                .set(&var.key, &var.value)
                .with_context(|| format!("Failed to set '{}'", var.key))?;
        }

        info!(
            profile = %profile.name,
            count = profile.variables.len(),
            env_file = %self.env_file.display(),
            "applied profile"
        );
        Ok(())
    }

    pub fn apply(&mut self, profile: &EnvProfile) -> bool {
        match self.try_apply(profile) {
            Ok(()) => true,
            Err(err) => {
                error!(profile = %profile.name, "failed to apply profile: {err:#}");
                false
            }
        }
    }

    /// Back up `path`, then append the profile as a shell block.
    ///
    /// Earlier blocks are left alone, so repeated applies accumulate.
    pub fn try_apply_to_file(&self, path: &Path, profile: &EnvProfile) -> Result<()> {
        let needs_newline = match fs::read(path) {
            Ok(existing) => !existing.is_empty() && !existing.ends_with(b"\n"),
            Err(_) => false,
        };
        backup_existing(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let block = encode_shell_block(profile, &self.block_label, Utc::now());
        let mut contents = String::new();
        if needs_newline {
            contents.push('\n');
        }
        contents.push('\n');
        contents.push_str(&block);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to append to {:?}", path))?;

        info!(profile = %profile.name, path = %path.display(), "appended profile block");
        Ok(())
    }

    pub fn apply_to_file(&self, path: &Path, profile: &EnvProfile) -> bool {
        match self.try_apply_to_file(path, profile) {
            Ok(()) => true,
            Err(err) => {
                error!(path = %path.display(), "failed to apply profile to file: {err:#}");
                false
            }
        }
    }

    /// Back up `path` and strip every block carrying this applier's label.
    /// Returns how many blocks were removed.
    pub fn try_unapply_from_file(&self, path: &Path) -> Result<usize> {
        let text =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let (cleaned, removed) = remove_shell_blocks(&text, &self.block_label);
        if removed == 0 {
            return Ok(0);
        }
        write_file(path, &cleaned)?;
        info!(path = %path.display(), removed, "removed profile blocks");
        Ok(removed)
    }

    pub fn unapply_from_file(&self, path: &Path) -> bool {
        match self.try_unapply_from_file(path) {
            Ok(_) => true,
            Err(err) => {
                error!(path = %path.display(), "failed to remove profile blocks: {err:#}");
                false
            }
        }
    }
}

/// Contents of a config file, or `None` if it is missing or unreadable.
pub fn read_file(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(path = %path.display(), "failed to read config file: {err}");
            None
        }
    }
}

/// Replace a config file, keeping a timestamped backup of the old contents.
pub fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(backup) = backup_existing(path)? {
        info!(backup = %backup.display(), "backed up original file");
    }
    write_atomic(path, text)?;
    info!(path = %path.display(), "wrote config file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_shell_config;
    use crate::model::EnvVariable;
    use crate::util::fs::list_backups;
    use serial_test::serial;
    use tempfile::TempDir;

    fn profile(pairs: &[(&str, &str)]) -> EnvProfile {
        EnvProfile::new("dev", None).with_variables(
            pairs
                .iter()
                .map(|(k, v)| EnvVariable::new(*k, *v))
                .collect(),
        )
    }

    fn memory_applier(temp: &TempDir) -> Applier<MemoryEnv> {
        Applier::new(
            temp.path().join("state/.env"),
            "SwitchEnv",
            MemoryEnv::default(),
        )
    }

    #[test]
    fn test_apply_writes_env_file_and_sink() {
        let temp = TempDir::new().unwrap();
        let mut applier = memory_applier(&temp);

        assert!(applier.apply(&profile(&[("A", "1"), ("B", "x=y")])));

        assert_eq!(
            fs::read_to_string(applier.env_file()).unwrap(),
            "A=1\nB=x=y"
        );
        assert_eq!(applier.sink().get("A").as_deref(), Some("1"));
        assert_eq!(applier.sink().get("B").as_deref(), Some("x=y"));
    }

    #[test]
    fn test_apply_never_unsets_previous_keys() {
        let temp = TempDir::new().unwrap();
        let mut applier = memory_applier(&temp);

        applier.apply(&profile(&[("OLD", "1")]));
        applier.apply(&profile(&[("NEW", "2")]));

        assert_eq!(applier.sink().get("OLD").as_deref(), Some("1"));
        assert_eq!(
            fs::read_to_string(applier.env_file()).unwrap(),
            "NEW=2"
        );
    }

    #[test]
    fn test_apply_failure_midway_is_partial() {
        let temp = TempDir::new().unwrap();
        let mut applier = memory_applier(&temp);

        assert!(!applier.apply(&profile(&[("A", "1"), ("", "bad"), ("C", "3")])));

        assert!(applier.env_file().exists());
        assert_eq!(applier.sink().get("A").as_deref(), Some("1"));
        assert_eq!(applier.sink().get("C"), None);
    }

    #[test]
    fn test_apply_fails_when_env_file_unwritable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let mut applier = Applier::new(blocker.join(".env"), "SwitchEnv", MemoryEnv::default());

        assert!(!applier.apply(&profile(&[("A", "1")])));
        assert!(applier.sink().0.is_empty());
    }

    #[test]
    #[serial]
    fn test_process_env_sink_sets_real_environment() {
        let temp = TempDir::new().unwrap();
        let mut applier = Applier::new(temp.path().join(".env"), "SwitchEnv", ProcessEnv);

        assert!(applier.apply(&profile(&[("SWITCHENV_APPLY_TEST", "on")])));

        assert_eq!(env::var("SWITCHENV_APPLY_TEST").unwrap(), "on");
        env::remove_var("SWITCHENV_APPLY_TEST");
    }

    #[test]
    fn test_process_env_rejects_invalid_names() {
        let mut sink = ProcessEnv;
        assert!(sink.set("A=B", "1").is_err());
        assert!(sink.set("", "1").is_err());
    }

    #[test]
    fn test_apply_to_file_twice_accumulates_blocks_and_backups() {
        let temp = TempDir::new().unwrap();
        let applier = memory_applier(&temp);
        let rc = temp.path().join(".bashrc");
        fs::write(&rc, "alias ll='ls -l'").unwrap();
        let dev = profile(&[("API_URL", "http://localhost"), ("QUOTE", "say \"hi\"")]);

        assert!(applier.apply_to_file(&rc, &dev));
        assert!(applier.apply_to_file(&rc, &dev));

        let backups = list_backups(&rc).unwrap();
        assert_eq!(backups.len(), 2);
        assert_ne!(backups[0], backups[1]);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "alias ll='ls -l'");

        let contents = fs::read_to_string(&rc).unwrap();
        assert!(contents.starts_with("alias ll='ls -l'\n\n# ----- SwitchEnv ("));
        assert_eq!(contents.matches("# ----- End SwitchEnv -----").count(), 2);
        assert_eq!(contents.matches("export QUOTE=\"say \\\"hi\\\"\"").count(), 2);
        assert_eq!(decode_shell_config(&contents).len(), 4);
    }

    #[test]
    fn test_apply_to_missing_file_creates_it_without_backup() {
        let temp = TempDir::new().unwrap();
        let applier = memory_applier(&temp);
        let rc = temp.path().join(".zshrc");

        assert!(applier.apply_to_file(&rc, &profile(&[("A", "1")])));

        assert!(list_backups(&rc).unwrap().is_empty());
        assert!(fs::read_to_string(&rc).unwrap().contains("export A=\"1\""));
    }

    #[test]
    fn test_unapply_restores_surrounding_text() {
        let temp = TempDir::new().unwrap();
        let applier = memory_applier(&temp);
        let rc = temp.path().join(".bashrc");
        fs::write(&rc, "export KEEP=1\n").unwrap();
        applier.apply_to_file(&rc, &profile(&[("A", "1")]));
        applier.apply_to_file(&rc, &profile(&[("B", "2")]));

        assert_eq!(applier.try_unapply_from_file(&rc).unwrap(), 2);

        assert_eq!(fs::read_to_string(&rc).unwrap(), "export KEEP=1\n");
        assert_eq!(list_backups(&rc).unwrap().len(), 3);
        assert_eq!(applier.try_unapply_from_file(&rc).unwrap(), 0);
        assert!(!applier.unapply_from_file(&temp.path().join("missing")));
    }

    #[test]
    fn test_read_and_write_file_with_backup() {
        let temp = TempDir::new().unwrap();
        let rc = temp.path().join(".profile");

        assert_eq!(read_file(&rc), None);
        write_file(&rc, "first").unwrap();
        assert!(list_backups(&rc).unwrap().is_empty());
        write_file(&rc, "second").unwrap();

        assert_eq!(read_file(&rc).as_deref(), Some("second"));
        let backups = list_backups(&rc).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "first");
    }

    #[test]
    #[cfg(unix)]
    fn test_write_file_through_symlink_updates_link_target() {
        let temp = TempDir::new().unwrap();
        let dotfiles = temp.path().join("dotfiles");
        fs::create_dir_all(&dotfiles).unwrap();
        let real = dotfiles.join("bashrc");
        fs::write(&real, "export A=1\n").unwrap();
        let link = temp.path().join(".bashrc");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_file(&link, "export B=2\n").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "export B=2\n");
        assert_eq!(fs::read_to_string(&link).unwrap(), "export B=2\n");
        let backups = list_backups(&link).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "export A=1\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_write_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let rc = temp.path().join(".profile");
        fs::write(&rc, "export A=1\n").unwrap();
        fs::set_permissions(&rc, fs::Permissions::from_mode(0o644)).unwrap();

        write_file(&rc, "export B=2\n").unwrap();

        let mode = fs::metadata(&rc).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    #[cfg(unix)]
    fn test_unapply_through_symlink_keeps_link() {
        let temp = TempDir::new().unwrap();
        let applier = memory_applier(&temp);
        let real = temp.path().join("real_zshrc");
        fs::write(&real, "export KEEP=1\n").unwrap();
        let link = temp.path().join(".zshrc");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(applier.apply_to_file(&link, &profile(&[("A", "1")])));
        assert_eq!(applier.try_unapply_from_file(&link).unwrap(), 1);

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "export KEEP=1\n");
    }
}
