//! Snapshots of the live environment and the OS-level variable stores.
//!
//! Machine and user scopes only exist on Windows, where they live in the
//! registry. Everything that touches the OS goes through [`ScopeStore`] so the
//! partitioning logic can be exercised with fakes.

use regex::Regex;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{generate_id, ConfigFileDescriptor, EnvProfile, EnvVariable, Scope};

pub const SYSTEM_PROFILE_NAME: &str = "System environment";
pub const SYSTEM_PROFILE_DESCRIPTION: &str = "Imported from the local system environment";

const USER_HIVE: &str = r"HKCU\Environment";
const MACHINE_HIVE: &str = r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

static REG_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\S(?:.*?\S)?)\s{4}(REG_[A-Z_]+)(?:\s{4}(.*))?$")
        .expect("static regex is valid")
});

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("{scope} scope variables are not supported on this platform")]
    Unsupported { scope: Scope },

    #[error("invalid variable name '{0}'")]
    InvalidKey(String),

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// OS-level variable storage for one platform.
pub trait ScopeStore {
    fn read_scope(&self, scope: Scope) -> Result<Vec<EnvVariable>, ScopeError>;
    fn write_scope(&self, scope: Scope, key: &str, value: &str) -> Result<(), ScopeError>;
    fn delete_scope(&self, scope: Scope, key: &str) -> Result<(), ScopeError>;
}

/// Platforms without persistent scopes: reads are empty, writes are refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnscopedPlatform;

impl ScopeStore for UnscopedPlatform {
    fn read_scope(&self, _scope: Scope) -> Result<Vec<EnvVariable>, ScopeError> {
        Ok(Vec::new())
    }

    fn write_scope(&self, scope: Scope, _key: &str, _value: &str) -> Result<(), ScopeError> {
        Err(ScopeError::Unsupported { scope })
    }

    fn delete_scope(&self, scope: Scope, _key: &str) -> Result<(), ScopeError> {
        Err(ScopeError::Unsupported { scope })
    }
}

/// Windows registry accessed through `reg.exe`.
#[derive(Debug, Clone)]
pub struct RegistryScopes {
    program: String,
}

impl Default for RegistryScopes {
    fn default() -> Self {
        Self {
            program: "reg".to_string(),
        }
    }
}

impl RegistryScopes {
    fn hive(scope: Scope) -> Result<&'static str, ScopeError> {
        match scope {
            Scope::User => Ok(USER_HIVE),
            Scope::System => Ok(MACHINE_HIVE),
            Scope::Process => Err(ScopeError::Unsupported { scope }),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, ScopeError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "querying registry");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| ScopeError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ScopeError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ScopeStore for RegistryScopes {
    fn read_scope(&self, scope: Scope) -> Result<Vec<EnvVariable>, ScopeError> {
        if scope == Scope::Process {
            return Ok(Vec::new());
        }
        let stdout = self.run(&["query", Self::hive(scope)?])?;
        Ok(parse_reg_query(&stdout)
            .into_iter()
            .map(|var| var.with_scope(scope))
            .collect())
    }

    fn write_scope(&self, scope: Scope, key: &str, value: &str) -> Result<(), ScopeError> {
        check_key(key)?;
        let hive = Self::hive(scope)?;
        self.run(&["add", hive, "/v", key, "/t", "REG_EXPAND_SZ", "/d", value, "/f"])?;
        Ok(())
    }

    fn delete_scope(&self, scope: Scope, key: &str) -> Result<(), ScopeError> {
        check_key(key)?;
        let hive = Self::hive(scope)?;
        self.run(&["delete", hive, "/v", key, "/f"])?;
        Ok(())
    }
}

fn check_key(key: &str) -> Result<(), ScopeError> {
    if key.is_empty() || key.contains('=') || key.contains('\0') {
        return Err(ScopeError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// The scope store for the platform this binary runs on.
pub fn platform_scopes() -> Box<dyn ScopeStore> {
    if cfg!(windows) {
        Box::new(RegistryScopes::default())
    } else {
        Box::new(UnscopedPlatform)
    }
}

/// String values listed by `reg query <key>`.
pub fn parse_reg_query(output: &str) -> Vec<EnvVariable> {
    output
        .lines()
        .filter_map(|line| {
            let caps = REG_VALUE_LINE.captures(line.trim_end_matches('\r'))?;
            match &caps[2] {
                "REG_SZ" | "REG_EXPAND_SZ" => Some(EnvVariable::new(
                    &caps[1],
                    caps.get(3).map_or("", |m| m.as_str()),
                )),
                _ => None,
            }
        })
        .collect()
}

fn sort_by_key(variables: &mut [EnvVariable]) {
    variables.sort_by(|a, b| a.key.cmp(&b.key));
}

/// Build a sorted snapshot from raw `(key, value)` pairs.
pub fn snapshot_from<I>(pairs: I) -> Vec<EnvVariable>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut variables: Vec<EnvVariable> = pairs
        .into_iter()
        .map(|(key, value)| EnvVariable::new(key, value))
        .collect();
    sort_by_key(&mut variables);
    variables
}

/// The current process environment, sorted by key.
///
/// Entries that are not valid Unicode are left out.
pub fn snapshot_process_env() -> Vec<EnvVariable> {
    let pairs = env::vars_os().filter_map(|(key, value)| {
        let key = key.into_string().ok()?;
        let value = value.into_string().ok()?;
        Some((key, value))
    });
    let variables = snapshot_from(pairs);
    debug!(count = variables.len(), "captured process environment");
    variables
}

/// Live environment split by where each variable is defined.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScopedEnv {
    pub system: Vec<EnvVariable>,
    pub user: Vec<EnvVariable>,
    pub process: Vec<EnvVariable>,
}

/// Partition the live `process` table by scope.
///
/// Only keys present in the live table are reported, and a key found in both
/// stores is attributed to `system`, so the three lists are key-disjoint and
/// together cover the live table exactly.
pub fn snapshot_scoped(scopes: &dyn ScopeStore, process: Vec<EnvVariable>) -> ScopedEnv {
    let live: HashSet<String> = process.iter().map(|v| v.key.clone()).collect();
    let mut claimed: HashSet<String> = HashSet::new();

    let mut read = |scope: Scope| -> Vec<EnvVariable> {
        let stored = scopes.read_scope(scope).unwrap_or_else(|err| {
            warn!(%scope, "failed to read scoped variables: {err}");
            Vec::new()
        });
        let mut picked: Vec<EnvVariable> = stored
            .into_iter()
            .filter(|v| live.contains(&v.key) && claimed.insert(v.key.clone()))
            .map(|v| v.with_scope(scope))
            .collect();
        sort_by_key(&mut picked);
        picked
    };

    let system = read(Scope::System);
    let user = read(Scope::User);

    let mut rest: Vec<EnvVariable> = process
        .into_iter()
        .filter(|v| !claimed.contains(&v.key))
        .map(|v| v.with_scope(Scope::Process))
        .collect();
    sort_by_key(&mut rest);
    rest.dedup_by(|a, b| a.key == b.key);

    ScopedEnv {
        system,
        user,
        process: rest,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchOutcome {
    pub success: usize,
    pub failed: usize,
}

/// Write every variable into `scope`, counting successes and failures.
pub fn write_scope_batch(
    scopes: &dyn ScopeStore,
    variables: &[EnvVariable],
    scope: Scope,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for var in variables {
        match scopes.write_scope(scope, &var.key, &var.value) {
            Ok(()) => outcome.success += 1,
            Err(err) => {
                warn!(key = %var.key, %scope, "failed to write scoped variable: {err}");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

struct Candidate {
    name: &'static str,
    relative: &'static str,
    description: &'static str,
}

const UNIX_CANDIDATES: &[Candidate] = &[
    Candidate {
        name: ".bashrc",
        relative: ".bashrc",
        description: "Bash interactive shell configuration",
    },
    Candidate {
        name: ".bash_profile",
        relative: ".bash_profile",
        description: "Bash login shell profile",
    },
    Candidate {
        name: ".zshrc",
        relative: ".zshrc",
        description: "Zsh interactive shell configuration",
    },
    Candidate {
        name: ".profile",
        relative: ".profile",
        description: "POSIX shell login profile",
    },
    Candidate {
        name: ".zprofile",
        relative: ".zprofile",
        description: "Zsh login shell profile",
    },
];

const WINDOWS_CANDIDATES: &[Candidate] = &[
    Candidate {
        name: "PowerShell profile",
        relative: "Documents/PowerShell/Microsoft.PowerShell_profile.ps1",
        description: "PowerShell 7 user profile script",
    },
    Candidate {
        name: "Windows PowerShell profile",
        relative: "Documents/WindowsPowerShell/Microsoft.PowerShell_profile.ps1",
        description: "Windows PowerShell 5 user profile script",
    },
];

/// Shell startup files (or registry locations) that exist for `home`, in
/// candidate order.
pub fn discover_config_files(platform: Platform, home: &Path) -> Vec<ConfigFileDescriptor> {
    let mut found = Vec::new();
    if platform == Platform::Windows {
        found.push(ConfigFileDescriptor {
            name: "User environment (registry)".to_string(),
            path: PathBuf::from(r"HKEY_CURRENT_USER\Environment"),
            description: "Windows per-user environment variables".to_string(),
        });
    }

    let candidates = match platform {
        Platform::Unix => UNIX_CANDIDATES,
        Platform::Windows => WINDOWS_CANDIDATES,
    };
    found.extend(candidates.iter().filter_map(|candidate| {
        let path = home.join(candidate.relative);
        path.exists().then(|| ConfigFileDescriptor {
            name: candidate.name.to_string(),
            path,
            description: candidate.description.to_string(),
        })
    }));
    found
}

/// Wrap a snapshot into an inactive profile.
pub fn profile_from_snapshot(variables: Vec<EnvVariable>) -> EnvProfile {
    let mut profile = EnvProfile::new(
        SYSTEM_PROFILE_NAME,
        Some(SYSTEM_PROFILE_DESCRIPTION.to_string()),
    )
    .with_variables(variables);
    profile.id = generate_id(Some("system"));
    profile
}

pub fn import_as_profile() -> EnvProfile {
    profile_from_snapshot(snapshot_process_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeScopes {
        system: Vec<EnvVariable>,
        user: Vec<EnvVariable>,
        writes: RefCell<BTreeMap<String, String>>,
    }

    impl ScopeStore for FakeScopes {
        fn read_scope(&self, scope: Scope) -> Result<Vec<EnvVariable>, ScopeError> {
            Ok(match scope {
                Scope::System => self.system.clone(),
                Scope::User => self.user.clone(),
                Scope::Process => Vec::new(),
            })
        }

        fn write_scope(&self, scope: Scope, key: &str, value: &str) -> Result<(), ScopeError> {
            if scope == Scope::Process {
                return Err(ScopeError::Unsupported { scope });
            }
            check_key(key)?;
            self.writes
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn delete_scope(&self, _scope: Scope, key: &str) -> Result<(), ScopeError> {
            self.writes.borrow_mut().remove(key);
            Ok(())
        }
    }

    struct BrokenScopes;

    impl ScopeStore for BrokenScopes {
        fn read_scope(&self, _scope: Scope) -> Result<Vec<EnvVariable>, ScopeError> {
            Err(ScopeError::CommandFailed {
                command: "reg query".into(),
                stderr: "access denied".into(),
            })
        }

        fn write_scope(&self, scope: Scope, _key: &str, _value: &str) -> Result<(), ScopeError> {
            Err(ScopeError::Unsupported { scope })
        }

        fn delete_scope(&self, scope: Scope, _key: &str) -> Result<(), ScopeError> {
            Err(ScopeError::Unsupported { scope })
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<EnvVariable> {
        pairs.iter().map(|(k, v)| EnvVariable::new(*k, *v)).collect()
    }

    fn keys(vars: &[EnvVariable]) -> Vec<&str> {
        vars.iter().map(|v| v.key.as_str()).collect()
    }

    fn is_sorted(vars: &[EnvVariable]) -> bool {
        vars.windows(2).all(|w| w[0].key <= w[1].key)
    }

    #[test]
    fn test_snapshot_process_env_is_sorted() {
        let snapshot = snapshot_process_env();
        assert!(!snapshot.is_empty());
        assert!(is_sorted(&snapshot));
    }

    #[test]
    fn test_snapshot_from_sorts_by_key() {
        let snapshot = snapshot_from(vec![
            ("b".to_string(), "2".to_string()),
            ("B".to_string(), "1".to_string()),
            ("a".to_string(), "3".to_string()),
        ]);
        assert_eq!(keys(&snapshot), ["B", "a", "b"]);
    }

    #[rstest]
    #[case::overlapping_stores(
        &[("Path", "C:/sys"), ("TEMP", "C:/t"), ("OS", "Windows_NT")],
        &[("Path", "C:/user"), ("TEMP", "C:/u"), ("ONLY_USER", "x")],
        &[("Path", "p"), ("TEMP", "t"), ("OS", "o"), ("SESSION", "s"), ("ONLY_USER", "u")],
    )]
    #[case::stores_with_stale_keys(
        &[("GONE", "1")],
        &[("ALSO_GONE", "2")],
        &[("A", "1")],
    )]
    #[case::empty_process(&[("X", "1")], &[], &[])]
    fn test_snapshot_scoped_partitions_live_keys(
        #[case] system: &[(&str, &str)],
        #[case] user: &[(&str, &str)],
        #[case] process: &[(&str, &str)],
    ) {
        let scopes = FakeScopes {
            system: vars(system),
            user: vars(user),
            ..Default::default()
        };
        let live = snapshot_from(
            process
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        let live_keys: HashSet<&str> = live.iter().map(|v| v.key.as_str()).collect();

        let scoped = snapshot_scoped(&scopes, live.clone());

        let system_keys: HashSet<&str> = keys(&scoped.system).into_iter().collect();
        let user_keys: HashSet<&str> = keys(&scoped.user).into_iter().collect();
        let process_keys: HashSet<&str> = keys(&scoped.process).into_iter().collect();
        assert!(system_keys.is_disjoint(&user_keys));
        assert!(system_keys.is_disjoint(&process_keys));
        assert!(user_keys.is_disjoint(&process_keys));

        let union: HashSet<&str> = system_keys
            .iter()
            .chain(&user_keys)
            .chain(&process_keys)
            .copied()
            .collect();
        assert_eq!(union, live_keys);

        assert!(is_sorted(&scoped.system));
        assert!(is_sorted(&scoped.user));
        assert!(is_sorted(&scoped.process));
    }

    #[test]
    fn test_snapshot_scoped_attribution() {
        let scopes = FakeScopes {
            system: vars(&[("Path", "sys"), ("OS", "Windows_NT")]),
            user: vars(&[("Path", "user"), ("TEMP", "C:/u")]),
            ..Default::default()
        };
        let live = vars(&[("TEMP", "t"), ("Path", "p"), ("OS", "o"), ("PROMPT", "$P$G")]);

        let scoped = snapshot_scoped(&scopes, live);

        assert_eq!(keys(&scoped.system), ["OS", "Path"]);
        assert_eq!(scoped.system[1].value, "sys");
        assert_eq!(scoped.system[1].scope, Some(Scope::System));
        assert_eq!(keys(&scoped.user), ["TEMP"]);
        assert_eq!(keys(&scoped.process), ["PROMPT"]);
        assert_eq!(scoped.process[0].scope, Some(Scope::Process));
    }

    #[test]
    fn test_snapshot_scoped_without_scopes_puts_everything_in_process() {
        let live = vars(&[("B", "2"), ("A", "1")]);
        let scoped = snapshot_scoped(&UnscopedPlatform, live);

        assert!(scoped.system.is_empty());
        assert!(scoped.user.is_empty());
        assert_eq!(keys(&scoped.process), ["A", "B"]);
    }

    #[test]
    fn test_snapshot_scoped_degrades_when_store_fails() {
        let scoped = snapshot_scoped(&BrokenScopes, vars(&[("A", "1")]));
        assert_eq!(keys(&scoped.process), ["A"]);
    }

    #[test]
    fn test_write_scope_batch_counts_outcomes() {
        let scopes = FakeScopes::default();
        let outcome = write_scope_batch(
            &scopes,
            &vars(&[("GOOD", "1"), ("", "bad"), ("ALSO_GOOD", "2")]),
            Scope::User,
        );

        assert_eq!(outcome, BatchOutcome { success: 2, failed: 1 });
        assert_eq!(scopes.writes.borrow().len(), 2);
    }

    #[test]
    fn test_unscoped_platform_refuses_writes() {
        let err = UnscopedPlatform
            .write_scope(Scope::User, "A", "1")
            .unwrap_err();
        assert!(matches!(err, ScopeError::Unsupported { scope: Scope::User }));
        assert!(UnscopedPlatform.read_scope(Scope::System).unwrap().is_empty());
    }

    #[test]
    fn test_registry_rejects_process_scope_and_bad_keys() {
        let registry = RegistryScopes::default();
        assert!(matches!(
            registry.write_scope(Scope::Process, "A", "1"),
            Err(ScopeError::Unsupported { .. })
        ));
        assert!(matches!(
            registry.delete_scope(Scope::User, "A=B"),
            Err(ScopeError::InvalidKey(_))
        ));
        assert!(registry.read_scope(Scope::Process).unwrap().is_empty());
    }

    #[test]
    fn test_parse_reg_query_output() {
        let output = "\r\nHKEY_CURRENT_USER\\Environment\r\n    Path    REG_EXPAND_SZ    %USERPROFILE%\\bin;C:\\tools\r\n    TEMP    REG_EXPAND_SZ    %USERPROFILE%\\AppData\\Local\\Temp\r\n    EMPTY    REG_SZ    \r\n    Flags    REG_DWORD    0x1\r\n    My Var    REG_SZ    a  b\r\n";
        let parsed = parse_reg_query(output);

        assert_eq!(keys(&parsed), ["Path", "TEMP", "EMPTY", "My Var"]);
        assert_eq!(parsed[0].value, "%USERPROFILE%\\bin;C:\\tools");
        assert_eq!(parsed[2].value, "");
        assert_eq!(parsed[3].value, "a  b");
    }

    #[test]
    fn test_discover_unix_config_files_keeps_candidate_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".zshrc"), "").unwrap();
        fs::write(temp.path().join(".bashrc"), "").unwrap();

        let found = discover_config_files(Platform::Unix, temp.path());

        let names: Vec<_> = found.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, [".bashrc", ".zshrc"]);
        assert_eq!(found[1].path, temp.path().join(".zshrc"));
    }

    #[test]
    fn test_discover_windows_config_files_lists_registry_first() {
        let temp = TempDir::new().unwrap();
        let ps = temp.path().join("Documents/PowerShell");
        fs::create_dir_all(&ps).unwrap();
        fs::write(ps.join("Microsoft.PowerShell_profile.ps1"), "").unwrap();

        let found = discover_config_files(Platform::Windows, temp.path());

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, PathBuf::from(r"HKEY_CURRENT_USER\Environment"));
        assert_eq!(found[1].name, "PowerShell profile");
    }

    #[test]
    fn test_import_as_profile_shape() {
        let profile = profile_from_snapshot(vars(&[("A", "1")]));

        assert!(profile.id.starts_with("system-"));
        assert_eq!(profile.name, SYSTEM_PROFILE_NAME);
        assert!(!profile.is_active);
        assert_eq!(profile.created_at, profile.updated_at);
        assert_eq!(profile.variables.len(), 1);
        assert!(is_sorted(&import_as_profile().variables));
    }
}
