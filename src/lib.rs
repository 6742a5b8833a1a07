// Public API
pub mod cli;
pub mod commands;

// Core domain types
pub mod applier;
pub mod codec;
pub mod collection;
pub mod config;
pub mod model;
pub mod store;
pub mod system;
pub mod templates;
pub mod transfer;
pub mod validate;
mod ui;
pub mod util;
mod workspace;

// Re-export main types
pub use applier::{Applier, EnvSink, MemoryEnv, ProcessEnv};
pub use collection::{ProfileCollection, ProfileUpdate};
pub use config::Settings;
pub use model::{ConfigFileDescriptor, EnvProfile, EnvVariable, Scope};
pub use store::{Loaded, ProfileStore};
pub use system::{ScopeError, ScopeStore, ScopedEnv};
pub use transfer::ImportError;
pub use validate::{Issue, Severity, Summary, Validator};
pub use workspace::{Workspace, WorkspacePath};
