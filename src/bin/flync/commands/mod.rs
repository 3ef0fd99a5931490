//! Command implementations

pub mod completions;
pub mod explain;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use flync::util::config::{global_config_path, load_config, project_config_path, Config};

/// Configuration for a workspace: global settings overridden by the project's.
pub fn workspace_config(root: &Path) -> Config {
    load_config(global_config_path().as_deref(), &project_config_path(root))
}

/// The name a workspace is expected to declare: `--name`, else the root directory name.
///
/// A root that does not exist still yields a name, so the loader gets to report it.
pub fn expected_name(root: &Path, name: Option<String>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("cannot derive a workspace name from {}", root.display()))
}
