//! Configuration and data directory discovery

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

/// Hub config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "codecenter.config.json";

/// Override map file inside the Claude data directory
pub const OVERRIDES_FILE_NAME: &str = "session-overrides.json";

/// Project name used when a session carries no project evidence
pub const HOME_PROJECT: &str = "home";

/// Get the Claude data directory path
/// Priority: 1. Custom path, 2. CLAUDE_CONFIG_DIR env var, 3. Default ~/.claude
pub fn get_claude_data_dir(custom_path: Option<&str>) -> PathBuf {
    if let Some(path) = custom_path {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = env::var("CLAUDE_CONFIG_DIR") {
        return PathBuf::from(env_path);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".claude");
    }

    PathBuf::from(".claude")
}

/// Get the projects directory within the Claude data directory
pub fn get_projects_dir(custom_path: Option<&str>) -> PathBuf {
    get_claude_data_dir(custom_path).join("projects")
}

/// Get the session override store within the Claude data directory
pub fn get_overrides_path(custom_path: Option<&str>) -> PathBuf {
    get_claude_data_dir(custom_path).join(OVERRIDES_FILE_NAME)
}

/// Where the hub config and home-relative defaults come from
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub config_file: PathBuf,
    pub home_dir: PathBuf,
}

impl ConfigSource {
    /// `codecenter.config.json` in the working directory, resolved against the user's home
    pub fn from_env() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_file: cwd.join(CONFIG_FILE_NAME),
            home_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}

/// Code roots and project aliases used for attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub code_directories: Vec<String>,
    pub project_aliases: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHubConfig {
    #[serde(default)]
    code_directories: Vec<String>,
    #[serde(default)]
    project_aliases: HashMap<String, String>,
}

impl HubConfig {
    /// `~/Code` and `~/code` with no aliases
    pub fn defaults(home: &Path) -> Self {
        Self {
            code_directories: vec![
                home.join("Code").to_string_lossy().to_string(),
                home.join("code").to_string_lossy().to_string(),
            ],
            project_aliases: HashMap::new(),
        }
    }

    /// Load the hub config, falling back to defaults when missing or corrupt
    pub fn load(source: &ConfigSource) -> Self {
        let raw = match fs::read_to_string(&source.config_file) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No hub config at {:?}: {}", source.config_file, e);
                return Self::defaults(&source.home_dir);
            }
        };

        match serde_json::from_str::<RawHubConfig>(&raw) {
            Ok(config) => Self {
                code_directories: config
                    .code_directories
                    .iter()
                    .map(|dir| resolve_dir(dir, &source.home_dir))
                    .collect(),
                project_aliases: config.project_aliases,
            },
            Err(e) => {
                debug!("Ignoring malformed hub config {:?}: {}", source.config_file, e);
                Self::defaults(&source.home_dir)
            }
        }
    }
}

/// Expand a leading `~/` against the home directory
pub fn resolve_dir(dir: &str, home: &Path) -> String {
    match dir.strip_prefix("~/") {
        Some(rest) => home.join(rest).to_string_lossy().to_string(),
        None => dir.to_string(),
    }
}

/// Derive a project hint from an encoded project folder name.
///
/// Claude Code stores sessions under the working directory with `/` replaced
/// by `-`, e.g. `-Users-me-Code-my-app`. Everything after the last `Code`
/// (or `code`) segment is the project; a bare `Users-<name>` folder is home.
pub fn friendly_folder_name(dir_name: &str) -> String {
    let parts: Vec<&str> = dir_name.strip_prefix('-').unwrap_or(dir_name).split('-').collect();

    let code_idx = parts
        .iter()
        .rposition(|p| *p == "Code")
        .or_else(|| parts.iter().rposition(|p| *p == "code"));

    if let Some(idx) = code_idx {
        if idx < parts.len() - 1 {
            return parts[idx + 1..].join("-");
        }
    }

    if parts.len() <= 2 && parts[0] == "Users" {
        return HOME_PROJECT.to_string();
    }

    dir_name.to_string()
}
