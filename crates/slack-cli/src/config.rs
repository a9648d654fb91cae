use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const TOKEN_ENV: &str = "SLACK_TOKEN";
const WORKSPACES_ENV: &str = "SLACK_WORKSPACES";
const DISPLAY_TIME_ENV: &str = "SLACK_NOTIFICATION_DISPLAY_TIME";
const API_BASE_URL_ENV: &str = "SLACK_API_BASE_URL";
const CONFIG_PATH_ENV: &str = "SLACK_CONFIG";
const XDG_CONFIG_HOME_ENV: &str = "XDG_CONFIG_HOME";
const HOME_ENV: &str = "HOME";

const CONFIG_DIR_NAME: &str = "slack-cli";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_DISPLAY_TIME_MS: u64 = 5000;
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// A named credential the user can choose between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub name: Option<String>,
    pub token: String,
}

/// Snapshot of everything the dispatcher needs; replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: Option<String>,
    pub workspaces: Vec<Workspace>,
    pub display_time_ms: u64,
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            workspaces: Vec::new(),
            display_time_ms: DEFAULT_DISPLAY_TIME_MS,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_pairs(std::env::vars())
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some() || !self.workspaces.is_empty()
    }

    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env_map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        let file = match config_path(&env_map) {
            Some(path) => read_config_file(&path)?,
            None => FileConfig::default(),
        };

        Self::merge(file.slack, &env_map)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file = parse_config_file(raw, Path::new("<inline>"))?;
        Self::merge(file.slack, &HashMap::new())
    }

    fn merge(section: SlackSection, env_map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let token = non_empty(env_map.get(TOKEN_ENV).map(String::as_str))
            .or_else(|| non_empty(section.token.as_deref()));

        let workspaces = match non_empty(env_map.get(WORKSPACES_ENV).map(String::as_str)) {
            Some(raw) => parse_workspaces(&raw)?,
            None => workspaces_from_entries(section.workspaces)?,
        };

        let display_time_ms = match non_empty(env_map.get(DISPLAY_TIME_ENV).map(String::as_str)) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidDisplayTime(raw.clone()))?,
            None => section
                .action_notification_display_time
                .unwrap_or(DEFAULT_DISPLAY_TIME_MS),
        };

        let api_base_url = non_empty(env_map.get(API_BASE_URL_ENV).map(String::as_str))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            token,
            workspaces,
            display_time_ms,
            api_base_url,
        })
    }
}

/// Parses `name=token,token2` pairs. A bare entry is an unnamed workspace.
pub fn parse_workspaces(raw: &str) -> Result<Vec<Workspace>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, token) = match entry.split_once('=') {
                Some((name, token)) => (non_empty(Some(name)), token.trim()),
                None => (None, entry),
            };

            if token.is_empty() {
                return Err(ConfigError::InvalidWorkspace(entry.to_string()));
            }

            Ok(Workspace {
                name,
                token: token.to_string(),
            })
        })
        .collect()
}

fn workspaces_from_entries(entries: Vec<WorkspaceEntry>) -> Result<Vec<Workspace>, ConfigError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let token = non_empty(entry.token.as_deref()).ok_or_else(|| {
                ConfigError::InvalidWorkspace(format!("entry {} has no token", index + 1))
            })?;

            Ok(Workspace {
                name: non_empty(entry.name.as_deref()),
                token,
            })
        })
        .collect()
}

fn config_path(env_map: &HashMap<String, String>) -> Option<PathBuf> {
    if let Some(path) = non_empty(env_map.get(CONFIG_PATH_ENV).map(String::as_str)) {
        return Some(PathBuf::from(path));
    }

    if let Some(dir) = non_empty(env_map.get(XDG_CONFIG_HOME_ENV).map(String::as_str)) {
        return Some(PathBuf::from(dir).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }

    non_empty(env_map.get(HOME_ENV).map(String::as_str)).map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => parse_config_file(&raw, path),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(error) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            message: error.to_string(),
        }),
    }
}

fn parse_config_file(raw: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    toml::from_str(raw).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.message().to_string(),
    })
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    slack: SlackSection,
}

#[derive(Debug, Default, Deserialize)]
struct SlackSection {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    workspaces: Vec<WorkspaceEntry>,
    #[serde(default, alias = "actionNotificationDisplayTime")]
    action_notification_display_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid SLACK_NOTIFICATION_DISPLAY_TIME: {0}")]
    InvalidDisplayTime(String),
    #[error("invalid workspace: {0}")]
    InvalidWorkspace(String),
}
