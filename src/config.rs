use crate::calendar::CalendarMode;
use crate::filter::{SortOption, StatusFilter, TaskQuery, View};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8081";
const APP_DIR: &str = "todo-tui";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// On-disk shape of config.toml. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_url: Option<String>,
    log_file: Option<PathBuf>,
    default_view: Option<String>,
    default_sort: Option<String>,
    default_status: Option<String>,
    calendar_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// `None` disables logging.
    pub log_file: Option<PathBuf>,
    /// Initial view, sort and status filter.
    pub query: TaskQuery,
    pub calendar_mode: CalendarMode,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            log_file: default_log_file(),
            query: TaskQuery::default(),
            calendar_mode: CalendarMode::default(),
        }
    }
}

impl Config {
    /// Reads `.env`, then the config file (`$TODO_CONFIG` or
    /// `<config dir>/todo-tui/config.toml`), then environment overrides.
    pub fn load() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();

        let path = env::var_os("TODO_CONFIG")
            .map(PathBuf::from)
            .or_else(default_config_path);

        let contents = match &path {
            Some(path) if path.exists() => Some(read_file(path)?),
            _ => None,
        };

        Config::from_sources(
            contents.as_deref().zip(path.as_deref()),
            |key| env::var(key).ok(),
        )
    }

    /// Builds a config from optional file contents (with the path they came
    /// from, for error messages) and an environment lookup.
    pub fn from_sources(
        file: Option<(&str, &Path)>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let parsed = match file {
            Some((contents, path)) => {
                toml::from_str::<FileConfig>(contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => FileConfig::default(),
        };

        let mut config = Config::default();

        if let Some(url) = parsed.api_url {
            config.api_url = url;
        }
        if let Some(log_file) = parsed.log_file {
            config.log_file = Some(log_file);
        }
        if let Some(view) = parsed.default_view.as_deref() {
            config.query.view = View::from_name(view);
        }
        if let Some(sort) = parsed.default_sort.as_deref() {
            config.query.sort = SortOption::from_name(sort);
        }
        if let Some(status) = parsed.default_status.as_deref() {
            config.query.status = StatusFilter::from_name(status);
        }
        if let Some(mode) = parsed.calendar_mode.as_deref() {
            config.calendar_mode = CalendarMode::from_name(mode);
        }

        // Environment wins over the file.
        if let Some(url) = lookup("TODO_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(log_file) = lookup("TODO_LOG_FILE") {
            config.log_file = if log_file.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(log_file))
            };
        }

        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn default_log_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("todo-tui.log"))
}
