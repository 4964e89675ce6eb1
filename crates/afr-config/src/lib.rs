//! Configuration management for afr.
//!
//! Parses an `afr.toml` file with serde. There is no discovery: a file is
//! read only when its path is passed explicitly, otherwise defaults apply.
//! Relative paths in the file are resolved against the file's directory.
//!
//! CLI settings are applied on top during load via [`CliSettings`].
//!
//! ```toml
//! [server]
//! port = 8080
//! namespace = "/afr/"
//!
//! [files]
//! mode = "site-not-found"
//! dirs = [{ path = "target" }, { path = "static", include = "**/*.css" }]
//!
//! [watch]
//! paths = ["target"]
//! debounce_ms = 100
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override broadcaster namespace.
    pub namespace: Option<String>,
    /// Replace the served directories.
    pub dirs: Option<Vec<PathBuf>>,
    /// Override the fallback mode.
    pub mode: Option<ServeMode>,
    /// Replace the watched paths.
    pub watch: Option<Vec<PathBuf>>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// File serving configuration.
    pub files: FilesConfig,
    /// Change watching configuration.
    pub watch: WatchConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// URL prefix for the broadcaster routes.
    pub namespace: String,
    /// Client script path under the namespace.
    pub client_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            namespace: "/afr/".to_owned(),
            client_path: "client.mjs".to_owned(),
        }
    }
}

/// File serving configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Directories to serve, in lookup order. Empty disables file serving.
    pub dirs: Vec<DirConfig>,
    /// Fallback mode.
    pub mode: ServeMode,
}

/// One served directory.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirConfig {
    /// Root directory.
    pub path: PathBuf,
    /// Glob over relative paths; absent allows everything.
    #[serde(default)]
    pub include: Option<String>,
}

impl DirConfig {
    /// Allow-all directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include: None,
        }
    }
}

/// Fallback mode for file serving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServeMode {
    /// Exact paths only.
    #[default]
    File,
    /// Implicit `.html` and `/index.html`.
    Site,
    /// As `site`, plus `404.html` for misses.
    SiteNotFound,
}

/// Change watching configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Paths to watch. Empty disables watching.
    pub paths: Vec<PathBuf>,
    /// Coalescing window in milliseconds (0 disables).
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce_ms: 100,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL path fragment to be usable as a literal route.
fn require_literal_route(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.contains(['{', '}', '*', '?', '#']) {
        return Err(ConfigError::Validation(format!(
            "{field} cannot contain route syntax or query characters"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from an optional file with optional CLI settings.
    ///
    /// CLI settings are applied after loading and path resolution, allowing
    /// CLI arguments to take precedence over config file values. The result
    /// is validated after the settings are applied.
    ///
    /// # Errors
    ///
    /// Returns error if `config_path` doesn't exist, parsing fails, or the
    /// merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::load_from_file(path)?
            }
            None => Self::default(),
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(namespace) = &settings.namespace {
            self.server.namespace.clone_from(namespace);
        }
        if let Some(dirs) = &settings.dirs {
            self.files.dirs = dirs.iter().map(DirConfig::new).collect();
        }
        if let Some(mode) = settings.mode {
            self.files.mode = mode;
        }
        if let Some(watch) = &settings.watch {
            self.watch.paths.clone_from(watch);
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Resolve relative paths against the config file directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        for dir in &mut self.files.dirs {
            dir.path = config_dir.join(&dir.path);
        }
        for path in &mut self.watch.paths {
            *path = config_dir.join(&*path);
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but nothing
        // could notify a server whose port is unknown
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".to_owned()));
        }

        require_literal_route(&self.server.namespace, "server.namespace")?;
        // A root namespace would shadow the served site's index
        if self.server.namespace.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "server.namespace cannot be the site root".to_owned(),
            ));
        }
        require_non_empty(&self.server.client_path, "server.client_path")?;
        require_literal_route(&self.server.client_path, "server.client_path")?;

        for dir in &self.files.dirs {
            if dir.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "files.dirs entries need a path".to_owned(),
                ));
            }
        }

        Ok(())
    }
}
