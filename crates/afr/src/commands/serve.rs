//! `afr serve` command implementation.

use std::path::PathBuf;

use afr_config::{CliSettings, Config, ServeMode};
use afr_server::{run_server, server_config_from_config};
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (no file is read unless given).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// URL prefix for the live reload routes (overrides config).
    #[arg(short, long)]
    namespace: Option<String>,

    /// Directory to serve files from; repeat for fallbacks (overrides config).
    #[arg(short, long = "dir")]
    dirs: Vec<PathBuf>,

    /// Resolve `/about` to `about.html` and `/docs/` to `docs/index.html`.
    #[arg(long)]
    site: bool,

    /// Serve `404.html` for unmatched requests (implies --site).
    #[arg(long)]
    not_found: bool,

    /// Path to watch for changes; repeat for more (overrides config).
    #[arg(short, long = "watch")]
    watch: Vec<PathBuf>,

    /// Enable verbose output (connection and request logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        tracing::debug!(path = ?config.config_path, "Loaded configuration");
        let server_config = server_config_from_config(&config)?;

        output.highlight(&format!(
            "Serving on http://{}:{}",
            server_config.host, server_config.port
        ));
        output.info(&format!(
            "Live reload client: http://{}:{}{}",
            server_config.host,
            server_config.port,
            server_config.broadcast.client_script_path()
        ));

        if server_config.dirs.is_empty() {
            output.info("Files: disabled (no --dir)");
        }
        for dir in &server_config.dirs {
            output.info(&format!("Files: {}", dir.root().display()));
        }
        for path in &server_config.watch_paths {
            output.info(&format!("Watching: {}", path.display()));
        }

        run_server(server_config).await?;

        Ok(())
    }

    /// Build the overrides passed to [`Config::load`].
    fn cli_settings(&self) -> CliSettings {
        let mode = if self.not_found {
            Some(ServeMode::SiteNotFound)
        } else if self.site {
            Some(ServeMode::Site)
        } else {
            None
        };

        CliSettings {
            host: self.host.clone(),
            port: self.port,
            namespace: self.namespace.clone(),
            dirs: (!self.dirs.is_empty()).then(|| self.dirs.clone()),
            mode,
            watch: (!self.watch.is_empty()).then(|| self.watch.clone()),
        }
    }
}
