//! `afr send` command implementation.

use afr_core::Message;
use afr_notify::{NotifyOptions, maybe_send, send};
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the send command.
#[derive(Args, Debug)]
pub(crate) struct SendArgs {
    /// Message type (`reload`, `change`, or anything the client understands).
    #[arg(short = 't', long = "type", default_value = Message::RELOAD)]
    kind: String,

    /// Changed path, relative to the served directory.
    #[arg(long)]
    path: Option<String>,

    /// Full URL of the namespace root (wins over --hostname and --port).
    #[arg(short, long)]
    url: Option<String>,

    /// Host the server listens on.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Port the server listens on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// URL prefix the server mounts its routes under.
    #[arg(short, long, default_value = "/afr/")]
    namespace: String,

    /// Succeed silently when no server is listening.
    #[arg(short, long)]
    maybe: bool,
}

impl SendArgs {
    /// Execute the send command.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let message = self.message();
        let opts = self.options();

        if self.maybe {
            maybe_send(&message, &opts)?;
        } else {
            send(&message, &opts)?;
            output.success(&format!("Sent {} to {}", message.kind(), opts.target_url()));
        }

        Ok(())
    }

    fn message(&self) -> Message {
        let message = Message::new(&self.kind);
        match &self.path {
            Some(path) => message.with_path(path),
            None => message,
        }
    }

    fn options(&self) -> NotifyOptions {
        NotifyOptions {
            url: self.url.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            namespace: self.namespace.clone(),
            ..NotifyOptions::default()
        }
    }
}
