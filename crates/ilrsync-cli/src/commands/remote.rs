//! Remote command - Test an SFTP endpoint
//!
//! Provides the `ilrsync remote ls` CLI command, which lists a remote
//! directory without staging anything. With `--host` it builds an ad-hoc
//! endpoint (port 22 and a 50 s timeout unless overridden); otherwise it
//! lists the configured endpoint. Hosts containing `mock` return a canned
//! listing without network access.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ilrsync_core::config::Config;
use ilrsync_core::domain::RemoteEndpoint;
use ilrsync_core::ports::IRemoteSessionFactory;
use ilrsync_sftp::SftpSessionFactory;
use ilrsync_sync::list_remote_files;
use tracing::{info, warn};

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    /// List the files in a remote directory
    Ls(RemoteLsArgs),
}

#[derive(Debug, Args)]
pub struct RemoteLsArgs {
    /// Host to test instead of the configured one
    #[arg(long)]
    pub host: Option<String>,
    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    /// Remote directory to list
    #[arg(long)]
    pub directory: Option<String>,
}

impl RemoteCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            RemoteCommand::Ls(args) => args.execute(ctx).await,
        }
    }
}

impl RemoteLsArgs {
    async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let endpoint = self.endpoint(&config);

        info!(endpoint = %endpoint.session_key(), "Listing remote directory");

        let sessions = SftpSessionFactory::new();
        let listed = list_remote_files(&sessions, &endpoint).await;
        if let Err(e) = sessions.close_all().await {
            warn!(error = %e, "Failed to close SFTP session");
        }
        let files = listed.with_context(|| {
            format!(
                "Failed to list {} on {}",
                endpoint.remote_directory(),
                endpoint.host()
            )
        })?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "host": endpoint.host(),
                "port": endpoint.port(),
                "directory": endpoint.remote_directory(),
                "files": files,
            }));
        } else {
            formatter.success(&format!(
                "{} file(s) in {} on {}",
                files.len(),
                endpoint.remote_directory(),
                endpoint.host()
            ));
            for name in &files {
                formatter.info(name);
            }
        }
        Ok(())
    }

    /// Builds the endpoint to list
    ///
    /// Flags given alongside `--host` describe the whole endpoint; without
    /// `--host` they override fields of the configured endpoint.
    fn endpoint(&self, config: &Config) -> RemoteEndpoint {
        let remote = &config.remote;
        let endpoint = match &self.host {
            Some(host) => RemoteEndpoint::for_test(
                host.clone(),
                self.username.clone().unwrap_or_default(),
                self.password.clone().unwrap_or_default(),
                self.directory.clone().unwrap_or_else(|| "/".to_string()),
            ),
            None => RemoteEndpoint::new(
                remote.host.clone(),
                remote.port,
                self.username.clone().unwrap_or_else(|| remote.username.clone()),
                self.password.clone().unwrap_or_else(|| remote.password.clone()),
                self.directory
                    .clone()
                    .unwrap_or_else(|| remote.remote_directory.clone()),
                remote.local_directory.clone(),
                Duration::from_millis(remote.timeout_ms),
            ),
        };
        match self.port {
            Some(port) => endpoint.with_port(port),
            None => endpoint,
        }
    }
}
