//! Local command - Inspect the staging directory

use anyhow::Result;
use clap::Subcommand;
use ilrsync_sync::StagingArea;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum LocalCommand {
    /// List files waiting in the staging directory
    Ls,
}

impl LocalCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            LocalCommand::Ls => execute_ls(ctx).await,
        }
    }
}

async fn execute_ls(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.load_config()?;
    let staging = StagingArea::new(&config.remote.local_directory);
    let files = staging.list().await?;

    if ctx.is_json() {
        let entries: Vec<_> = files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "size": f.size,
                    "archive": f.is_archive(),
                })
            })
            .collect();
        formatter.print_json(&serde_json::json!({
            "directory": staging.root().display().to_string(),
            "files": entries,
        }));
        return Ok(());
    }

    formatter.success(&format!(
        "{} file(s) in {}",
        files.len(),
        staging.root().display()
    ));
    for f in &files {
        formatter.info(&format!("{:>12}  {}", f.size, f.name));
    }
    Ok(())
}
