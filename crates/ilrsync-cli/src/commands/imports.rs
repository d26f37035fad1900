//! Imports command - Show recent data import records

use anyhow::{Context, Result};
use clap::Subcommand;
use ilrsync_core::domain::DataImport;
use ilrsync_core::ports::IImportRepository;

use super::{import_repository, open_database, CliContext};

#[derive(Debug, Subcommand)]
pub enum ImportsCommand {
    /// List the most recent imports, newest first
    List {
        /// Maximum number of records
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

impl ImportsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let ImportsCommand::List { limit } = self;
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let pool = open_database(&config).await?;

        let imports = import_repository(&pool)
            .list_imports(*limit)
            .await
            .context("Failed to list data imports")?;
        pool.close().await;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&imports)?);
            return Ok(());
        }

        if imports.is_empty() {
            formatter.info("No data imports recorded yet");
            return Ok(());
        }
        formatter.success(&format!("{} import(s)", imports.len()));
        for import in &imports {
            formatter.info(&import_line(import));
            if let Some(message) = &import.error_message {
                formatter.info(&format!("      {}", message));
            }
        }
        Ok(())
    }
}

fn import_line(import: &DataImport) -> String {
    let period = match import.period_key() {
        Some((year, period)) => format!("{} R{:02}", year, period),
        None => "-".to_string(),
    };
    let exported = import
        .last_export_date
        .map(|d| format!(" (pushed {})", d.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();

    format!(
        "#{:<5} {:<22} {:<10} {:<9} {:>7} rows  {}{}",
        import.id.unwrap_or_default(),
        import.import_type.to_string(),
        import.status.to_string(),
        period,
        import.rows_processed,
        import.file_name,
        exported
    )
}
