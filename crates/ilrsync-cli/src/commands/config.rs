//! Config command - View and validate the ilrsync configuration
//!
//! Provides the `ilrsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON) with secrets masked
//! 2. Validates the configuration file and reports every error

use anyhow::{Context, Result};
use clap::Subcommand;
use ilrsync_core::config::Config;
use tracing::info;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
        }
    }
}

/// Show the effective configuration with passwords masked
fn execute_show(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.load_config()?.redacted();

    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

/// Validate the configuration file
///
/// A file that cannot be parsed, or a configuration with validation errors,
/// makes the command fail after the report is printed.
fn execute_validate(ctx: &CliContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config_path = &ctx.config_path;

    let config = if config_path.exists() {
        Config::load(config_path)
            .with_context(|| format!("Failed to parse configuration {}", config_path.display()))?
    } else {
        formatter.warn(&format!(
            "Configuration file not found at {}; validating defaults",
            config_path.display()
        ));
        Config::default()
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if ctx.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        let json = serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        });
        formatter.print_json(&json);
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Configuration is invalid");
    }
    Ok(())
}
