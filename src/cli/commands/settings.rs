//! Settings CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::CommandContext;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, Setting, SettingSource};
use crate::services::SettingsService;

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show every setting with its effective value and source
    List,
    /// Show one setting
    Get { key: String },
    /// Store an override
    Set { key: String, value: String },
    /// Clear an override so the env var or default applies
    Unset { key: String },
}

#[derive(Debug, Serialize)]
pub struct SettingsListOutput {
    pub settings: Vec<Setting>,
}

impl CommandOutput for SettingsListOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_settings(&self.settings)
    }
}

#[derive(Debug, Serialize)]
pub struct SettingOutput {
    #[serde(flatten)]
    pub setting: Setting,
}

impl CommandOutput for SettingOutput {
    fn to_human(&self) -> String {
        let s = &self.setting;
        let mut lines = vec![
            format!("{} = {}", s.key.as_str(), s.effective_value.as_deref().unwrap_or("(unset)")),
            format!("  {}", s.key.description()),
        ];
        let source = match s.source {
            SettingSource::Override => "stored override".to_string(),
            SettingSource::Environment => format!("environment ({})", s.key.env_var()),
            SettingSource::Default => "default".to_string(),
            SettingSource::Unset => "not set".to_string(),
        };
        lines.push(format!("  source: {source}"));
        lines.join("\n")
    }
}

pub async fn execute(args: SettingsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let settings = &ctx.scheduler.settings;

    match args.command {
        SettingsCommands::List => {
            let settings = settings.list().await.context("Failed to list settings")?;
            output(&SettingsListOutput { settings }, json_mode);
        }
        SettingsCommands::Get { key } => {
            let setting = settings.get(SettingsService::parse_key(&key)?).await?;
            output(&SettingOutput { setting }, json_mode);
        }
        SettingsCommands::Set { key, value } => {
            let key = SettingsService::parse_key(&key)?;
            let setting = settings
                .set(key, &value)
                .await
                .with_context(|| format!("Failed to set {}", key.as_str()))?;
            output(&SettingOutput { setting }, json_mode);
        }
        SettingsCommands::Unset { key } => {
            let setting = settings.unset(SettingsService::parse_key(&key)?).await?;
            output(&SettingOutput { setting }, json_mode);
        }
    }

    Ok(())
}
