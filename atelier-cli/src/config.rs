use anyhow::{anyhow, Context, Result};
use atelier_core::AtelierConfig;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a commented config file to the config path
    Init(InitArgs),
    /// Show config file path
    Path,
    /// Print the configuration file after env overrides (token redacted)
    Show,
    /// Get a config value by dot-notation key (e.g. "chat.poll_interval_secs")
    Get(GetArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Dot-notation key
    pub key: String,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Get(args) => run_get(args),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = AtelierConfig::config_path();

    if config_path.exists() && !args.force {
        return Err(anyhow!(
            "Config already exists at {:?}\n\nUse --force to overwrite",
            config_path
        ));
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let template_content = include_str!("../../atelier-config.template.toml");
    std::fs::write(&config_path, template_content)
        .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

    println!("✅ Created config at: {:?}", config_path);
    println!("\nNext steps:");
    println!("  1. Edit the config: $EDITOR {:?}", config_path);
    println!("  2. export ATELIER_API_TOKEN=...");
    println!("  3. Run: atelier chat list");

    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", AtelierConfig::config_path().display());
    Ok(())
}

/// Config file as TOML after env overrides, with the token masked.
/// Fails with a hint to run `config init` when there is no file.
fn effective_toml() -> Result<toml::Value> {
    let mut config = AtelierConfig::load()?;
    if config.api.token.is_some() {
        config.api.token = Some("********".to_string());
    }
    toml::Value::try_from(&config).context("Failed to serialize config to TOML")
}

fn run_show() -> Result<()> {
    let value = effective_toml()?;
    let toml_str = toml::to_string_pretty(&value).context("Failed to serialize config to TOML")?;
    println!("{}", toml_str);
    Ok(())
}

fn run_get(args: GetArgs) -> Result<()> {
    let value = effective_toml()?;
    println!("{}", lookup(&value, &args.key)?);
    Ok(())
}

fn lookup(value: &toml::Value, key: &str) -> Result<String> {
    let found = key
        .split('.')
        .try_fold(value, |node, part| node.get(part))
        .ok_or_else(|| anyhow!("Unknown config key: {}", key))?;
    Ok(match found {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
