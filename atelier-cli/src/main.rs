//! atelier CLI - admin console for the association site
//!
//! - Article content tools: decode, render and lint block envelopes offline
//! - Article publishing: fetch, push drafts, upload images
//! - Visitor chat: list, watch (live polling), reply, close

use anyhow::Result;
use atelier_core::AtelierConfig;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "atelier",
    author,
    version,
    about = "Admin console for articles and visitor chat",
    long_about = "Edit and publish block-based articles with numbered source citations, \
                  and answer visitor chat conversations from the terminal."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Article content tools and publishing (decode, render, lint, show, push, upload)
    Article(commands::article::ArticleArgs),
    /// Visitor chat console (list, watch, send, close)
    Chat(commands::chat::ChatArgs),
    /// Manage atelier configuration (init, path, show)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // A broken config must not keep `config init` or the offline tools from running
    let default_level = AtelierConfig::load_or_default()
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
        default_level,
    })
    .ok();
    debug!(command = ?cli.command, "starting");

    let result = match cli.command {
        Commands::Article(args) => commands::run_article(args).await,
        Commands::Chat(args) => commands::run_chat(args).await,
        Commands::Config(args) => config::run_config(args),
        Commands::Completions(args) => run_completions(args),
    };

    tracing_setup::shutdown_otel();
    result
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
