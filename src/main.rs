use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use vaelis::commands;
use vaelis::config::Config;
use vaelis::tui;

#[derive(Parser)]
#[command(name = "vaelis")]
#[command(version)]
#[command(about = "Terminal client for the Vaelis AI assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List your conversations
    List,
    /// Resume a conversation in the TUI
    Open { id: i64 },
    /// One-shot generation streamed to stdout
    Ask {
        /// The prompt to send
        prompt: String,
        /// Generation mode: chat, think, study, code, or document
        #[arg(long)]
        mode: Option<String>,
        /// Request web search for this generation
        #[arg(long)]
        search: bool,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // Log to a file: the terminal belongs to the TUI
    let file_appender =
        tracing_appender::rolling::never(config.vaelis_home.clone(), "vaelis.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vaelis=info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    if !config.has_token() {
        eprintln!("No API token configured.");
        eprintln!("  export VAELIS_API_TOKEN=... or add api_token to {}",
            config.vaelis_home.join("config.toml").display());
    }

    match cli.command {
        None => tui::run(config, None).await.context("conversation ui failed"),
        Some(Commands::List) => commands::list(&config).await,
        Some(Commands::Open { id }) => tui::run(config, Some(id))
            .await
            .context("conversation ui failed"),
        Some(Commands::Ask {
            prompt,
            mode,
            search,
            conversation,
        }) => commands::ask(&config, prompt, mode, search, conversation).await,
    }
}
