//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use mdgram_core::Dialect;
use mdgram_core::config;
use tracing_subscriber::EnvFilter;

mod commands;

const LOG_ENV: &str = "MDGRAM_LOG";

#[derive(Parser)]
#[command(name = "mdgram")]
#[command(version)]
#[command(about = "Render, split and deliver Markdown to Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug). Overrides MDGRAM_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Render Markdown in one dialect
    Render {
        /// Target dialect (html, markdown-v2, markdown, plain)
        #[arg(short, long, default_value = "html")]
        dialect: Dialect,

        /// Input file (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Render, split and balance Markdown into sendable chunks
    Split {
        /// Target dialect (html, markdown-v2, markdown, plain)
        #[arg(short, long, default_value = "html")]
        dialect: Dialect,

        /// Override chunking.max_chunk_chars from config
        #[arg(long, value_name = "N")]
        max_chars: Option<usize>,

        /// Print chunks as a JSON array
        #[arg(long)]
        json: bool,

        /// Input file (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Deliver Markdown to a Telegram chat, falling back to simpler formats
    Send {
        /// Destination chat id
        #[arg(long, allow_hyphen_values = true)]
        chat_id: i64,

        /// Forum topic inside the chat
        #[arg(long, value_name = "ID")]
        thread_id: Option<i64>,

        /// Reply to this message id
        #[arg(long, value_name = "ID")]
        reply_to: Option<i64>,

        /// Bot token (overrides config and MDGRAM_TELEGRAM_BOT_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        bot_token: Option<String>,

        /// Input file (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print the default configuration
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

fn init_logging(verbose: u8) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("install log subscriber: {err}"))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let load_config = || config::Config::load().context("load config");

    match cli.command {
        Commands::Render { dialect, file } => commands::render::run(dialect, file.as_deref()),
        Commands::Split {
            dialect,
            max_chars,
            json,
            file,
        } => commands::split::run(
            &load_config()?,
            &commands::split::SplitOptions {
                dialect,
                max_chars,
                json,
                file: file.as_deref(),
            },
        ),
        Commands::Send {
            chat_id,
            thread_id,
            reply_to,
            bot_token,
            file,
        } => {
            commands::send::run(
                &load_config()?,
                &commands::send::SendOptions {
                    chat_id,
                    thread_id,
                    reply_to,
                    bot_token: bot_token.as_deref(),
                    file: file.as_deref(),
                },
            )
            .await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}
