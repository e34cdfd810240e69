//! # paperweek CLI
//!
//! Runs the paper ranking pipeline once and prints the ranking to stdout.
//! Progress and warnings go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! paperweek [--env-file PATH] [-v|-q] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `paperweek run` | Fetch, index, retrieve, rank and deliver (default) |
//! | `paperweek sources` | Show catalogs, providers and delivery target |
//! | `paperweek telegram chat-id` | Discover the chat id from the bot's latest update |
//! | `paperweek telegram test` | Send a test message to the configured chat |
//!
//! ## Examples
//!
//! ```bash
//! # Local models through Ollama, settings from ./.env
//! paperweek
//!
//! # One-off topic, arXiv only, no Telegram message
//! paperweek run --topic "quantum error correction" --sources arxiv --no-deliver
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paperweek::config::{self, Config, MAX_PAPERS_CAP};
use paperweek::deliver::{self, Delivery, TelegramDelivery};
use paperweek::http::build_client;
use paperweek::pipeline::{self, Components, DeliveryOutcome, RunSettings};
use paperweek::sources;

/// paperweek: a weekly top five of research papers, ranked by a language model.
///
/// Settings are read from the environment and an optional `.env` file.
#[derive(Parser)]
#[command(
    name = "paperweek",
    about = "Fetch recent papers, retrieve the most relevant ones and rank a top five with an LLM",
    version
)]
struct Cli {
    /// Read settings from this file instead of `./.env`.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once (the default command).
    Run(RunArgs),

    /// Show the configured catalogs, providers and delivery target.
    ///
    /// Makes no network calls; useful for checking a `.env` file.
    Sources,

    /// Telegram helpers.
    Telegram {
        #[command(subcommand)]
        action: TelegramAction,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Topic to search for. Overrides TECH_NEWS_TOPIC.
    #[arg(long)]
    topic: Option<String>,

    /// Maximum papers to fetch, capped at 15. Overrides MAX_PAPERS.
    #[arg(long)]
    max_papers: Option<usize>,

    /// Comma-separated catalogs. Overrides PAPER_SOURCES.
    #[arg(long)]
    sources: Option<String>,

    /// Print the ranking without sending it.
    #[arg(long)]
    no_deliver: bool,
}

#[derive(Subcommand)]
enum TelegramAction {
    /// Print the chat id of the latest message sent to the bot.
    ///
    /// Send any message to the bot first, then run this.
    ChatId,
    /// Send a test message to TELEGRAM_CHAT_ID.
    Test,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("paperweek=debug")
    } else if quiet {
        EnvFilter::new("paperweek=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paperweek=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = Config::from_env(cli.env_file.as_deref()).context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(cfg, args).await?,
        Commands::Sources => sources::list_sources(&cfg),
        Commands::Telegram { action } => telegram(&cfg, action).await?,
    }

    Ok(())
}

async fn run(mut cfg: Config, args: RunArgs) -> Result<()> {
    if let Some(topic) = args.topic {
        if topic.trim().is_empty() {
            bail!("--topic must not be empty");
        }
        cfg.topic = topic;
    }
    if let Some(max) = args.max_papers {
        if max == 0 {
            bail!("--max-papers must be positive");
        }
        if max > MAX_PAPERS_CAP {
            warn!(
                requested = max,
                cap = MAX_PAPERS_CAP,
                "--max-papers exceeds the cap; using the cap"
            );
        }
        cfg.max_papers = max.min(MAX_PAPERS_CAP);
    }
    if let Some(list) = args.sources {
        cfg.catalogs = config::parse_catalogs(&list).context("invalid --sources")?;
    }

    let client = build_client(cfg.timeout_secs)?;
    let components = Components::from_config(&cfg, &client);
    components
        .preflight()
        .await
        .context("local model server is not ready")?;

    let mut settings = RunSettings::from_config(&cfg);
    settings.deliver = !args.no_deliver;

    let report = pipeline::run(&components, &settings).await?;

    println!(
        "Top {} papers for \"{}\" ({} fetched, {} retrieved)\n",
        report.ranking.items.len(),
        report.topic,
        report.fetched,
        report.retrieved.len()
    );
    print!("{}", report.ranking);

    match &report.delivery {
        DeliveryOutcome::Delivered { messages } => info!(messages, "ranking sent to Telegram"),
        DeliveryOutcome::Skipped(reason) => info!(reason = %reason, "ranking not sent"),
        DeliveryOutcome::Failed(e) => warn!(error = %e, "ranking could not be sent"),
    }
    if report.catalog_failures > 0 {
        warn!(
            failed = report.catalog_failures,
            "some catalogs failed; the ranking covers the rest"
        );
    }

    Ok(())
}

async fn telegram(cfg: &Config, action: TelegramAction) -> Result<()> {
    let Some(telegram) = cfg.telegram.as_ref() else {
        bail!("TELEGRAM_BOT_TOKEN is not set; create a bot with @BotFather and set the token");
    };
    let client = build_client(cfg.timeout_secs)?;

    match action {
        TelegramAction::ChatId => match deliver::discover_chat_id(&client, telegram).await? {
            Some(id) => println!("{}", id),
            None => bail!(
                "the bot has no recent messages; send it any message and run this command again"
            ),
        },
        TelegramAction::Test => {
            let Some((telegram, chat_id)) = cfg.delivery_target() else {
                bail!("TELEGRAM_CHAT_ID is not set; run `paperweek telegram chat-id` to find it");
            };
            let delivery = TelegramDelivery::new(client, telegram, chat_id);
            delivery.send(&deliver::test_message()).await?;
            println!("Test message sent to chat {}.", chat_id);
        }
    }

    Ok(())
}
