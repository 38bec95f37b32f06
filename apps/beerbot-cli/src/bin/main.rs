use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use beerbot_chat::{BeerBot, ConsoleSink, MessageSink, Outcome, SlackSink};
use beerbot_core::config::{Config, Environment, Settings};
use beerbot_core::data_processor::DataProcessor;
use beerbot_core::traits::DocumentStore;
use beerbot_core::types::SearchOptions;
use beerbot_store::TantivyStore;

#[derive(Debug, Parser)]
#[command(name = "beerbot", about = "Full-text search over beers and breweries, answered in chat")]
struct Cli {
    /// development, production or testing (defaults to RUST_ENV, then development)
    #[arg(short, long, global = true)]
    environment: Option<String>,

    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Slack API token, overrides slack.api_token
    #[arg(short = 's', long, global = true, env = "BEERBOT_SLACK_TOKEN", hide_env_values = true)]
    slack_token: Option<String>,

    /// Slack channel to post to, overrides slack.channel
    #[arg(long, global = true)]
    slack_channel: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a directory of <id>.json documents into the store
    Ingest {
        dir: PathBuf,
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
        /// Only load the first N files
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer a single command, e.g. `ask find beers called hazy ipa`
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Answer commands read from stdin until `/quit`
    Repl,
    /// Check that the store can be opened
    Ping,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(true).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let env = match &cli.environment {
        Some(name) => Environment::parse(name)?,
        None => Environment::from_env()?,
    };
    let mut overrides = Vec::new();
    if let Some(token) = &cli.slack_token {
        overrides.push(("slack.api_token", token.clone()));
    }
    if let Some(channel) = &cli.slack_channel {
        overrides.push(("slack.channel", channel.clone()));
    }
    Config::load_with_overrides(&cli.config_dir, env, &overrides)
        .with_context(|| format!("loading configuration from {}", cli.config_dir.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let settings = config.settings()?;
    init_tracing(&settings.logging.level);
    info!(env = ?config.env(), bucket = %settings.store.bucket, "starting beerbot");

    match cli.command {
        Command::Ingest { dir, batch_size, limit } => ingest(&settings, &dir, batch_size, limit),
        Command::Ask { text } => {
            let bot = build_bot(&settings)?;
            bot.handle(&text.join(" "))?;
            Ok(())
        }
        Command::Repl => repl(&build_bot(&settings)?),
        Command::Ping => match build_bot(&settings)?.handle("test my store connection")? {
            Outcome::Connected => Ok(()),
            _ => anyhow::bail!("store at {} is unreachable", settings.store.url),
        },
    }
}

fn build_bot(settings: &Settings) -> anyhow::Result<BeerBot<TantivyStore, Box<dyn MessageSink>>> {
    let store = TantivyStore::with_search_config(settings.store.clone(), &settings.search)?;
    let sink: Box<dyn MessageSink> = if settings.slack.api_token.is_some() && settings.slack.channel.is_some() {
        Box::new(SlackSink::new(&settings.slack)?)
    } else {
        Box::new(ConsoleSink::stdout())
    };
    let options = SearchOptions {
        limit: Some(settings.search.default_limit),
        highlight_style: settings.search.highlight_style,
        ..SearchOptions::default()
    };
    Ok(BeerBot::new(store, sink)?.with_options(options))
}

fn repl(bot: &BeerBot<TantivyStore, Box<dyn MessageSink>>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    print!("beerbot> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if !line.is_empty() {
            bot.handle(line)?;
        }
        print!("beerbot> ");
        io::stdout().flush()?;
    }
    Ok(())
}

fn ingest(settings: &Settings, dir: &Path, batch_size: usize, limit: Option<usize>) -> anyhow::Result<()> {
    let processor = limit.map_or_else(DataProcessor::new, DataProcessor::with_limit);
    let docs = processor.load_directory(dir)?;

    let mut store_config = settings.store.clone();
    store_config.create_if_missing = true;
    let store = TantivyStore::with_search_config(store_config, &settings.search)?;
    store.connect()?;

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut saved = 0;
    for batch in docs.chunks(batch_size.max(1)) {
        saved += store.save_many(batch)?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("done");
    info!(saved, total = store.num_docs()?, dir = %dir.display(), "ingest complete");
    println!("Ingested {saved} documents into bucket '{}'", settings.store.bucket);
    Ok(())
}
