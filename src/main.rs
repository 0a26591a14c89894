use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webhook_picks::config::Config;
use webhook_picks::display::{render_blocks, render_plain};
use webhook_picks::extract::{AnalysisRecord, Extractor};
use webhook_picks::feed::cache::FileStore;
use webhook_picks::feed::recent::AnalysisFeed;
use webhook_picks::feed::types::AnalysisRequest;
use webhook_picks::feed::webhook::WebhookSource;
use webhook_picks::picks::SavePickData;
use webhook_picks::pipeline::fetch_and_publish;

#[derive(Parser)]
#[command(name = "webhook-picks", version, about = "Normalize AI picks from analysis webhooks")]
struct Cli {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract an analysis from a saved webhook response (`-` for stdin)
    Parse {
        input: String,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
        /// Publish the record to the recent-analyses cache
        #[arg(long)]
        save: bool,
        /// Print the saved-pick draft as JSON
        #[arg(long)]
        pick: bool,
    },
    /// Request a fresh analysis from the sport's webhook
    Fetch {
        /// Sport key; repeat for multi-sport requests (first is primary)
        #[arg(long, required = true)]
        sport: Vec<String>,
        /// "Team A vs Team B" or "Team A, Team B"; empty for general picks
        #[arg(long, default_value = "")]
        teams: String,
        #[arg(long)]
        persona: Option<String>,
        /// Target date (YYYY-MM-DD), defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        test: bool,
        #[arg(long)]
        json: bool,
    },
    /// List cached analyses, most recent first
    Recent {
        #[arg(long)]
        json: bool,
    },
    /// Poll the cache and print analyses as they arrive
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !cli.config.exists() {
        tracing::info!(path = %cli.config.display(), "config file not found; using defaults");
    }

    // Load saved webhook URLs from .env (real env vars take precedence)
    Config::load_env_file();

    match cli.command {
        Command::Parse { input, json, save, pick } => parse(&config, &input, json, save, pick),
        Command::Fetch {
            sport,
            teams,
            persona,
            date,
            test,
            json,
        } => {
            let persona = persona.unwrap_or_else(|| config.webhook.persona.clone());
            let mut request = AnalysisRequest::new(sport, &teams, &persona)
                .with_test(test || config.webhook.test);
            if let Some(date) = date {
                request = request.with_target_date(date);
            }
            fetch(&config, &request, json).await
        }
        Command::Recent { json } => recent(&config, json),
        Command::Watch => watch(&config).await,
    }
}

fn open_feed(config: &Config) -> Result<AnalysisFeed<FileStore>> {
    let store = FileStore::open(&config.feed.cache_path)?;
    AnalysisFeed::open(store, config.feed.capacity)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(Path::new(input))
        .with_context(|| format!("Failed to read response file: {}", input))
}

fn parse(config: &Config, input: &str, json: bool, save: bool, pick: bool) -> Result<()> {
    let body = read_input(input)?;
    let record = AnalysisRecord::new(Extractor::new(&config.extractor).extract(&body));

    if save {
        open_feed(config)?.publish(record.clone())?;
    }

    if pick {
        println!("{}", serde_json::to_string_pretty(&SavePickData::from_record(&record))?);
    } else if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

async fn fetch(config: &Config, request: &AnalysisRequest, json: bool) -> Result<()> {
    let url = config.webhook_url(&request.sport)?;
    let source = WebhookSource::new(url, config.webhook.request_timeout_ms)?;
    let mut feed = open_feed(config)?;
    let extractor = Extractor::new(&config.extractor);

    let record = fetch_and_publish(&source, &mut feed, &extractor, request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn recent(config: &Config, json: bool) -> Result<()> {
    let feed = open_feed(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&feed.recent().to_vec())?);
        return Ok(());
    }
    if feed.recent().is_empty() {
        println!("No analyses yet.");
        return Ok(());
    }
    for record in feed.recent().iter() {
        print_summary(record);
    }
    Ok(())
}

async fn watch(config: &Config) -> Result<()> {
    let mut feed = open_feed(config)?;
    let mut rx = feed.subscribe();
    let mut interval = tokio::time::interval(Duration::from_secs(config.feed.poll_interval_s.max(1)));
    println!(
        "Watching {} (every {}s, Ctrl-C to stop)",
        config.feed.cache_path.display(),
        config.feed.poll_interval_s.max(1)
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = feed.refresh() {
                    tracing::warn!(error = %e, "cache refresh failed");
                }
                while let Ok(record) = rx.try_recv() {
                    print_summary(&record);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_summary(record: &AnalysisRecord) {
    let a = &record.analysis;
    let teams = if a.teams.is_empty() { "general recommendations" } else { a.teams.as_str() };
    println!(
        "{}  {:<28} {:<6} {:<7} {}",
        record.received_at.format("%Y-%m-%d %H:%M"),
        teams,
        a.sport,
        a.confidence.as_str(),
        a.recommendation.as_deref().unwrap_or("-"),
    );
}

fn print_record(record: &AnalysisRecord) {
    let a = &record.analysis;
    println!();
    let teams = if a.teams.is_empty() { "general recommendations" } else { a.teams.as_str() };
    println!("  {}  {}", teams, a.sport);
    println!("  Confidence: {}{}", a.confidence, a.win_probability.map(|p| format!(" ({:.0}%)", p)).unwrap_or_default());
    if let Some(pick) = &a.recommendation {
        println!("  Pick:       {}", pick);
    }
    if let Some(bet_type) = &a.bet_type {
        println!("  Bet type:   {}", bet_type);
    }
    if let Some(units) = a.units {
        println!("  Units:      {}", units);
    }
    if let Some(odds) = &a.odds {
        println!("  Odds:       {}", odds);
    }
    for (label, side) in [("Favorite", &a.favorite), ("Underdog", &a.underdog)] {
        if let Some(side) = side {
            println!(
                "  {:<10}  {} ({}, implied {:.1}%)",
                format!("{}:", label),
                side.team,
                side.odds_display(),
                side.implied_probability() * 100.0
            );
        }
    }
    if let Some(correction) = &a.correction {
        println!("  ! {}", correction.note);
    }
    if !a.key_factors.is_empty() {
        println!("  Key factors:");
        for factor in &a.key_factors {
            println!("    - {}", factor);
        }
    }
    println!();
    for line in render_plain(&render_blocks(&a.reasoning_text)).lines() {
        println!("  {}", line);
    }
    println!();
}
