//! stock-buzz binary entrypoint.
//! Download community listings, rank entities by discussion, serve the results.
//!
//! Credentials come from the environment (`.env` is honoured); settings from
//! `$STOCK_BUZZ_CONFIG`, `config/stock_buzz.toml` or built-in defaults.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_buzz::analyze::digest::top_from_category;
use stock_buzz::config::credentials::{ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_USER_AGENT};
use stock_buzz::error::ConfigError;
use stock_buzz::ingest::reddit::RedditSource;
use stock_buzz::ingest::types::{ListingMode, TimeFilter};
use stock_buzz::ingest::{CategoryReport, CUSTOM_CATEGORY};
use stock_buzz::market::Market;
use stock_buzz::metrics::Metrics;
use stock_buzz::providers::{ProviderChain, SocialBuzzProvider};
use stock_buzz::{
    api, report, AnalyzeOptions, CollectionStore, Collector, Credentials, Downloader, DownloadOptions,
    PopularityAnalyzer, Settings, DEFAULT_LOG_FILTER,
};

#[derive(Debug, Parser)]
#[command(name = "stock-buzz", version, about = "Reddit stock popularity tracker")]
struct Cli {
    /// Settings file (overrides $STOCK_BUZZ_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data root (overrides settings and $REDDIT_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON log lines instead of compact text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download listings and merge them into the collections.
    Download {
        /// all | global_news | company_news | crypto_news | custom
        #[arg(long, default_value = "company_news")]
        category: String,
        /// Items per community.
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// hot | new | top | rising (unknown values fall back to hot)
        #[arg(long = "type", default_value = "hot")]
        mode: String,
        /// all | day | week | month | year (top only)
        #[arg(long, default_value = "week")]
        time_filter: String,
        #[arg(long)]
        force_refresh: bool,
        /// Explicit community list; stored under `custom`.
        #[arg(long, num_args = 1..)]
        communities: Vec<String>,
    },
    /// Verify that credentials are configured (no network call).
    Check,
    /// Popularity report for one symbol.
    Analyze {
        symbol: String,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        min_relevance: Option<f64>,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },
    /// Leaderboard over the configured entities.
    Rank {
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        min_relevance: Option<f64>,
        #[arg(long)]
        details: bool,
        #[arg(long)]
        full_posts: bool,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },
    /// Entities with at least `min_mentions` mentions recently.
    Trending {
        #[arg(long, default_value_t = 1)]
        days: u32,
        #[arg(long, default_value_t = 5)]
        min_mentions: usize,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },
    /// Head-to-head popularity of a few symbols.
    Compare {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },
    /// Top posts of one day in a category.
    Digest {
        #[arg(long, default_value = "company_news")]
        category: String,
        /// YYYY-MM-DD (UTC)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 20)]
        max_limit: usize,
        /// Only posts mentioning this symbol (company categories only).
        #[arg(long)]
        entity: Option<String>,
    },
    /// Social discussion report for one symbol through the provider chain.
    Report {
        symbol: String,
        /// Last day of the window, YYYY-MM-DD (UTC); today when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Serve the read-only HTTP API and /metrics.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(p) => Settings::from_path(p)?,
        None => Settings::load()?,
    };
    Ok(match &cli.data_dir {
        Some(d) => settings.with_data_root(d.clone()),
        None => settings,
    })
}

fn window_options(
    analyzer: &PopularityAnalyzer,
    days: Option<u32>,
    min_relevance: Option<f64>,
) -> Result<AnalyzeOptions> {
    let mut opts = analyzer.default_options();
    if let Some(d) = days {
        opts = opts.with_days(d);
    }
    if let Some(m) = min_relevance {
        if !(0.0..=1.0).contains(&m) {
            return Err(ConfigError::InvalidValue {
                field: "min_relevance",
                value: m.to_string(),
            }
            .into());
        }
        opts = opts.with_min_relevance(m);
    }
    Ok(opts)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Arc::new(load_settings(&cli)?);

    match cli.command {
        Command::Download {
            category,
            limit,
            mode,
            time_filter,
            force_refresh,
            communities,
        } => {
            let time_filter = TimeFilter::parse(&time_filter).ok_or(ConfigError::InvalidValue {
                field: "time_filter",
                value: time_filter.clone(),
            })?;
            let opts = DownloadOptions {
                limit,
                mode: ListingMode::parse_lenient(&mode),
                time_filter,
                force_refresh,
            };
            opts.validate()?;
            download(settings, &category, &communities, &opts).await
        }
        Command::Check => Ok(check()),
        Command::Analyze {
            symbol,
            days,
            min_relevance,
            format,
        } => {
            let analyzer = PopularityAnalyzer::new(settings.clone());
            let opts = window_options(&analyzer, days, min_relevance)?;
            let symbol = symbol.trim().to_ascii_uppercase();
            let result = analyzer.analyze(&symbol, &opts);
            match format {
                Output::Json => print_json(&result)?,
                Output::Text => println!(
                    "{}",
                    report::format_analysis(&result, settings.display_name(&symbol))
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Rank {
            top_n,
            days,
            min_relevance,
            details,
            full_posts,
            format,
        } => {
            let analyzer = PopularityAnalyzer::new(settings.clone());
            let opts = window_options(&analyzer, days, min_relevance)?;
            let top_n = top_n.unwrap_or(settings.analysis.top_n);
            if top_n == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "top_n",
                    value: "0".into(),
                }
                .into());
            }
            let result = analyzer.rank(None, &opts, top_n);
            match format {
                Output::Json => print_json(&result)?,
                Output::Text => println!("{}", report::format_ranking(&result, details, full_posts)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Trending {
            days,
            min_mentions,
            format,
        } => {
            let analyzer = PopularityAnalyzer::new(settings);
            let entries = analyzer.trending(days, min_mentions);
            match format {
                Output::Json => print_json(&entries)?,
                Output::Text => println!("{}", report::format_trending(&entries, days, min_mentions)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Compare {
            symbols,
            days,
            format,
        } => {
            let days = days.unwrap_or(settings.analysis.days_back);
            let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_ascii_uppercase()).collect();
            let analyzer = PopularityAnalyzer::new(settings);
            let result = analyzer.compare(&symbols, days);
            match format {
                Output::Json => print_json(&result)?,
                Output::Text => println!("{}", report::format_comparison(&result)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Digest {
            category,
            date,
            max_limit,
            entity,
        } => {
            let entity = entity.map(|e| e.trim().to_ascii_uppercase());
            let posts = top_from_category(&settings, &category, date, max_limit, entity.as_deref())?;
            println!("{}", report::format_digest(&posts));
            Ok(ExitCode::SUCCESS)
        }
        Command::Report { symbol, date, days } => {
            let symbol = symbol.trim().to_ascii_uppercase();
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let market = Market::classify(&symbol);
            tracing::info!(%symbol, %market, currency = market.currency().code, %date, days, "building report");

            let chain = ProviderChain::new().with(SocialBuzzProvider::new(settings));
            let outcome = chain.first_success(&symbol, date, days).await;
            for f in &outcome.failures {
                eprintln!("{}: {}", f.provider, f.error);
            }
            match outcome.text() {
                Some(text) => {
                    println!("{text}");
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::FAILURE),
            }
        }
        Command::Serve { addr } => {
            let metrics = Metrics::init()?;
            let app = api::create_router(api::AppState::new(settings)).merge(metrics.router());
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app).await.context("server error")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check() -> ExitCode {
    match Credentials::from_env() {
        Ok(c) => {
            println!("credentials configured (client id {}, user agent {})", c.client_id, c.user_agent);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("set {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET} (optionally {ENV_USER_AGENT})");
            ExitCode::FAILURE
        }
    }
}

async fn download(
    settings: Arc<Settings>,
    category: &str,
    communities: &[String],
    opts: &DownloadOptions,
) -> Result<ExitCode> {
    // Credentials are checked before anything touches the network.
    let credentials = Credentials::from_env()?;
    let source = RedditSource::new(credentials, &settings.collector)?;
    let store = CollectionStore::new(settings.data_root.clone());
    let collector = Collector::new(Arc::new(source), store, settings.collector.clone());
    let downloader = Downloader::new(collector, settings.clone());

    tracing::info!(
        category,
        limit = opts.limit,
        mode = %opts.mode,
        time_filter = %opts.time_filter,
        force_refresh = opts.force_refresh,
        data_root = %settings.data_root.display(),
        "download run"
    );

    let reports: Vec<CategoryReport> = if !communities.is_empty() {
        vec![downloader.download_custom(communities, opts).await?]
    } else if category == "all" {
        downloader.download_all(opts).await?
    } else if category == CUSTOM_CATEGORY {
        anyhow::bail!("category `custom` needs --communities");
    } else if settings.communities_for(category).is_none() {
        return Err(ConfigError::InvalidValue {
            field: "category",
            value: category.to_string(),
        }
        .into());
    } else {
        vec![downloader.download_category(category, None, opts).await?]
    };

    for r in &reports {
        let status = if r.success() { "ok" } else { "failed" };
        println!(
            "{}: {} ({}/{} communities)",
            r.category,
            status,
            r.succeeded(),
            r.communities.len()
        );
        for (name, s) in &r.communities {
            match (&s.merge, &s.error) {
                (Some(m), _) => println!(
                    "   r/{name}: {} collected, {} new, {} updated, {} unchanged, {} stored",
                    s.collected, m.new, m.updated, m.skipped, m.total
                ),
                (None, Some(e)) => println!("   r/{name}: failed ({e})"),
                (None, None) => println!("   r/{name}: failed"),
            }
        }
    }
    println!("data saved under {}", settings.data_root.display());

    if reports.iter().any(|r| r.success()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
