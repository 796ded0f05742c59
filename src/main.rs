mod batch;
mod config;
mod error;
mod indicator;
mod model;
mod presenter;
mod processor;
mod source;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use batch::BatchRunner;
use config::AppConfig;
use indicator::engine::IndicatorEngine;
use presenter::Presenter;
use presenter::html::HtmlPresenter;
use presenter::json::JsonPresenter;
use presenter::terminal::TerminalPresenter;
use processor::TickerProcessor;
use source::PriceSource;
use source::yahoo::YahooSource;

const DEFAULT_CONFIG_PATH: &str = "ticker-scope.toml";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("price source error")]
    Source,
    #[display("input error")]
    Input,
    #[display("report output error")]
    Output,
    #[display("batch aborted")]
    Aborted,
}

#[derive(Parser)]
#[command(
    name = "ticker-scope",
    about = "Technical indicators (SMA, RSI, MACD, pivots) for stock tickers"
)]
struct Cli {
    /// Path to the TOML configuration file [default: ticker-scope.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format, overriding `display.format` ("text", "json" or "html")
    #[arg(short, long)]
    format: Option<String>,

    /// Comma-separated ticker symbols, e.g. "aapl, msft". Prompted for when omitted.
    tickers: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();

    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let mut config = config::load(&path, required).change_context(AppError::Config)?;
    if let Some(format) = cli.format {
        config.display.format = format;
        config::validate(&config).change_context(AppError::Config)?;
    }

    init_tracing(&config);

    let input = match cli.tickers {
        Some(tickers) => tickers,
        None => prompt_tickers().await?,
    };

    let source: Arc<dyn PriceSource> =
        Arc::new(YahooSource::new(&config.source).change_context(AppError::Source)?);
    let engine = IndicatorEngine::new(&config.indicators).change_context(AppError::Config)?;
    let processor = TickerProcessor::new(source, engine, config.source.range);
    let mut runner = BatchRunner::new(
        processor,
        build_presenter(&config)?,
        config.batch.failure_policy,
    );

    // ── Cancellation ──────────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, stopping after the current ticker");
            ctrl_c_cancel.cancel();
        }
    });

    let outcome = runner.run_input(&input, &cancel).await;
    info!(
        batch_id = %outcome.batch_id,
        state = %runner.state(),
        tickers = outcome.entries.len(),
        "run complete"
    );

    if let Some(message) = outcome.aborted {
        return Err(Report::new(AppError::Aborted).attach(message));
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_presenter(config: &AppConfig) -> Result<Arc<dyn Presenter>, Report<AppError>> {
    let display = &config.display;
    Ok(match display.format.as_str() {
        "json" => Arc::new(JsonPresenter::new()),
        "html" => Arc::new(
            HtmlPresenter::create(&display.report_path, display.precision)
                .change_context(AppError::Output)
                .attach_with(|| format!("path: {}", display.report_path.display()))?,
        ),
        _ => Arc::new(TerminalPresenter::new(display.precision)),
    })
}

async fn prompt_tickers() -> Result<String, Report<AppError>> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Enter tickers separated by commas: ")
        .await
        .change_context(AppError::Input)?;
    stdout.flush().await.change_context(AppError::Input)?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .change_context(AppError::Input)?;
    Ok(line)
}
