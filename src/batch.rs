use std::fmt;
use std::sync::Arc;

use error_stack::Report;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{IndicatorError, InputError, ProcessError, SourceError};
use crate::model::{IndicatorResult, Symbol, parse_ticker_list};
use crate::presenter::Presenter;
use crate::processor::TickerProcessor;

/// What to do when one ticker fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Stop at the first failure and report a single batch error.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Loading,
    Processing { index: usize },
    Collected { index: usize },
    Done,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Processing { index } => write!(f, "processing #{index}"),
            Self::Collected { index } => write!(f, "collected #{index}"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    DataUnavailable,
    ComputationError,
}

/// Displayable error entry for a single ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TickerFailure {
    fn from_input(report: &Report<InputError>) -> Self {
        Self {
            kind: FailureKind::MalformedInput,
            message: report.current_context().to_string(),
        }
    }

    fn from_process(report: &Report<ProcessError>) -> Self {
        let kind = match report.current_context() {
            ProcessError::DataUnavailable { .. } | ProcessError::DataShape { .. } => {
                FailureKind::DataUnavailable
            }
            ProcessError::Computation { .. } => FailureKind::ComputationError,
        };

        let cause = report
            .downcast_ref::<SourceError>()
            .map(ToString::to_string)
            .or_else(|| report.downcast_ref::<IndicatorError>().map(ToString::to_string));

        let context = report.current_context().to_string();
        let message = match cause {
            Some(cause) => format!("{context} ({cause})"),
            None => context,
        };
        Self { kind, message }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerOutcome {
    pub ticker: String,
    pub result: Result<IndicatorResult, TickerFailure>,
}

/// Per-ticker outcomes in input order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub entries: Vec<TickerOutcome>,
    /// Set when `FailurePolicy::Abort` stopped the batch.
    pub aborted: Option<String>,
    pub cancelled: bool,
}

impl BatchOutcome {
    fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            entries: Vec::new(),
            aborted: None,
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }
}

/// Signals `batch_started` on creation and `batch_ended` on drop, so the
/// loading state is cleared however the batch exits.
struct LoadingGuard {
    presenter: Arc<dyn Presenter>,
}

impl LoadingGuard {
    fn engage(presenter: Arc<dyn Presenter>, tickers: usize) -> Self {
        presenter.batch_started(tickers);
        Self { presenter }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.presenter.batch_ended();
    }
}

/// Runs tickers one at a time through a `TickerProcessor`.
pub struct BatchRunner {
    processor: TickerProcessor,
    presenter: Arc<dyn Presenter>,
    policy: FailurePolicy,
    state: BatchState,
}

impl BatchRunner {
    pub fn new(
        processor: TickerProcessor,
        presenter: Arc<dyn Presenter>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            processor,
            presenter,
            policy,
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Parse a comma-separated ticker list and run it.
    pub async fn run_input(&mut self, input: &str, cancel: &CancellationToken) -> BatchOutcome {
        self.run(parse_ticker_list(input), cancel).await
    }

    /// Process `tickers` in order. Individual failures never stop the batch
    /// under `FailurePolicy::Continue`. `cancel` is checked between tickers.
    pub async fn run(
        &mut self,
        tickers: Vec<Result<Symbol, Report<InputError>>>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id);
        self.run_batch(batch_id, tickers, cancel)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &mut self,
        batch_id: Uuid,
        tickers: Vec<Result<Symbol, Report<InputError>>>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let tickers = if tickers.is_empty() {
            warn!("input held no tickers");
            vec![Err(Report::new(InputError::NoTickers))]
        } else {
            tickers
        };
        let total = tickers.len();
        info!(tickers = total, policy = ?self.policy, "batch started");

        self.transition(BatchState::Loading);
        let guard = LoadingGuard::engage(Arc::clone(&self.presenter), total);
        let mut outcome = BatchOutcome::new(batch_id);

        for (index, ticker) in tickers.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(processed = index, remaining = total - index, "batch cancelled");
                outcome.cancelled = true;
                break;
            }

            self.transition(BatchState::Processing { index });
            let entry = self.process_one(ticker).await;

            if entry.result.is_err() && self.policy == FailurePolicy::Abort {
                let message = format!(
                    "An error occurred while processing {}; remaining tickers were skipped.",
                    entry.ticker
                );
                warn!(ticker = %entry.ticker, "aborting batch on failure");
                self.presenter.batch_aborted(&message);
                outcome.entries.push(entry);
                outcome.aborted = Some(message);
                break;
            }

            self.presenter.ticker(&entry);
            outcome.entries.push(entry);
            self.transition(BatchState::Collected { index });
        }

        self.transition(BatchState::Done);
        drop(guard);

        info!(
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            cancelled = outcome.cancelled,
            aborted = outcome.aborted.is_some(),
            "batch finished"
        );
        outcome
    }

    async fn process_one(&self, ticker: Result<Symbol, Report<InputError>>) -> TickerOutcome {
        match ticker {
            Err(report) => {
                warn!(error = ?report, "rejected ticker input");
                let label = match report.current_context() {
                    InputError::InvalidSymbol { input } => input.clone(),
                    InputError::Empty | InputError::NoTickers => String::new(),
                };
                TickerOutcome {
                    ticker: label,
                    result: Err(TickerFailure::from_input(&report)),
                }
            }
            Ok(symbol) => {
                let result = match self.processor.process(&symbol).await {
                    Ok(result) => Ok(result),
                    Err(report) => {
                        warn!(ticker = %symbol, error = ?report, "ticker failed (continuing)");
                        Err(TickerFailure::from_process(&report))
                    }
                };
                TickerOutcome {
                    ticker: symbol.to_string(),
                    result,
                }
            }
        }
    }

    fn transition(&mut self, next: BatchState) {
        debug!(from = %self.state, to = %next, "batch state");
        self.state = next;
    }
}
