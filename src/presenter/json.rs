use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

use crate::batch::{FailureKind, TickerOutcome};
use crate::model::IndicatorResult;
use crate::presenter::{Presenter, SharedWriter, emit};

/// One JSON object per line, values at full precision.
pub struct JsonPresenter {
    out: SharedWriter,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Line<'a> {
    Ok {
        #[serde(flatten)]
        result: &'a IndicatorResult,
    },
    Error {
        ticker: &'a str,
        kind: FailureKind,
        message: &'a str,
    },
    Aborted {
        message: &'a str,
    },
}

impl JsonPresenter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, line: &Line<'_>) {
        match serde_json::to_string(line) {
            Ok(json) => emit(&self.out, &format!("{json}\n")),
            Err(e) => tracing::warn!(error = %e, "failed to serialize result line"),
        }
    }
}

impl Default for JsonPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for JsonPresenter {
    fn batch_started(&self, tickers: usize) {
        tracing::debug!(tickers, "batch started");
    }

    fn ticker(&self, outcome: &TickerOutcome) {
        let line = match &outcome.result {
            Ok(result) => Line::Ok { result },
            Err(failure) => Line::Error {
                ticker: &outcome.ticker,
                kind: failure.kind,
                message: &failure.message,
            },
        };
        self.write_line(&line);
    }

    fn batch_aborted(&self, message: &str) {
        self.write_line(&Line::Aborted { message });
    }

    fn batch_ended(&self) {
        tracing::debug!("batch ended");
    }
}
