use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::batch::TickerOutcome;
use crate::model::IndicatorResult;
use crate::presenter::{Presenter, SharedWriter, emit, labeled_fields};

/// Human-readable panels, one per ticker.
///
/// Results go to `out`; the loading lifecycle goes to `status` so piping
/// `out` elsewhere keeps only the panels.
pub struct TerminalPresenter {
    out: SharedWriter,
    status: SharedWriter,
    precision: usize,
}

impl TerminalPresenter {
    pub fn new(precision: usize) -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()), precision)
    }

    pub fn with_writers(
        out: Box<dyn Write + Send>,
        status: Box<dyn Write + Send>,
        precision: usize,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            status: Mutex::new(status),
            precision,
        }
    }

    fn render(&self, result: &IndicatorResult) -> String {
        let mut text = format!("\n{} (as of {})\n", result.ticker, result.as_of);
        for (label, value) in labeled_fields(result, self.precision) {
            let _ = writeln!(text, "  {label:<15}{value}");
        }
        text
    }
}

impl Presenter for TerminalPresenter {
    fn batch_started(&self, tickers: usize) {
        emit(&self.status, &format!("Loading {tickers} ticker(s)...\n"));
    }

    fn ticker(&self, outcome: &TickerOutcome) {
        let text = match &outcome.result {
            Ok(result) => self.render(result),
            Err(failure) if outcome.ticker.is_empty() => format!("\n{}\n", failure.message),
            Err(failure) => format!("\n{}: {}\n", outcome.ticker, failure.message),
        };
        emit(&self.out, &text);
    }

    fn batch_aborted(&self, message: &str) {
        emit(&self.out, &format!("\n{message}\n"));
    }

    fn batch_ended(&self) {
        emit(&self.status, "Done.\n");
    }
}
