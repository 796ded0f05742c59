pub mod html;
pub mod json;
pub mod terminal;

use std::io::Write;
use std::sync::Mutex;

use crate::batch::TickerOutcome;
use crate::model::IndicatorResult;

/// Sink for batch results and the loading lifecycle.
pub trait Presenter: Send + Sync {
    /// A batch of `tickers` entries has started; show the loading state.
    fn batch_started(&self, tickers: usize);

    /// One ticker finished, successfully or not.
    fn ticker(&self, outcome: &TickerOutcome);

    /// The batch stopped early on a failure; `message` replaces the results.
    fn batch_aborted(&self, message: &str);

    /// The batch is over; clear the loading state. Called exactly once per
    /// `batch_started`, on every exit path.
    fn batch_ended(&self);
}

/// Display form of an indicator value: fixed `precision` decimals, or
/// `n/a` when there was not enough history.
pub fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".into(),
    }
}

/// The labeled rows of a result panel, in display order.
pub fn labeled_fields(result: &IndicatorResult, precision: usize) -> Vec<(&'static str, String)> {
    let values = [
        ("Close Price", Some(result.close_price)),
        ("20-Day SMA", result.sma20),
        ("50-Day SMA", result.sma50),
        ("RSI", result.rsi),
        ("MACD", result.macd),
        ("MACD Signal", result.macd_signal),
        ("Pivot", Some(result.pivot)),
        ("Support 1", Some(result.support1)),
        ("Resistance 1", Some(result.resistance1)),
        ("Support 2", Some(result.support2)),
        ("Resistance 2", Some(result.resistance2)),
    ];

    let mut fields: Vec<(&'static str, String)> = values
        .into_iter()
        .map(|(label, value)| (label, format_value(value, precision)))
        .collect();
    fields.push(("Volume", result.volume.to_string()));
    fields.push((
        "Recommendation",
        result
            .recommendation
            .map_or_else(|| "n/a".to_owned(), |r| r.to_string()),
    ));
    fields
}

type SharedWriter = Mutex<Box<dyn Write + Send>>;

/// Write a block to a shared writer. Write errors are logged, not raised.
fn emit(writer: &SharedWriter, text: &str) {
    let Ok(mut out) = writer.lock() else {
        tracing::warn!("presenter writer lock poisoned");
        return;
    };
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        tracing::warn!(error = %e, "failed to write presenter output");
    }
}
