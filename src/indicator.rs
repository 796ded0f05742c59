pub mod engine;
pub mod ma;
pub mod macd;
pub mod pivot;
pub mod rsi;

use error_stack::Report;

use crate::error::IndicatorError;
use crate::model::Bar;

/// A technical analysis indicator that operates on a slice of daily bars.
///
/// Bars must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one output value.
    fn required_candles(&self) -> usize;

    /// Calculate indicator values from bars.
    ///
    /// Returns one value per output point. The number of values may be less
    /// than the number of input bars depending on the indicator's lookback.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>>;

    /// Most recent value, or `None` when there is not enough history.
    ///
    /// Other errors are propagated.
    fn latest(&self, bars: &[Bar]) -> Result<Option<f64>, Report<IndicatorError>> {
        match self.calculate(bars) {
            Ok(values) => Ok(values.last().copied()),
            Err(e) if is_insufficient(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Whether a report only signals a too-short series.
pub fn is_insufficient(report: &Report<IndicatorError>) -> bool {
    matches!(
        report.current_context(),
        IndicatorError::InsufficientData { .. }
    )
}

#[cfg(test)]
pub(crate) mod test_bars {
    use chrono::NaiveDate;

    use crate::model::Bar;

    /// Flat bars (open = high = low = close) one day apart.
    pub fn from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1,
            })
            .collect()
    }
}
