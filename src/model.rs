use std::fmt;

use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::{InputError, ProcessError};

/// A normalized ticker symbol: trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize and validate a raw ticker token.
    ///
    /// Accepts ASCII alphanumerics plus `.`, `-`, `^` and `=` so that share
    /// classes (`BRK-B`), indices (`^GSPC`) and FX pairs (`EURUSD=X`) pass.
    pub fn parse(raw: &str) -> Result<Self, Report<InputError>> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            bail!(InputError::Empty);
        }
        let valid = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid {
            bail!(InputError::InvalidSymbol { input: normalized });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a comma-separated ticker list, preserving input order.
///
/// Blank tokens (e.g. a trailing comma) are skipped. Invalid tokens are kept
/// as errors so the caller can report them per ticker.
pub fn parse_ticker_list(input: &str) -> Vec<Result<Symbol, Report<InputError>>> {
    input
        .split(',')
        .filter(|token| {
            let blank = token.trim().is_empty();
            if blank {
                tracing::warn!(input, "skipping empty ticker token");
            }
            !blank
        })
        .map(Symbol::parse)
        .collect()
}

/// One daily OHLCV observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Validated daily bars for one ticker, oldest first.
///
/// Guaranteed non-empty, strictly ascending by date, and with finite OHLC
/// values on every bar.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: Symbol,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: Symbol, bars: Vec<Bar>) -> Result<Self, Report<ProcessError>> {
        let shape_error = |reason: String| ProcessError::DataShape {
            ticker: symbol.to_string(),
            reason,
        };

        if bars.is_empty() {
            bail!(shape_error("no price bars returned".into()));
        }

        for bar in &bars {
            let fields = [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
            ];
            if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
                bail!(shape_error(format!("missing {name} on {}", bar.date)));
            }
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            bail!(shape_error(format!(
                "bars out of order at {} -> {}",
                pair[0].date, pair[1].date
            )));
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Most recent bar. Always present because the series is non-empty.
    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Lookback window requested from the price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[default]
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
}

impl Lookback {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year5 => "5y",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    /// Trend-plus-momentum rule: buy above both averages while not
    /// overbought, sell below the long average while overbought.
    pub fn from_levels(close: f64, sma_short: f64, sma_long: f64, rsi: f64) -> Self {
        if close > sma_short && close > sma_long && rsi < 70.0 {
            Self::Buy
        } else if close < sma_long && rsi > 70.0 {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
            Self::Hold => write!(f, "Hold"),
        }
    }
}

/// Classic floor-trader pivot levels for a single bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub support1: f64,
    pub resistance1: f64,
    pub support2: f64,
    pub resistance2: f64,
}

/// Indicator snapshot for one ticker as of its most recent bar.
///
/// Numeric fields are `None` when the series is too short for the
/// indicator's window. Values are kept at full precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub ticker: Symbol,
    pub as_of: NaiveDate,
    pub close_price: f64,
    pub volume: u64,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub pivot: f64,
    pub support1: f64,
    pub resistance1: f64,
    pub support2: f64,
    pub resistance2: f64,
    pub recommendation: Option<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn symbol_is_trimmed_and_uppercased() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
    }

    #[test]
    fn symbol_accepts_class_index_and_fx_forms() {
        for raw in ["brk-b", "^gspc", "eurusd=x", "bf.b"] {
            assert!(Symbol::parse(raw).is_ok(), "{raw} should parse");
        }
    }

    #[test]
    fn symbol_rejects_empty_and_garbage() {
        assert!(matches!(
            Symbol::parse("   ").unwrap_err().current_context(),
            InputError::Empty
        ));
        assert!(matches!(
            Symbol::parse("AA PL").unwrap_err().current_context(),
            InputError::InvalidSymbol { .. }
        ));
    }

    #[test]
    fn ticker_list_keeps_order_and_skips_blanks() {
        let parsed = parse_ticker_list("aapl, msft,, ");
        let symbols: Vec<String> = parsed
            .into_iter()
            .map(|r| r.unwrap().to_string())
            .collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn ticker_list_keeps_invalid_tokens_in_place() {
        let parsed = parse_ticker_list("aapl, b@d, msft");
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].is_ok());
        assert!(parsed[1].is_err());
        assert!(parsed[2].is_ok());
    }

    #[test]
    fn series_rejects_empty_bars() {
        let err = PriceSeries::new(Symbol::parse("AAPL").unwrap(), vec![]).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProcessError::DataShape { ticker, .. } if ticker == "AAPL"
        ));
    }

    #[test]
    fn series_rejects_non_finite_values() {
        let mut bad = bar(2, 10.0);
        bad.low = f64::NAN;
        let err = PriceSeries::new(Symbol::parse("AAPL").unwrap(), vec![bar(1, 10.0), bad])
            .unwrap_err();
        let msg = err.current_context().to_string();
        assert!(msg.contains("missing low"), "{msg}");
    }

    #[test]
    fn series_rejects_unordered_dates() {
        let bars = vec![bar(2, 10.0), bar(1, 11.0)];
        assert!(PriceSeries::new(Symbol::parse("AAPL").unwrap(), bars).is_err());
    }

    #[test]
    fn series_exposes_last_bar_and_columns() {
        let series = PriceSeries::new(
            Symbol::parse("AAPL").unwrap(),
            vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().close, 12.0);
        assert_eq!(series.closes(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn lookback_serde_uses_range_strings() {
        let parsed: Lookback = serde_json::from_str("\"6mo\"").unwrap();
        assert_eq!(parsed, Lookback::Month6);
        assert_eq!(Lookback::default().as_str(), "1y");
    }

    #[test]
    fn recommendation_rule() {
        assert_eq!(Recommendation::from_levels(110.0, 100.0, 95.0, 55.0), Recommendation::Buy);
        assert_eq!(Recommendation::from_levels(90.0, 100.0, 95.0, 75.0), Recommendation::Sell);
        assert_eq!(Recommendation::from_levels(110.0, 100.0, 95.0, 75.0), Recommendation::Hold);
    }
}
