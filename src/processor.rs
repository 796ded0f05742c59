use std::sync::Arc;

use error_stack::{Report, ResultExt};
use tracing::info;

use crate::error::ProcessError;
use crate::indicator::engine::IndicatorEngine;
use crate::model::{IndicatorResult, Lookback, PriceSeries, Symbol};
use crate::source::PriceSource;

/// Fetch, validate and analyze a single ticker.
///
/// Holds no per-ticker state, so a failed ticker can simply be processed
/// again.
pub struct TickerProcessor {
    source: Arc<dyn PriceSource>,
    engine: IndicatorEngine,
    range: Lookback,
}

impl TickerProcessor {
    pub fn new(source: Arc<dyn PriceSource>, engine: IndicatorEngine, range: Lookback) -> Self {
        Self {
            source,
            engine,
            range,
        }
    }

    pub async fn process(&self, symbol: &Symbol) -> Result<IndicatorResult, Report<ProcessError>> {
        info!(
            ticker = %symbol,
            source = self.source.name(),
            range = %self.range,
            "fetching daily bars"
        );

        let bars = self
            .source
            .fetch_daily(symbol, self.range)
            .await
            .change_context(ProcessError::DataUnavailable {
                ticker: symbol.to_string(),
            })?;

        let series = PriceSeries::new(symbol.clone(), bars)?;

        let result = self
            .engine
            .compute(&series)
            .change_context(ProcessError::Computation {
                ticker: symbol.to_string(),
            })?;

        info!(
            ticker = %symbol,
            bars = series.len(),
            as_of = %result.as_of,
            close = result.close_price,
            "indicators ready"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorSettings;
    use crate::error::SourceError;
    use crate::indicator::test_bars::from_closes;
    use crate::source::stub::{Canned, StubSource};

    fn processor(source: StubSource) -> TickerProcessor {
        let engine = IndicatorEngine::new(&IndicatorSettings::default()).unwrap();
        TickerProcessor::new(Arc::new(source), engine, Lookback::Year1)
    }

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn computes_result_for_known_ticker() {
        let p = processor(StubSource::default().with_trend("AAPL", 252));
        let result = p.process(&symbol("aapl")).await.unwrap();
        assert_eq!(result.ticker.as_str(), "AAPL");
        assert!((result.close_price - (100.0 + 251.0 * 0.5)).abs() < 1e-9);
        assert!(result.sma20.is_some());
        assert!(result.sma50.is_some());
        assert!(result.macd_signal.is_some());
    }

    #[tokio::test]
    async fn fetch_failure_is_data_unavailable() {
        let p = processor(StubSource::default().with("BADTICK", Canned::NotFound));
        let err = p.process(&symbol("BADTICK")).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProcessError::DataUnavailable { ticker } if ticker == "BADTICK"
        ));
        assert!(err.downcast_ref::<SourceError>().is_some());
    }

    #[tokio::test]
    async fn empty_series_is_a_shape_error() {
        let p = processor(StubSource::default().with("EMPTY", Canned::Bars(vec![])));
        let err = p.process(&symbol("EMPTY")).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProcessError::DataShape { ticker, .. } if ticker == "EMPTY"
        ));
    }

    #[tokio::test]
    async fn missing_high_is_a_shape_error() {
        let mut bars = from_closes(&[10.0, 11.0, 12.0]);
        bars[2].high = f64::NAN;
        let p = processor(StubSource::default().with("GAPPY", Canned::Bars(bars)));
        let err = p.process(&symbol("GAPPY")).await.unwrap_err();
        assert!(err.current_context().to_string().contains("missing high"));
    }

    #[tokio::test]
    async fn overflow_is_a_computation_error() {
        let bars = from_closes(&[f64::MAX; 30]);
        let p = processor(StubSource::default().with("HUGE", Canned::Bars(bars)));
        let err = p.process(&symbol("HUGE")).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProcessError::Computation { .. }
        ));
    }

    #[tokio::test]
    async fn processing_twice_gives_same_result() {
        let p = processor(StubSource::default().with_trend("MSFT", 60));
        let first = p.process(&symbol("MSFT")).await.unwrap();
        let second = p.process(&symbol("MSFT")).await.unwrap();
        assert_eq!(first, second);
    }
}
