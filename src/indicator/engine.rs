use error_stack::{Report, bail};

use crate::config::IndicatorSettings;
use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::indicator::ma::Sma;
use crate::indicator::macd::Macd;
use crate::indicator::pivot::pivot_levels;
use crate::indicator::rsi::Rsi;
use crate::model::{IndicatorResult, PriceSeries, Recommendation};

/// The fixed indicator set computed for every ticker.
pub struct IndicatorEngine {
    sma_short: Sma,
    sma_long: Sma,
    rsi: Rsi,
    macd: Macd,
}

impl IndicatorEngine {
    pub fn new(settings: &IndicatorSettings) -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            sma_short: Sma::new(settings.sma_short)?,
            sma_long: Sma::new(settings.sma_long)?,
            rsi: Rsi::new(settings.rsi_period, settings.rsi_method)?,
            macd: Macd::new(settings.macd_fast, settings.macd_slow, settings.macd_signal)?,
        })
    }

    /// Compute a snapshot as of the series' last bar.
    ///
    /// Windows longer than the series leave their field empty. A NaN or
    /// infinite output is an error.
    pub fn compute(&self, series: &PriceSeries) -> Result<IndicatorResult, Report<IndicatorError>> {
        let bars = series.bars();
        let closes = series.closes();
        let last = series.last();

        let sma20 = self.sma_short.latest(bars)?;
        let sma50 = self.sma_long.latest(bars)?;
        let rsi = self.rsi.latest(bars)?;
        let macd = self.macd.latest_reading(&closes)?;
        let levels = pivot_levels(last);

        let checks = [
            (self.sma_short.name(), sma20),
            (self.sma_long.name(), sma50),
            (self.rsi.name(), rsi),
            (self.macd.name(), macd.macd),
            ("macd signal", macd.signal),
            ("pivot", Some(levels.pivot)),
        ];
        if let Some((name, _)) = checks
            .iter()
            .find(|(_, v)| v.is_some_and(|v| !v.is_finite()))
        {
            bail!(IndicatorError::NonFinite {
                indicator: (*name).to_owned(),
            });
        }

        let recommendation = match (sma20, sma50, rsi) {
            (Some(short), Some(long), Some(rsi)) => {
                Some(Recommendation::from_levels(last.close, short, long, rsi))
            }
            _ => None,
        };

        tracing::debug!(
            ticker = %series.symbol(),
            bars = series.len(),
            ?sma20,
            ?sma50,
            ?rsi,
            macd = ?macd.macd,
            histogram = ?macd.histogram,
            "indicators computed"
        );

        Ok(IndicatorResult {
            ticker: series.symbol().clone(),
            as_of: last.date,
            close_price: last.close,
            volume: last.volume,
            sma20,
            sma50,
            rsi,
            macd: macd.macd,
            macd_signal: macd.signal,
            pivot: levels.pivot,
            support1: levels.support1,
            resistance1: levels.resistance1,
            support2: levels.support2,
            resistance2: levels.resistance2,
            recommendation,
        })
    }
}
