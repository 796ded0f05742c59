use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::is_insufficient;

/// Latest MACD values; each is `None` while its window is still warming up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacdReading {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast: Ema::new(fast_period)?,
            slow: Ema::new(slow_period)?,
            signal: Ema::new(signal_period)?,
        })
    }

    /// MACD line history: fast EMA minus slow EMA, starting at the first
    /// point where the slow EMA has seen a full window.
    pub fn macd_line(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        let fast_ema = self.fast.calculate_prices(prices)?;
        let slow_ema = self.slow.calculate_prices(prices)?;

        let warmup = self.slow.period() - 1;
        Ok(fast_ema[warmup..]
            .iter()
            .zip(&slow_ema[warmup..])
            .map(|(f, s)| f - s)
            .collect())
    }

    pub fn name(&self) -> &str {
        "macd"
    }

    /// Latest MACD reading. The MACD line can be available before the signal.
    ///
    /// The signal is the EMA of the MACD line history, not of price.
    pub fn latest_reading(&self, prices: &[f64]) -> Result<MacdReading, Report<IndicatorError>> {
        let macd_line = match self.macd_line(prices) {
            Ok(line) => line,
            Err(e) if is_insufficient(&e) => return Ok(MacdReading::default()),
            Err(e) => return Err(e),
        };
        let macd = macd_line.last().copied();

        let signal = match self.signal.calculate_prices(&macd_line) {
            Ok(values) => values.last().copied(),
            Err(e) if is_insufficient(&e) => None,
            Err(e) => return Err(e),
        };

        Ok(MacdReading {
            macd,
            signal,
            histogram: macd.zip(signal).map(|(m, s)| m - s),
        })
    }
}
