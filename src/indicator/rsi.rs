use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, close_prices};
use crate::model::Bar;

/// How gains and losses are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiMethod {
    /// Total gains over total losses across the whole series.
    #[default]
    Cumulative,
    /// Wilder's smoothing over `period` deltas.
    Wilder,
}

/// RSI (Relative Strength Index).
pub struct Rsi {
    period: usize,
    method: RsiMethod,
}

impl Rsi {
    pub fn new(period: usize, method: RsiMethod) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period, method })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        if prices.len() < self.required_candles() {
            bail!(IndicatorError::InsufficientData {
                required: self.required_candles(),
                available: prices.len(),
            });
        }

        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

        match self.method {
            RsiMethod::Cumulative => Ok(vec![cumulative(&deltas)]),
            RsiMethod::Wilder => Ok(wilder(&deltas, self.period)),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_candles(&self) -> usize {
        match self.method {
            RsiMethod::Cumulative => self.period,
            RsiMethod::Wilder => self.period + 1,
        }
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        self.calculate_prices(&close_prices(bars))
    }
}

fn cumulative(deltas: &[f64]) -> f64 {
    let gains: f64 = deltas.iter().map(|&d| d.max(0.0)).sum();
    let losses: f64 = deltas.iter().map(|&d| (-d).max(0.0)).sum();
    rsi_value(gains, losses)
}

fn wilder(deltas: &[f64], period: usize) -> Vec<f64> {
    // Seed using simple average of first `period` gains/losses
    let mut avg_gain: f64 =
        deltas[..period].iter().map(|&d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss: f64 =
        deltas[..period].iter().map(|&d| (-d).max(0.0)).sum::<f64>() / period as f64;

    let mut results = vec![rsi_value(avg_gain, avg_loss)];

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        results.push(rsi_value(avg_gain, avg_loss));
    }

    results
}

/// Zero losses (including a flat series) reads as 100.
fn rsi_value(gain: f64, loss: f64) -> f64 {
    if loss == 0.0 {
        return 100.0;
    }
    let rs = gain / loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::from_closes;

    #[test]
    fn rsi_period_zero_invalid() {
        assert!(Rsi::new(0, RsiMethod::Cumulative).is_err());
    }

    #[test]
    fn rsi_insufficient_data() {
        let rsi = Rsi::new(14, RsiMethod::Cumulative).unwrap();
        let bars = from_closes(&[1.0; 13]);
        assert!(rsi.calculate(&bars).is_err());
        assert_eq!(rsi.latest(&bars).unwrap(), None);
    }

    #[test]
    fn cumulative_needs_period_closes_wilder_needs_one_more() {
        let bars = from_closes(&[1.0; 14]);
        let cumulative = Rsi::new(14, RsiMethod::Cumulative).unwrap();
        let wilder = Rsi::new(14, RsiMethod::Wilder).unwrap();
        assert!(cumulative.latest(&bars).unwrap().is_some());
        assert!(wilder.latest(&bars).unwrap().is_none());
    }

    #[test]
    fn cumulative_known_value() {
        // deltas: +2, -1, +1, -2 -> gains 3, losses 3 -> RS 1 -> RSI 50
        let rsi = Rsi::new(3, RsiMethod::Cumulative).unwrap();
        let values = rsi.calculate_prices(&[10.0, 12.0, 11.0, 12.0, 10.0]).unwrap();
        assert_eq!(values.len(), 1);
        assert!((values[0] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn no_losses_returns_100() {
        for method in [RsiMethod::Cumulative, RsiMethod::Wilder] {
            let rsi = Rsi::new(3, method).unwrap();
            let values = rsi.calculate_prices(&[1.0, 2.0, 3.0, 4.0]).unwrap();
            assert_eq!(values[0], 100.0);
        }
    }

    #[test]
    fn flat_series_returns_100() {
        let rsi = Rsi::new(14, RsiMethod::Cumulative).unwrap();
        assert_eq!(rsi.latest(&from_closes(&[5.0; 30])).unwrap(), Some(100.0));
    }

    #[test]
    fn all_losses_returns_0() {
        let rsi = Rsi::new(3, RsiMethod::Wilder).unwrap();
        let values = rsi.calculate_prices(&[4.0, 3.0, 2.0, 1.0]).unwrap();
        assert!(values[0].abs() < 1e-9);
    }

    #[test]
    fn rsi_is_bounded() {
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 8.0 + (i % 7) as f64)
            .collect();
        for method in [RsiMethod::Cumulative, RsiMethod::Wilder] {
            let values = Rsi::new(14, method).unwrap().calculate_prices(&prices).unwrap();
            for v in values {
                assert!((0.0..=100.0).contains(&v), "{method:?} gave {v}");
            }
        }
    }

    #[test]
    fn wilder_output_length() {
        let rsi = Rsi::new(14, RsiMethod::Wilder).unwrap();
        let values = rsi.calculate(&from_closes(&[100.0_f64; 20])).unwrap();
        // 20 prices -> 19 deltas -> 1 seed + 5 subsequent = 6 values
        assert_eq!(values.len(), 20 - 14);
    }

    #[test]
    fn method_parses_from_config_string() {
        let method: RsiMethod = serde_json::from_str("\"wilder\"").unwrap();
        assert_eq!(method, RsiMethod::Wilder);
    }
}
