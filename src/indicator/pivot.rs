use crate::model::{Bar, PivotLevels};

/// Floor-trader pivot, first and second support/resistance for one bar.
pub fn pivot_levels(bar: &Bar) -> PivotLevels {
    let (high, low, close) = (bar.high, bar.low, bar.close);
    let pivot = (high + low + close) / 3.0;
    let range = high - low;
    PivotLevels {
        pivot,
        support1: 2.0 * pivot - high,
        resistance1: 2.0 * pivot - low,
        support2: pivot - range,
        resistance2: pivot + range,
    }
}
