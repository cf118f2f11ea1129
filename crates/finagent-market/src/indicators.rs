//! Technical indicators
//!
//! Both functions return one value per input close, `None` where the window
//! is not yet full, rounded to two decimals.

use crate::error::{MarketError, Result};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Simple moving average of `closes` over `period` bars
///
/// Entry `i` is the mean of `closes[i + 1 - period..=i]`; the first
/// `period - 1` entries are `None`.
pub fn sma(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut indicator =
        SimpleMovingAverage::new(period).map_err(|e| MarketError::Indicator(e.to_string()))?;

    Ok(closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = indicator.next(close);
            (i + 1 >= period).then(|| round2(value))
        })
        .collect())
}

/// Relative strength index with Wilder smoothing
///
/// The first averages are plain means of the first `period` gains and
/// losses; after that `avg = (prev * (period - 1) + current) / period`.
/// The first `period` entries are `None`.
pub fn rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(MarketError::Indicator("period must be positive".to_string()));
    }

    let mut out = vec![None; closes.len()];
    if closes.len() <= period {
        return Ok(out);
    }

    let p = period as f64;
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        avg_gain += change.max(0.0);
        avg_loss += (-change).max(0.0);
    }
    avg_gain /= p;
    avg_loss /= p;
    out[period] = Some(round2(rsi_value(avg_gain, avg_loss)));

    for i in period + 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
        out[i] = Some(round2(rsi_value(avg_gain, avg_loss)));
    }

    Ok(out)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 0.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
