//! # Number Formatting
//!
//! Abbreviated display of large counters (`1500` -> `"1.50K"`).
//!
//! The quotient is taken as an `f64`, like a browser computes `n / 1000`.
//! Its exact binary value is then rounded to hundredths half-up with
//! integer math, which is what `Number.prototype.toFixed(2)` does. So
//! `1005` shows as `"1.00K"`: `1.005` is stored as `1.00499999...`.

const THOUSAND: u64 = 1_000;
const MILLION: u64 = 1_000_000;

/// Format a counter for display.
///
/// - below 1,000: plain decimal (`"999"`)
/// - below 1,000,000: thousands with two decimals (`"1.50K"`)
/// - otherwise: millions with two decimals (`"2.50M"`)
///
/// There is no tier above millions, and rounding never promotes a value to
/// the next tier: `999_999` formats as `"1000.00K"`.
pub fn format_large_number(value: u64) -> String {
    if value < THOUSAND {
        value.to_string()
    } else if value < MILLION {
        scaled(value, THOUSAND, 'K')
    } else {
        scaled(value, MILLION, 'M')
    }
}

/// Format an optional counter, rendering a missing one as `"-"`.
pub fn format_count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), format_large_number)
}

fn scaled(value: u64, unit: u64, suffix: char) -> String {
    let hundredths = round_hundredths(quotient(value, unit));
    format!("{}.{:02}{}", hundredths / 100, hundredths % 100, suffix)
}

// The single floating-point operation of this module.
#[allow(clippy::float_arithmetic)]
fn quotient(value: u64, unit: u64) -> f64 {
    value as f64 / unit as f64
}

/// `x * 100` rounded half-up, exact on the bits of `x`.
///
/// Only called with finite quotients of at least 1.
fn round_hundredths(x: f64) -> u64 {
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1075;
    let mantissa = (bits & ((1 << 52) - 1)) | (1 << 52);
    let scaled = u128::from(mantissa) * 100;

    if exponent >= 0 {
        return (scaled << exponent) as u64;
    }
    let shift = exponent.unsigned_abs();
    let whole = scaled >> shift;
    let rest = scaled & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    (whole + u128::from(rest >= half)) as u64
}
