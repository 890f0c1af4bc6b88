//! Number rounding and C-style `%g` formatting for reports.

/// Round `error` to `significance` significant digits and `value` to the same
/// decimal place. A zero (or non-finite) error leaves both untouched.
pub fn round_to_significance(value: f64, error: f64, significance: u32) -> (f64, f64) {
    if error == 0.0 || !error.is_finite() {
        return (value, error);
    }
    let digits = -(error.abs().log10().floor() as i32) + significance as i32 - 1;
    (round_to_decimals(value, digits), round_to_decimals(error, digits))
}

/// Round to `digits` decimal places; negative `digits` round to tens, hundreds, ...
///
/// Returns `value` unchanged when the scaling would leave the f64 range.
pub fn round_to_decimals(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits.saturating_abs());
    let scaled = if digits >= 0 { value * factor } else { value / factor };
    if !factor.is_finite() || !scaled.is_finite() {
        return value;
    }
    if digits >= 0 {
        scaled.round() / factor
    } else {
        scaled.round() * factor
    }
}

/// Format like C's `printf("%g")` (6 significant digits).
pub fn format_g(value: f64) -> String {
    format_g_prec(value, 6)
}

/// Format like C's `printf("%.<precision>g")`.
pub fn format_g_prec(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

/// Scientific notation with a fixed number of mantissa decimals and a signed
/// two-digit exponent (`printf("%.<d>e")`).
pub fn format_e(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return format_g(value);
    }
    let sci = format!("{value:.decimals$e}");
    match sci.split_once('e') {
        Some((m, e)) => {
            let exponent = e.parse::<i32>().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{m}e{sign}{:02}", exponent.abs())
        }
        None => sci,
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
