//! Quantity parsing, rounding and formatting.

use labstock_core::{DomainError, DomainResult};

/// Balances are reported with three decimals.
pub const BALANCE_DECIMALS: i32 = 3;

/// Round to [`BALANCE_DECIMALS`] places. Only used at query boundaries.
pub fn round3(value: f64) -> f64 {
    let factor = 10f64.powi(BALANCE_DECIMALS);
    let rounded = (value * factor).round() / factor;
    // Avoid reporting "-0" for tiny negative residues.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Parse a numeric cell. Blank cells are `None`, as are cells that do not
/// hold a finite number.
pub fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validate a strictly positive quantity.
pub fn positive(field: &'static str, value: Option<f64>) -> DomainResult<f64> {
    match value {
        None => Err(DomainError::validation(format!("{field} is required"))),
        Some(v) if !v.is_finite() => Err(DomainError::validation(format!(
            "{field} must be a finite number"
        ))),
        Some(v) if v <= 0.0 => Err(DomainError::validation(format!(
            "{field} must be greater than zero"
        ))),
        Some(v) => Ok(v),
    }
}

/// Validate a finite quantity that may be zero.
pub fn non_negative(field: &'static str, value: Option<f64>) -> DomainResult<f64> {
    match value {
        None => Err(DomainError::validation(format!("{field} is required"))),
        Some(v) if !v.is_finite() => Err(DomainError::validation(format!(
            "{field} must be a finite number"
        ))),
        Some(v) if v < 0.0 => Err(DomainError::validation(format!(
            "{field} must not be negative"
        ))),
        Some(v) => Ok(v),
    }
}

/// Render a quantity for a table cell (shortest form that round-trips).
pub fn format_quantity(value: f64) -> String {
    format!("{value}")
}
