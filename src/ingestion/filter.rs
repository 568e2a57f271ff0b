//! Cargo Filter - keeps cargo and container vessels only

use crate::vessel::RawRow;
use std::ops::RangeInclusive;

/// AIS ship type codes for cargo vessels (70-79, inclusive).
pub const CARGO_TYPE_CODES: RangeInclusive<i64> = 70..=79;

/// `true` when the type code is present and in the cargo range.
pub fn is_cargo_type(code: Option<i64>) -> bool {
    code.map_or(false, |c| CARGO_TYPE_CODES.contains(&c))
}

/// Stateless per-batch predicate over parsed rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct CargoFilter;

impl CargoFilter {
    pub fn apply(&self, rows: Vec<RawRow>) -> Vec<RawRow> {
        rows.into_iter()
            .filter(|row| is_cargo_type(row.vessel_type_code))
            .collect()
    }
}
