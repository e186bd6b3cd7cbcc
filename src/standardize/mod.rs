//! Archive standardizers: adapters that map a raw archive download into the
//! canonical [`StandardizedTable`] layout.
//!
//! Querying an archive is a collaborator concern; what arrives here is a
//! [`RawTable`], a plain named-column grid of loosely typed values. Each
//! archive gets its own [`Standardizer`] leaf that knows that archive's
//! column names, units, and sentinel conventions and nothing else.

mod gaia;
mod lspm;
mod tic;

pub use gaia::GaiaStandardizer;
pub use lspm::LspmStandardizer;
pub use tic::TicStandardizer;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};

/// Distance assigned to rows whose parallax is unusable, parsecs.
///
/// Far enough to be obviously fake, finite enough not to poison propagation.
pub const DISTANCE_SENTINEL_PC: f64 = 10_000.0;

/// One cell of a raw archive download.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Real(f64),
    /// Integer identifiers are kept exact; Gaia source ids overflow the
    /// 53-bit mantissa of an `f64`.
    Int(i64),
    Null,
}

impl RawValue {
    /// Numeric view of the cell, if it has one.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            RawValue::Real(v) => Some(*v),
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Text(s) => s.trim().parse().ok(),
            RawValue::Null => None,
        }
    }

    /// Textual view of the cell; `Null` renders as the empty string.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Real(v) => v.to_string(),
            RawValue::Int(v) => v.to_string(),
            RawValue::Null => String::new(),
        }
    }
}

/// A raw archive download: named columns over row-oriented storage.
///
/// This is the shape contract with out-of-scope query code; standardizers
/// only ever read it.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new<I, S>(columns: I) -> RawTable
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawTable {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row. The row must match the column count exactly.
    pub fn push_row(&mut self, row: Vec<RawValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(CatalogError::ShapeMismatch {
                column: format!("row {}", self.rows.len()),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CatalogError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// A whole column as numbers; unusable cells come back as `None`.
    pub fn real(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.index_of(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_real()).collect())
    }

    /// A whole column as text; `Null` cells come back empty.
    pub fn text(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.index_of(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_text()).collect())
    }
}

/// An archive adapter: turns that archive's raw download into a [`Catalog`].
///
/// Composition, not inheritance: each adapter is an independent leaf with no
/// shared base state.
pub trait Standardizer {
    fn standardize(&self, raw: &RawTable) -> Result<Catalog>;
}

// ── Shared column hygiene ───────────────────────────────────────────────

/// Required numeric column: every cell must be present and finite.
pub(crate) fn require_finite(name: &str, values: Vec<Option<f64>>) -> Result<Vec<f64>> {
    for (row, v) in values.iter().enumerate() {
        match v {
            Some(x) if x.is_finite() => {}
            _ => {
                return Err(CatalogError::Parse {
                    line: row,
                    reason: format!("column '{name}' is null or non-finite"),
                })
            }
        }
    }
    Ok(values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

/// Motion-style column: null or non-finite cells become 0.0, each
/// substitution reported.
pub(crate) fn zero_when_unusable(name: &str, values: Vec<Option<f64>>) -> Vec<f64> {
    let mut substituted = 0usize;
    let cleaned = values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(x) if x.is_finite() => x,
            _ => {
                debug!(column = name, row, "unusable value replaced with 0");
                substituted += 1;
                0.0
            }
        })
        .collect();
    if substituted > 0 {
        warn!(
            column = name,
            count = substituted,
            "replaced unusable values with 0"
        );
    }
    cleaned
}

/// Magnitude-style column: absent measurements stay absent, as NaN.
pub(crate) fn nan_when_missing(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

/// Convert parallaxes (mas) into distances (pc) with fractional-error
/// propagation.
///
/// Rows whose parallax is non-positive or has signal-to-noise below 1 get
/// [`DISTANCE_SENTINEL_PC`] and a NaN error; each substitution is reported.
pub(crate) fn distances_from_parallax(
    parallax_mas: &[f64],
    parallax_error_mas: &[Option<f64>],
) -> (Vec<f64>, Vec<f64>) {
    let mut sentinels = 0usize;
    let mut distances = Vec::with_capacity(parallax_mas.len());
    let mut errors = Vec::with_capacity(parallax_mas.len());

    for (row, &plx) in parallax_mas.iter().enumerate() {
        let err = parallax_error_mas[row];
        let snr_ok = match err {
            Some(e) if e.is_finite() && e > 0.0 => plx / e >= 1.0,
            _ => false,
        };
        if plx > 0.0 && snr_ok {
            let d = 1000.0 / plx;
            distances.push(d);
            errors.push(d * err.unwrap_or(f64::NAN) / plx);
        } else {
            debug!(row, parallax = plx, "unusable parallax replaced with sentinel distance");
            sentinels += 1;
            distances.push(DISTANCE_SENTINEL_PC);
            errors.push(f64::NAN);
        }
    }
    if sentinels > 0 {
        warn!(
            count = sentinels,
            sentinel_pc = DISTANCE_SENTINEL_PC,
            "assigned sentinel distances for unusable parallaxes"
        );
    }
    (distances, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_enforces_arity() {
        let mut raw = RawTable::new(["a", "b"]);
        assert!(raw
            .push_row(vec![RawValue::Real(1.0), RawValue::Null])
            .is_ok());
        assert!(matches!(
            raw.push_row(vec![RawValue::Real(1.0)]),
            Err(CatalogError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_column_is_typed() {
        let raw = RawTable::new(["a"]);
        assert!(matches!(
            raw.real("b"),
            Err(CatalogError::MissingColumn { .. })
        ));
    }

    #[test]
    fn accessors_coerce_cells() {
        let mut raw = RawTable::new(["x"]);
        raw.push_row(vec![RawValue::Int(4902158591071738624)]).unwrap();
        raw.push_row(vec![RawValue::Text("2.5".to_string())]).unwrap();
        raw.push_row(vec![RawValue::Null]).unwrap();

        let text = raw.text("x").unwrap();
        assert_eq!(text[0], "4902158591071738624");
        assert_eq!(text[2], "");

        let real = raw.real("x").unwrap();
        assert_eq!(real[1], Some(2.5));
        assert_eq!(real[2], None);
    }

    #[test]
    fn unusable_motions_become_zero() {
        let cleaned = zero_when_unusable(
            "pm_ra_cosdec",
            vec![Some(3.0), None, Some(f64::NAN), Some(-1.5)],
        );
        assert_eq!(cleaned, vec![3.0, 0.0, 0.0, -1.5]);
    }

    #[test]
    fn low_snr_parallax_gets_sentinel() {
        let (d, e) = distances_from_parallax(
            &[100.0, 0.5, 0.0, 20.0],
            &[Some(1.0), Some(1.0), Some(1.0), None],
        );
        assert_eq!(d[0], 10.0);
        assert!((e[0] - 0.1).abs() < 1e-12);
        // snr < 1
        assert_eq!(d[1], DISTANCE_SENTINEL_PC);
        assert!(e[1].is_nan());
        // zeroed parallax
        assert_eq!(d[2], DISTANCE_SENTINEL_PC);
        // missing error
        assert_eq!(d[3], DISTANCE_SENTINEL_PC);
    }

    #[test]
    fn required_column_rejects_nulls() {
        let err = require_finite("ra", vec![Some(1.0), None]).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { line: 1, .. }));
    }
}
