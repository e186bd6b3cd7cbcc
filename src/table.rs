//! The standardized catalog table: the canonical column layout every
//! archive-specific download is mapped into before further processing.
//!
//! Columns are grouped into identifiers (`<catalog>-id`), coordinates
//! (`ra`, `dec`, optional `pm_ra_cosdec`, `pm_dec`, `distance`,
//! `radial_velocity`, plus `obstime`), magnitudes (`<filter>-mag`), and
//! errors (`<field>-error`). The table is pure data: shape invariants are
//! checked at construction and the table is never mutated in place —
//! propagation and subsetting produce new tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;
use crate::error::{CatalogError, Result};

/// One identifier column (`<key>-id`). Values are stored as strings so
/// integer and string archive ids share one representation.
#[derive(Debug, Clone, PartialEq)]
pub struct IdColumn {
    pub key: String,
    pub values: Vec<String>,
}

/// One magnitude column (`<filter>-mag`). Magnitudes are plain reals with
/// no positivity or range invariant; absent measurements are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MagColumn {
    pub filter: String,
    pub values: Vec<f64>,
}

/// One error column (`<field>-error`), in the same unit as the field it
/// estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorColumn {
    pub field: String,
    pub values: Vec<f64>,
}

/// Observation epoch of the catalog rows: one epoch for the whole table,
/// or one per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ObsTime {
    Scalar(Epoch),
    PerRow(Vec<Epoch>),
}

impl ObsTime {
    /// Epoch of row `i`.
    pub fn epoch_at(&self, i: usize) -> Epoch {
        match self {
            ObsTime::Scalar(e) => *e,
            ObsTime::PerRow(v) => v[i],
        }
    }

    /// True when every row shares one epoch.
    pub fn is_uniform(&self) -> bool {
        match self {
            ObsTime::Scalar(_) => true,
            ObsTime::PerRow(v) => v.windows(2).all(|w| w[0] == w[1]),
        }
    }

    fn select(&self, indices: &[usize]) -> ObsTime {
        match self {
            ObsTime::Scalar(e) => ObsTime::Scalar(*e),
            ObsTime::PerRow(v) => ObsTime::PerRow(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Per-catalog metadata attached at construction time: display configuration
/// plus the query parameters that produced the table.
///
/// This is an explicit per-instance record rather than per-type shared state,
/// so two catalogs of the same archive never alias their configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMeta {
    /// Human-readable catalog name (e.g. `"Gaia"`).
    pub name: String,
    /// Which `<filter>-mag` column drives display and marker sizing.
    pub default_filter: String,
    /// Faintest magnitude the catalog was queried down to.
    pub magnitude_limit: f64,
    /// Query center `(ra, dec)` in degrees, if the catalog came from a cone.
    pub center_deg: Option<(f64, f64)>,
    /// Query radius in degrees; `f64::INFINITY` means all-sky.
    pub radius_deg: Option<f64>,
    /// Maximum distance in parsecs, for criteria searches.
    pub distance_limit_pc: Option<f64>,
    /// Literal query text sent to the archive, when available.
    pub query: Option<String>,
    /// Free-form extra metadata.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CatalogMeta {
    /// Metadata for a hand-built catalog with no archive provenance.
    pub fn custom() -> Self {
        CatalogMeta {
            name: "custom".to_string(),
            default_filter: "filter".to_string(),
            magnitude_limit: 20.0,
            center_deg: None,
            radius_deg: None,
            distance_limit_pc: None,
            query: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Column-oriented table of stars in the canonical layout.
///
/// `ra`, `dec` (degrees) and `obstime` are required for every row; proper
/// motion (mas/yr), distance (pc), and radial velocity (km/s) are optional
/// column groups that are either fully present or fully absent — an absent
/// column is not the same as a zero-filled one.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedTable {
    pub identifiers: Vec<IdColumn>,
    pub ra: Vec<f64>,
    pub dec: Vec<f64>,
    pub pm_ra_cosdec: Option<Vec<f64>>,
    pub pm_dec: Option<Vec<f64>>,
    pub distance: Option<Vec<f64>>,
    pub radial_velocity: Option<Vec<f64>>,
    pub obstime: ObsTime,
    pub magnitudes: Vec<MagColumn>,
    pub errors: Vec<ErrorColumn>,
    pub meta: CatalogMeta,
}

impl StandardizedTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ra.len()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.ra.is_empty()
    }

    /// The primary identifier column (always the first one).
    pub fn primary_ids(&self) -> &IdColumn {
        &self.identifiers[0]
    }

    /// Check every shape invariant of the canonical layout.
    ///
    /// Enforces: at least one identifier column and one magnitude column,
    /// uniform column lengths, paired proper-motion columns, and uniqueness
    /// of the primary identifier.
    pub fn validate(&self) -> Result<()> {
        let n = self.ra.len();

        if self.identifiers.is_empty() {
            return Err(CatalogError::MissingColumn {
                column: "<catalog>-id".to_string(),
            });
        }
        if self.magnitudes.is_empty() {
            return Err(CatalogError::MissingColumn {
                column: "<filter>-mag".to_string(),
            });
        }
        if self.pm_ra_cosdec.is_some() != self.pm_dec.is_some() {
            let missing = if self.pm_ra_cosdec.is_some() {
                "pm_dec"
            } else {
                "pm_ra_cosdec"
            };
            return Err(CatalogError::MissingColumn {
                column: missing.to_string(),
            });
        }

        check_len("dec", self.dec.len(), n)?;
        for col in &self.identifiers {
            check_len(&format!("{}-id", col.key), col.values.len(), n)?;
        }
        for col in &self.magnitudes {
            check_len(&format!("{}-mag", col.filter), col.values.len(), n)?;
        }
        for col in &self.errors {
            check_len(&format!("{}-error", col.field), col.values.len(), n)?;
        }
        for (name, col) in [
            ("pm_ra_cosdec", &self.pm_ra_cosdec),
            ("pm_dec", &self.pm_dec),
            ("distance", &self.distance),
            ("radial_velocity", &self.radial_velocity),
        ] {
            if let Some(values) = col {
                check_len(name, values.len(), n)?;
            }
        }
        if let ObsTime::PerRow(v) = &self.obstime {
            check_len("obstime", v.len(), n)?;
        }

        // Primary identifier must be unique within the catalog.
        let primary = &self.identifiers[0].values;
        let mut seen = std::collections::HashSet::with_capacity(n);
        for id in primary {
            if !seen.insert(id.as_str()) {
                return Err(CatalogError::DuplicateId { id: id.clone() });
            }
        }

        Ok(())
    }

    /// New table holding only the given rows, in the given order.
    /// Metadata is preserved.
    pub fn select(&self, indices: &[usize]) -> StandardizedTable {
        let pick = |v: &Vec<f64>| indices.iter().map(|&i| v[i]).collect::<Vec<f64>>();
        StandardizedTable {
            identifiers: self
                .identifiers
                .iter()
                .map(|c| IdColumn {
                    key: c.key.clone(),
                    values: indices.iter().map(|&i| c.values[i].clone()).collect(),
                })
                .collect(),
            ra: pick(&self.ra),
            dec: pick(&self.dec),
            pm_ra_cosdec: self.pm_ra_cosdec.as_ref().map(pick),
            pm_dec: self.pm_dec.as_ref().map(pick),
            distance: self.distance.as_ref().map(pick),
            radial_velocity: self.radial_velocity.as_ref().map(pick),
            obstime: self.obstime.select(indices),
            magnitudes: self
                .magnitudes
                .iter()
                .map(|c| MagColumn {
                    filter: c.filter.clone(),
                    values: pick(&c.values),
                })
                .collect(),
            errors: self
                .errors
                .iter()
                .map(|c| ErrorColumn {
                    field: c.field.clone(),
                    values: pick(&c.values),
                })
                .collect(),
            meta: self.meta.clone(),
        }
    }
}

fn check_len(column: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CatalogError::ShapeMismatch {
            column: column.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> StandardizedTable {
        StandardizedTable {
            identifiers: vec![IdColumn {
                key: "object".to_string(),
                values: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }],
            ra: vec![10.0, 20.0, 30.0],
            dec: vec![-5.0, 0.0, 5.0],
            pm_ra_cosdec: None,
            pm_dec: None,
            distance: None,
            radial_velocity: None,
            obstime: ObsTime::Scalar(Epoch::j2000()),
            magnitudes: vec![MagColumn {
                filter: "V".to_string(),
                values: vec![1.0, 2.0, 3.0],
            }],
            errors: vec![],
            meta: CatalogMeta::custom(),
        }
    }

    #[test]
    fn valid_table_passes() {
        assert!(small_table().validate().is_ok());
    }

    #[test]
    fn mismatched_dec_fails() {
        let mut t = small_table();
        t.dec.pop();
        assert!(matches!(
            t.validate(),
            Err(CatalogError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_primary_id_fails() {
        let mut t = small_table();
        t.identifiers[0].values[2] = "a".to_string();
        assert!(matches!(t.validate(), Err(CatalogError::DuplicateId { .. })));
    }

    #[test]
    fn unpaired_proper_motion_fails() {
        let mut t = small_table();
        t.pm_ra_cosdec = Some(vec![0.0, 0.0, 0.0]);
        assert!(matches!(
            t.validate(),
            Err(CatalogError::MissingColumn { .. })
        ));
    }

    #[test]
    fn missing_magnitudes_fails() {
        let mut t = small_table();
        t.magnitudes.clear();
        assert!(matches!(
            t.validate(),
            Err(CatalogError::MissingColumn { .. })
        ));
    }

    #[test]
    fn select_reorders_rows_and_keeps_meta() {
        let t = small_table();
        let s = t.select(&[2, 0]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.identifiers[0].values, vec!["c", "a"]);
        assert_eq!(s.ra, vec![30.0, 10.0]);
        assert_eq!(s.meta, t.meta);
        assert!(s.validate().is_ok());
    }
}
