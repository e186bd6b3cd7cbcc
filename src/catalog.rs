//! The catalog entity: a standardized table of stars with typed accessors,
//! subsetting, epoch propagation, and cross-matching.
//!
//! A `Catalog` owns exactly one [`StandardizedTable`]. It is never mutated in
//! place: propagation and subsetting always produce new catalogs, so shared
//! tables carry no aliasing hazards.

use std::ops::Range;

use tracing::{debug, info, warn};

use crate::epoch::Epoch;
use crate::error::{CatalogError, Result};
use crate::table::{
    CatalogMeta, ErrorColumn, IdColumn, MagColumn, ObsTime, StandardizedTable,
};
use crate::Vector3;

/// Milliarcseconds per degree.
const MAS_PER_DEG: f64 = 3_600_000.0;

/// Coordinate arrays for building a catalog by hand.
///
/// `ra` and `dec` are required (degrees). Everything else is optional;
/// omitted optional columns are absent from the resulting table, not
/// zero-filled. Construct with struct-update syntax:
///
/// ```
/// use asterism::{Catalog, CoordinateArrays};
///
/// let catalog = Catalog::from_coordinates(CoordinateArrays {
///     ra: vec![10.0, 20.0],
///     dec: vec![-5.0, 5.0],
///     ..Default::default()
/// }).unwrap();
/// assert_eq!(catalog.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CoordinateArrays {
    /// Right ascension in degrees.
    pub ra: Vec<f64>,
    /// Declination in degrees.
    pub dec: Vec<f64>,
    /// Magnitudes; defaults to zero for every row.
    pub mag: Option<Vec<f64>>,
    /// Proper motion in RA (times cos dec), mas/yr.
    pub pm_ra_cosdec: Option<Vec<f64>>,
    /// Proper motion in Dec, mas/yr.
    pub pm_dec: Option<Vec<f64>>,
    /// Distance in parsecs.
    pub distance: Option<Vec<f64>>,
    /// Radial velocity in km/s.
    pub radial_velocity: Option<Vec<f64>>,
    /// Observation epoch applied to every row.
    pub obstime: Epoch,
    /// Identifiers; defaults to sequential strings `"0", "1", ...`.
    pub id: Option<Vec<String>>,
}

impl Default for CoordinateArrays {
    fn default() -> Self {
        CoordinateArrays {
            ra: Vec::new(),
            dec: Vec::new(),
            mag: None,
            pm_ra_cosdec: None,
            pm_dec: None,
            distance: None,
            radial_velocity: None,
            obstime: Epoch::j2000(),
            id: None,
        }
    }
}

/// Result of a nearest-neighbor cross-match, one entry per row of the
/// catalog the match was called on, in original row order.
///
/// `ref_indices[i]` is always the nearest reference row, valid even when
/// `matched[i]` is false — callers filter with the boolean mask. Multiple
/// rows may map to the same reference row.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatch {
    /// True when the nearest-neighbor separation is strictly below the
    /// match radius.
    pub matched: Vec<bool>,
    /// Index into the reference catalog of each row's nearest neighbor.
    pub ref_indices: Vec<usize>,
}

/// Read-only view of the coordinate column group.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatesView<'a> {
    pub ra: &'a [f64],
    pub dec: &'a [f64],
    pub pm_ra_cosdec: Option<&'a [f64]>,
    pub pm_dec: Option<&'a [f64]>,
    pub distance: Option<&'a [f64]>,
    pub radial_velocity: Option<&'a [f64]>,
    pub obstime: &'a ObsTime,
}

/// A collection of stars backed by one standardized table.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    table: StandardizedTable,
}

impl Catalog {
    /// Wrap a standardized table, checking every shape invariant.
    pub fn new(table: StandardizedTable) -> Result<Catalog> {
        table.validate()?;
        Ok(Catalog { table })
    }

    /// Build a catalog directly from coordinate arrays.
    ///
    /// Missing ids are synthesized as `"0", "1", ...`; missing magnitudes
    /// default to zero. All supplied arrays must share the length of `ra`,
    /// otherwise construction fails with [`CatalogError::ShapeMismatch`].
    pub fn from_coordinates(arrays: CoordinateArrays) -> Result<Catalog> {
        let n = arrays.ra.len();
        let id = arrays
            .id
            .unwrap_or_else(|| (0..n).map(|i| i.to_string()).collect());
        let mag = arrays.mag.unwrap_or_else(|| vec![0.0; n]);

        let table = StandardizedTable {
            identifiers: vec![IdColumn {
                key: "object".to_string(),
                values: id,
            }],
            ra: arrays.ra,
            dec: arrays.dec,
            pm_ra_cosdec: arrays.pm_ra_cosdec,
            pm_dec: arrays.pm_dec,
            distance: arrays.distance,
            radial_velocity: arrays.radial_velocity,
            obstime: ObsTime::Scalar(arrays.obstime),
            magnitudes: vec![MagColumn {
                filter: "filter".to_string(),
                values: mag,
            }],
            errors: Vec::new(),
            meta: CatalogMeta::custom(),
        };
        Catalog::new(table)
    }

    /// Number of stars.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the catalog holds no stars.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The underlying standardized table.
    pub fn table(&self) -> &StandardizedTable {
        &self.table
    }

    /// Catalog metadata (name, query parameters, display configuration).
    pub fn meta(&self) -> &CatalogMeta {
        &self.table.meta
    }

    // ── Typed column accessors ──────────────────────────────────────────

    /// Right ascension in degrees.
    pub fn ra(&self) -> &[f64] {
        &self.table.ra
    }

    /// Declination in degrees.
    pub fn dec(&self) -> &[f64] {
        &self.table.dec
    }

    /// Proper motion in RA (times cos dec), mas/yr, when present.
    pub fn pm_ra_cosdec(&self) -> Option<&[f64]> {
        self.table.pm_ra_cosdec.as_deref()
    }

    /// Proper motion in Dec, mas/yr, when present.
    pub fn pm_dec(&self) -> Option<&[f64]> {
        self.table.pm_dec.as_deref()
    }

    /// Distance in parsecs, when present.
    pub fn distance(&self) -> Option<&[f64]> {
        self.table.distance.as_deref()
    }

    /// Radial velocity in km/s, when present.
    pub fn radial_velocity(&self) -> Option<&[f64]> {
        self.table.radial_velocity.as_deref()
    }

    /// Observation epoch(s) of the rows.
    pub fn obstime(&self) -> &ObsTime {
        &self.table.obstime
    }

    /// Magnitudes in the catalog's default filter. Falls back to the first
    /// magnitude column when the configured default is not present.
    pub fn magnitude(&self) -> &[f64] {
        self.table
            .magnitudes
            .iter()
            .find(|c| c.filter == self.table.meta.default_filter)
            .unwrap_or(&self.table.magnitudes[0])
            .values
            .as_slice()
    }

    /// The catalog's single observation epoch.
    ///
    /// For a per-row `obstime` with varying values this falls back to the
    /// mean epoch and reports the approximation.
    pub fn epoch(&self) -> Epoch {
        match &self.table.obstime {
            ObsTime::Scalar(e) => *e,
            ObsTime::PerRow(v) => {
                if v.is_empty() {
                    return Epoch::j2000();
                }
                if self.table.obstime.is_uniform() {
                    v[0]
                } else {
                    let mean = v.iter().map(|e| e.decimal_year()).sum::<f64>() / v.len() as f64;
                    warn!(
                        catalog = %self.table.meta.name,
                        "per-row obstime is not uniform; using mean epoch {mean:.3}"
                    );
                    Epoch::from_decimal_year(mean)
                }
            }
        }
    }

    // ── Derived table views ─────────────────────────────────────────────

    /// The coordinate column group, restricted to columns actually present.
    pub fn coordinates_table(&self) -> CoordinatesView<'_> {
        CoordinatesView {
            ra: &self.table.ra,
            dec: &self.table.dec,
            pm_ra_cosdec: self.table.pm_ra_cosdec.as_deref(),
            pm_dec: self.table.pm_dec.as_deref(),
            distance: self.table.distance.as_deref(),
            radial_velocity: self.table.radial_velocity.as_deref(),
            obstime: &self.table.obstime,
        }
    }

    /// The identifier columns.
    pub fn identifiers_table(&self) -> &[IdColumn] {
        &self.table.identifiers
    }

    /// The magnitude columns.
    pub fn magnitudes_table(&self) -> &[MagColumn] {
        &self.table.magnitudes
    }

    /// The error columns.
    pub fn errors_table(&self) -> &[ErrorColumn] {
        &self.table.errors
    }

    // ── Indexing ────────────────────────────────────────────────────────

    /// Look up one star by its primary identifier.
    pub fn by_id(&self, id: &str) -> Result<Catalog> {
        self.by_ids(&[id])
    }

    /// Look up several stars by their primary identifiers, preserving the
    /// requested order.
    pub fn by_ids(&self, ids: &[&str]) -> Result<Catalog> {
        let primary = &self.table.primary_ids().values;
        let mut indices = Vec::with_capacity(ids.len());
        for &id in ids {
            let idx = primary
                .iter()
                .position(|v| v == id)
                .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })?;
            indices.push(idx);
        }
        Ok(Catalog {
            table: self.table.select(&indices),
        })
    }

    /// Select one star by position.
    pub fn row(&self, index: usize) -> Result<Catalog> {
        self.rows(index..index + 1)
    }

    /// Select a contiguous range of stars by position.
    pub fn rows(&self, range: Range<usize>) -> Result<Catalog> {
        if range.end > self.len() {
            return Err(CatalogError::NotFound {
                id: format!("rows {}..{}", range.start, range.end),
            });
        }
        let indices: Vec<usize> = range.collect();
        Ok(Catalog {
            table: self.table.select(&indices),
        })
    }

    /// Select arbitrary rows by position, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Catalog> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(CatalogError::NotFound {
                id: format!("row {bad}"),
            });
        }
        Ok(Catalog {
            table: self.table.select(indices),
        })
    }

    // ── Epoch propagation ───────────────────────────────────────────────

    /// Return this catalog with positions propagated linearly to `epoch`.
    ///
    /// When proper-motion columns are present, each row moves by
    /// `pm_ra_cosdec / cos(dec) * dt` in RA and `pm_dec * dt` in Dec (a flat
    /// linear approximation, not great-circle propagation), and the result
    /// carries the single requested epoch as its `obstime`. Rows with
    /// non-finite proper motion are propagated with zero motion; every such
    /// substitution is reported through `tracing`.
    ///
    /// When the catalog has no proper-motion columns at all, positions *and*
    /// `obstime` are left unchanged — the call still succeeds.
    ///
    /// The division by `cos(dec)` grows without bound toward the celestial
    /// poles; values there follow ordinary floating-point behavior and get
    /// no special casing.
    pub fn at_epoch(&self, epoch: impl Into<Epoch>) -> Catalog {
        let target: Epoch = epoch.into();
        let mut table = self.table.clone();

        let (pm_ra, pm_dec) = match (&self.table.pm_ra_cosdec, &self.table.pm_dec) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                info!(
                    catalog = %self.table.meta.name,
                    "no proper motions available; positions and obstime left unchanged"
                );
                return Catalog { table };
            }
        };

        let mut degenerate = 0usize;
        for i in 0..self.len() {
            let dt = self.table.obstime.epoch_at(i).years_until(target);
            let (mu_ra, mu_dec) = if pm_ra[i].is_finite() && pm_dec[i].is_finite() {
                (pm_ra[i], pm_dec[i])
            } else {
                degenerate += 1;
                debug!(
                    row = i,
                    id = %self.table.primary_ids().values[i],
                    "non-finite proper motion treated as zero motion"
                );
                (0.0, 0.0)
            };
            let cos_dec = self.table.dec[i].to_radians().cos();
            table.ra[i] = self.table.ra[i] + mu_ra / cos_dec * dt / MAS_PER_DEG;
            table.dec[i] = self.table.dec[i] + mu_dec * dt / MAS_PER_DEG;
        }
        if degenerate > 0 {
            warn!(
                catalog = %self.table.meta.name,
                rows = degenerate,
                "propagated with zero motion for rows with non-finite proper motion"
            );
        }

        // Propagation always yields a single-epoch catalog.
        table.obstime = ObsTime::Scalar(target);
        Catalog { table }
    }

    // ── Cross-matching ──────────────────────────────────────────────────

    /// Nearest-neighbor cross-match against a reference catalog.
    ///
    /// The reference is first propagated to this catalog's epoch so both are
    /// compared at one common instant, then every row of `self` is paired
    /// with its angularly nearest reference row (great-circle separation).
    /// A row counts as matched when that separation is strictly below
    /// `radius_arcsec`. No uniqueness is enforced on the reference side.
    pub fn cross_match_to(&self, reference: &Catalog, radius_arcsec: f64) -> CrossMatch {
        let n = self.len();
        if reference.is_empty() {
            return CrossMatch {
                matched: vec![false; n],
                ref_indices: vec![0; n],
            };
        }

        let reference = reference.at_epoch(self.epoch());
        let ref_uvecs = reference.unit_vectors();
        let cos_radius = (radius_arcsec / 3600.0).to_radians().cos();

        let mut matched = Vec::with_capacity(n);
        let mut ref_indices = Vec::with_capacity(n);
        for uvec in self.unit_vectors() {
            let mut best = 0usize;
            let mut best_dot = f64::NEG_INFINITY;
            for (j, ref_uvec) in ref_uvecs.iter().enumerate() {
                let dot = uvec.dot(ref_uvec);
                if dot > best_dot {
                    best_dot = dot;
                    best = j;
                }
            }
            // sep < radius  ⇔  cos(sep) > cos(radius)
            matched.push(best_dot > cos_radius);
            ref_indices.push(best);
        }

        debug!(
            catalog = %self.table.meta.name,
            reference = %reference.table.meta.name,
            matches = matched.iter().filter(|&&m| m).count(),
            radius_arcsec,
            "cross-match complete"
        );
        CrossMatch {
            matched,
            ref_indices,
        }
    }

    /// Unit vectors on the celestial sphere, one per row.
    pub fn unit_vectors(&self) -> Vec<Vector3> {
        self.table
            .ra
            .iter()
            .zip(&self.table.dec)
            .map(|(&ra, &dec)| {
                let (sin_ra, cos_ra) = ra.to_radians().sin_cos();
                let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
                Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
            })
            .collect()
    }

    // ── Presentation contract ───────────────────────────────────────────

    /// Marker sizes for plotting, one per row:
    /// `max(scale * (1 + magnitude_limit - magnitude), 1.0)`.
    ///
    /// The floor is fixed at 1.0 so every star stays visible regardless of
    /// how faint it is relative to the configured magnitude limit.
    pub fn marker_sizes(&self, scale: f64) -> Vec<f64> {
        let limit = self.table.meta.magnitude_limit;
        self.magnitude()
            .iter()
            .map(|&m| (scale * (1.0 + limit - m)).max(1.0))
            .collect()
    }
}
