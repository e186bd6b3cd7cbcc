//! LSPM-North standardizer.
//!
//! Expects the column names of the VizieR `I/298/lspm_n` table. LSPM is a
//! proper-motion survey: motions arrive in arcsec/yr and are converted to
//! the canonical mas/yr, and there is no parallax or radial-velocity data
//! at all, so those column groups stay absent.

use crate::catalog::Catalog;
use crate::epoch::Epoch;
use crate::error::Result;
use crate::table::{CatalogMeta, IdColumn, MagColumn, ObsTime, StandardizedTable};

use super::{nan_when_missing, require_finite, zero_when_unusable, RawTable, Standardizer};

const LSPM_EPOCH: f64 = 2000.0;

const MAS_PER_ARCSEC: f64 = 1000.0;

const FILTERS: [&str; 9] = ["B", "V", "BJ", "RF", "IN", "J", "H", "K", "Ve"];

#[derive(Debug, Clone)]
pub struct LspmStandardizer {
    /// Faintest Ve ("estimated V") magnitude the query was limited to.
    pub magnitude_limit: f64,
    pub query: Option<String>,
}

impl Default for LspmStandardizer {
    fn default() -> Self {
        LspmStandardizer {
            magnitude_limit: 18.0,
            query: None,
        }
    }
}

impl Standardizer for LspmStandardizer {
    fn standardize(&self, raw: &RawTable) -> Result<Catalog> {
        let identifiers = vec![
            IdColumn {
                key: "LSPM".to_string(),
                values: raw.text("LSPM")?,
            },
            IdColumn {
                key: "2MASS".to_string(),
                values: raw.text("2MASS")?,
            },
        ];

        let ra = require_finite("_RAJ2000", raw.real("_RAJ2000")?)?;
        let dec = require_finite("_DEJ2000", raw.real("_DEJ2000")?)?;

        let to_mas = |values: Vec<f64>| {
            values
                .into_iter()
                .map(|v| v * MAS_PER_ARCSEC)
                .collect::<Vec<f64>>()
        };
        let pm_ra_cosdec = to_mas(zero_when_unusable("pmRA", raw.real("pmRA")?));
        let pm_dec = to_mas(zero_when_unusable("pmDE", raw.real("pmDE")?));

        let magnitudes = FILTERS
            .iter()
            .map(|filter| {
                Ok(MagColumn {
                    filter: filter.to_string(),
                    values: nan_when_missing(raw.real(&format!("{filter}mag"))?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let meta = CatalogMeta {
            name: "LSPM".to_string(),
            default_filter: "Ve".to_string(),
            magnitude_limit: self.magnitude_limit,
            query: self.query.clone(),
            ..CatalogMeta::custom()
        };

        Catalog::new(StandardizedTable {
            identifiers,
            ra,
            dec,
            pm_ra_cosdec: Some(pm_ra_cosdec),
            pm_dec: Some(pm_dec),
            distance: None,
            radial_velocity: None,
            obstime: ObsTime::Scalar(Epoch::from_decimal_year(LSPM_EPOCH)),
            magnitudes,
            errors: vec![],
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::RawValue;

    fn lspm_raw() -> RawTable {
        let mut columns = vec![
            "LSPM".to_string(),
            "2MASS".to_string(),
            "_RAJ2000".to_string(),
            "_DEJ2000".to_string(),
            "pmRA".to_string(),
            "pmDE".to_string(),
        ];
        columns.extend(FILTERS.iter().map(|f| format!("{f}mag")));
        let mut raw = RawTable::new(columns);

        let mut row = vec![
            RawValue::Text("J0002+2704".to_string()),
            RawValue::Text("00023123+2704568".to_string()),
            RawValue::Real(0.63),
            RawValue::Real(27.08),
            RawValue::Real(0.212),
            RawValue::Real(-0.047),
        ];
        row.extend((0..FILTERS.len()).map(|i| RawValue::Real(11.0 + i as f64 * 0.2)));
        raw.push_row(row).unwrap();

        raw
    }

    #[test]
    fn converts_proper_motions_to_mas() {
        let catalog = LspmStandardizer::default().standardize(&lspm_raw()).unwrap();
        assert!((catalog.pm_ra_cosdec().unwrap()[0] - 212.0).abs() < 1e-9);
        assert!((catalog.pm_dec().unwrap()[0] + 47.0).abs() < 1e-9);
    }

    #[test]
    fn has_no_distance_or_velocity_columns() {
        let catalog = LspmStandardizer::default().standardize(&lspm_raw()).unwrap();
        assert!(catalog.distance().is_none());
        assert!(catalog.radial_velocity().is_none());
        assert_eq!(catalog.epoch().decimal_year(), LSPM_EPOCH);
    }

    #[test]
    fn default_filter_is_estimated_v() {
        let catalog = LspmStandardizer::default().standardize(&lspm_raw()).unwrap();
        assert_eq!(catalog.meta().default_filter, "Ve");
        assert_eq!(catalog.meta().magnitude_limit, 18.0);
        // Ve is the last filter column
        assert!((catalog.magnitude()[0] - (11.0 + 8.0 * 0.2)).abs() < 1e-12);
    }
}
