//! Gaia DR2 standardizer.
//!
//! Expects the column names of the `gaiadr2.gaia_source` ADQL table. Gaia
//! rows carry full astrometry (proper motion, parallax, radial velocity)
//! referred to epoch 2015.5.

use crate::catalog::Catalog;
use crate::epoch::Epoch;
use crate::error::Result;
use crate::table::{CatalogMeta, ErrorColumn, IdColumn, MagColumn, ObsTime, StandardizedTable};

use super::{
    distances_from_parallax, nan_when_missing, require_finite, zero_when_unusable, RawTable,
    Standardizer,
};

/// Reference epoch of Gaia DR2 astrometry, decimal years.
const GAIA_DR2_EPOCH: f64 = 2015.5;

const FILTERS: [(&str, &str); 3] = [
    ("G", "phot_g_mean_mag"),
    ("BP", "phot_bp_mean_mag"),
    ("RP", "phot_rp_mean_mag"),
];

#[derive(Debug, Clone)]
pub struct GaiaStandardizer {
    /// Faintest G magnitude the query was limited to.
    pub magnitude_limit: f64,
    /// Literal query text, carried into the catalog metadata.
    pub query: Option<String>,
}

impl Default for GaiaStandardizer {
    fn default() -> Self {
        GaiaStandardizer {
            magnitude_limit: 20.0,
            query: None,
        }
    }
}

impl Standardizer for GaiaStandardizer {
    fn standardize(&self, raw: &RawTable) -> Result<Catalog> {
        let ids = IdColumn {
            key: "GaiaDR2".to_string(),
            values: raw.text("source_id")?,
        };
        let ra = require_finite("ra", raw.real("ra")?)?;
        let dec = require_finite("dec", raw.real("dec")?)?;

        // Poorly defined motions become zero, poorly defined parallaxes a
        // sentinel distance; both are reported, neither is fatal.
        let pm_ra_cosdec = zero_when_unusable("pmra", raw.real("pmra")?);
        let pm_dec = zero_when_unusable("pmdec", raw.real("pmdec")?);
        let radial_velocity = zero_when_unusable("radial_velocity", raw.real("radial_velocity")?);
        let parallax = zero_when_unusable("parallax", raw.real("parallax")?);
        let (distance, distance_error) =
            distances_from_parallax(&parallax, &raw.real("parallax_error")?);

        let magnitudes = FILTERS
            .iter()
            .map(|(filter, column)| {
                Ok(MagColumn {
                    filter: filter.to_string(),
                    values: nan_when_missing(raw.real(column)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let errors = vec![
            ErrorColumn {
                field: "distance".to_string(),
                values: distance_error,
            },
            ErrorColumn {
                field: "pm_ra_cosdec".to_string(),
                values: nan_when_missing(raw.real("pmra_error")?),
            },
            ErrorColumn {
                field: "pm_dec".to_string(),
                values: nan_when_missing(raw.real("pmdec_error")?),
            },
            ErrorColumn {
                field: "radial_velocity".to_string(),
                values: nan_when_missing(raw.real("radial_velocity_error")?),
            },
        ];

        let meta = CatalogMeta {
            name: "Gaia".to_string(),
            default_filter: "G".to_string(),
            magnitude_limit: self.magnitude_limit,
            query: self.query.clone(),
            ..CatalogMeta::custom()
        };

        Catalog::new(StandardizedTable {
            identifiers: vec![ids],
            ra,
            dec,
            pm_ra_cosdec: Some(pm_ra_cosdec),
            pm_dec: Some(pm_dec),
            distance: Some(distance),
            radial_velocity: Some(radial_velocity),
            obstime: ObsTime::Scalar(Epoch::from_decimal_year(GAIA_DR2_EPOCH)),
            magnitudes,
            errors,
            meta,
        })
    }
}
