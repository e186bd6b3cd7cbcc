//! TESS Input Catalog standardizer.
//!
//! Expects the column names of the MAST `Tic` criteria/cone interface. TIC
//! rows carry proper motions and parallaxes referred to epoch 2000.0 but no
//! radial velocities, and cross-reference identifiers into 2MASS, Gaia DR2,
//! and Kepler.

use crate::catalog::Catalog;
use crate::epoch::Epoch;
use crate::error::Result;
use crate::table::{CatalogMeta, IdColumn, MagColumn, ObsTime, StandardizedTable};

use super::{
    distances_from_parallax, nan_when_missing, require_finite, zero_when_unusable, RawTable,
    Standardizer,
};

const TIC_EPOCH: f64 = 2000.0;

/// Standardized identifier key and the raw column it comes from.
const IDENTIFIERS: [(&str, &str); 4] = [
    ("TIC", "ID"),
    ("2MASS", "TWOMASS"),
    ("GaiaDR2", "GAIA"),
    ("KIC", "KIC"),
];

const FILTERS: [&str; 15] = [
    "B", "V", "u", "g", "r", "i", "z", "J", "H", "K", "w1", "w2", "w3", "w4", "T",
];

#[derive(Debug, Clone)]
pub struct TicStandardizer {
    /// Faintest T magnitude the query was limited to.
    pub magnitude_limit: f64,
    pub query: Option<String>,
}

impl Default for TicStandardizer {
    fn default() -> Self {
        TicStandardizer {
            magnitude_limit: 20.0,
            query: None,
        }
    }
}

impl Standardizer for TicStandardizer {
    fn standardize(&self, raw: &RawTable) -> Result<Catalog> {
        let identifiers = IDENTIFIERS
            .iter()
            .map(|(key, column)| {
                Ok(IdColumn {
                    key: key.to_string(),
                    values: raw.text(column)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ra = require_finite("ra", raw.real("ra")?)?;
        let dec = require_finite("dec", raw.real("dec")?)?;
        let pm_ra_cosdec = zero_when_unusable("pmRA", raw.real("pmRA")?);
        let pm_dec = zero_when_unusable("pmDEC", raw.real("pmDEC")?);
        let parallax = zero_when_unusable("plx", raw.real("plx")?);
        let (distance, _) = distances_from_parallax(&parallax, &raw.real("e_plx")?);

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
            name: "TIC".to_string(),
            default_filter: "T".to_string(),
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
            distance: Some(distance),
            radial_velocity: None,
            obstime: ObsTime::Scalar(Epoch::from_decimal_year(TIC_EPOCH)),
            magnitudes,
            errors: vec![],
            meta,
        })
    }
}
