//! Observation epochs as decimal Julian years.
//!
//! Every time input (absolute Julian day, decimal year, year-valued quantity)
//! is normalized to this one representation before any propagation math.

use serde::{Deserialize, Serialize};

/// Julian day number of the J2000.0 reference epoch.
const JD_J2000: f64 = 2_451_545.0;

/// Days per Julian year.
const DAYS_PER_YEAR: f64 = 365.25;

/// An instant in time expressed as a decimal Julian year (e.g. `2015.5`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(f64);

impl Epoch {
    /// The J2000.0 reference epoch (decimal year 2000.0).
    pub fn j2000() -> Self {
        Epoch(2000.0)
    }

    /// Construct from a decimal Julian year.
    pub fn from_decimal_year(year: f64) -> Self {
        Epoch(year)
    }

    /// Construct from an absolute Julian day number.
    pub fn from_julian_day(jd: f64) -> Self {
        Epoch(2000.0 + (jd - JD_J2000) / DAYS_PER_YEAR)
    }

    /// The decimal Julian year.
    pub fn decimal_year(self) -> f64 {
        self.0
    }

    /// Signed offset in years from `self` to `other`.
    pub fn years_until(self, other: Epoch) -> f64 {
        other.0 - self.0
    }
}

impl From<f64> for Epoch {
    /// Bare floats are decimal years.
    fn from(year: f64) -> Self {
        Epoch::from_decimal_year(year)
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
