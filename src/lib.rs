//! # asterism
//!
//! A **star catalog toolkit**: one canonical data model for heterogeneous
//! survey catalogs, with epoch propagation, cross-matching, field
//! projections, and a plain-text interchange format.
//!
//! Survey archives disagree about everything — column names, units, epoch
//! conventions, which quantities exist at all. `asterism` maps each archive
//! into a single standardized table layout and then provides the operations
//! finder charts and target lists actually need on top of it.
//!
//! ## Features
//!
//! - **Standardized tables** — identifiers, coordinates, magnitudes, and
//!   errors in one column layout, validated at construction
//! - **Epoch propagation** — linear proper-motion propagation of every star
//!   to any observation epoch
//! - **Cross-matching** — great-circle nearest-neighbor matching between
//!   catalogs, with the reference propagated to the observing epoch first
//! - **Fields** — cone-search geometry with lazily resolved centers, a
//!   gnomonic tangent-plane projection, and pixel↔sky affine fits
//! - **Archive adapters** — standardizers for Gaia DR2, the TESS Input
//!   Catalog, and LSPM-North downloads
//! - **Text interchange** — a one-line JSON header plus CSV body that
//!   round-trips every column and the catalog metadata exactly
//!
//! ## Example
//!
//! ```
//! use asterism::{Catalog, CoordinateArrays, ObsTime, Epoch};
//!
//! // A small hand-built catalog at epoch 2000.0 with proper motions.
//! let catalog = Catalog::from_coordinates(CoordinateArrays {
//!     ra: vec![10.0, 11.0],
//!     dec: vec![41.2, 41.9],
//!     pm_ra_cosdec: Some(vec![300.0, -50.0]),
//!     pm_dec: Some(vec![-120.0, 40.0]),
//!     ..Default::default()
//! }).unwrap();
//!
//! // Propagate everything to 2030.0; positions move, the table is reshaped
//! // into a new catalog, and the original is untouched.
//! let later = catalog.at_epoch(2030.0);
//! assert_eq!(later.epoch(), Epoch::from_decimal_year(2030.0));
//! assert_ne!(later.ra()[0], catalog.ra()[0]);
//! ```

pub mod catalog;
pub mod epoch;
pub mod error;
pub mod field;
pub mod standardize;
pub mod table;
mod textio;

pub use catalog::{Catalog, CoordinateArrays, CoordinatesView, CrossMatch};
pub use epoch::Epoch;
pub use error::{CatalogError, Result};
pub use field::{AffineFit, Field, FieldCenter, NameResolver, WcsLike};
pub use standardize::{
    GaiaStandardizer, LspmStandardizer, RawTable, RawValue, Standardizer, TicStandardizer,
};
pub use table::{
    CatalogMeta, ErrorColumn, IdColumn, MagColumn, ObsTime, StandardizedTable,
};

// Commonly used types
// All catalog math is 64-bit: milliarcsecond-scale astrometry does not
// survive 32-bit floats.
pub type Vector3 = nalgebra::Vector3<f64>;
