//! Sky fields: a center plus a search radius, with the gnomonic
//! (tangent-plane) projection used to overlay catalogs onto images.
//!
//! A field's center is either already resolved to coordinates, a deferred
//! name to be resolved once through an external [`NameResolver`], or absent
//! (all-sky). The unresolved → resolved transition happens exactly once and
//! is memoized for the field's lifetime.
//!
//! # Coordinate conventions
//!
//! - **Celestial**: right ascension and declination in degrees.
//! - **Local tangent plane** `(ξ, η)`: arcminutes on the gnomonic projection
//!   plane centered on the field, ξ toward increasing RA and η toward north.
//!
//! Reference for the projection: Calabretta & Greisen (2002), FITS WCS
//! Paper II, §5.1.1.

use std::sync::OnceLock;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, Result};

/// Arcminutes per radian, for converting tangent-plane values to angles via
/// the small-angle identity.
const ARCMIN_PER_RAD: f64 = 60.0 * 180.0 / std::f64::consts::PI;

/// Grid sampled across the image when fitting the pixel↔local affine map.
const AFFINE_GRID: usize = 8;

/// External name-resolution collaborator: turns a star name into
/// `(ra, dec)` degrees. Failures are surfaced to the caller verbatim and
/// never retried.
pub trait NameResolver {
    fn resolve(&self, name: &str) -> Result<(f64, f64)>;
}

/// Image/WCS collaborator: an image's own mapping between pixel coordinates
/// and the sky, consumed by [`Field::fit_pixel_affine`].
pub trait WcsLike {
    /// Map pixel coordinates to `(ra, dec)` in degrees.
    fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64);
    /// Map `(ra, dec)` in degrees to pixel coordinates.
    fn sky_to_pixel(&self, ra_deg: f64, dec_deg: f64) -> (f64, f64);
}

/// Where a field is centered.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCenter {
    /// A resolved sky position, degrees.
    Resolved { ra_deg: f64, dec_deg: f64 },
    /// A deferred name, resolved lazily through a [`NameResolver`].
    Named(String),
    /// No center: the field covers the whole sky.
    AllSky,
}

/// A query region on the sky: center plus angular radius.
///
/// `radius = f64::INFINITY` and `FieldCenter::AllSky` are interchangeable
/// ways to request an unbounded field; construction canonicalizes either
/// into both.
#[derive(Debug)]
pub struct Field {
    center: FieldCenter,
    radius_deg: f64,
    tangent_point: OnceLock<(f64, f64)>,
}

impl Field {
    /// Create a field from a center and a radius in degrees.
    pub fn new(center: FieldCenter, radius_deg: f64) -> Field {
        let all_sky = !radius_deg.is_finite() || center == FieldCenter::AllSky;
        let (center, radius_deg) = if all_sky {
            (FieldCenter::AllSky, f64::INFINITY)
        } else {
            (center, radius_deg)
        };

        let tangent_point = OnceLock::new();
        if let FieldCenter::Resolved { ra_deg, dec_deg } = &center {
            // already-resolved centers start life in the resolved state
            let _ = tangent_point.set((*ra_deg, *dec_deg));
        }
        Field {
            center,
            radius_deg,
            tangent_point,
        }
    }

    /// Create a field centered on a resolved position, degrees.
    pub fn at(ra_deg: f64, dec_deg: f64, radius_deg: f64) -> Field {
        Field::new(FieldCenter::Resolved { ra_deg, dec_deg }, radius_deg)
    }

    /// The search radius in degrees (`f64::INFINITY` for all-sky).
    pub fn radius_deg(&self) -> f64 {
        self.radius_deg
    }

    /// How the field was centered.
    pub fn center(&self) -> &FieldCenter {
        &self.center
    }

    /// True for unbounded fields.
    pub fn is_all_sky(&self) -> bool {
        self.center == FieldCenter::AllSky
    }

    /// True once the center has a cached sky position.
    pub fn is_resolved(&self) -> bool {
        self.tangent_point.get().is_some()
    }

    /// Resolve a deferred center through `resolver`, memoizing the result.
    ///
    /// Subsequent calls return the cached position without consulting the
    /// resolver again. Resolver failures are surfaced verbatim.
    pub fn resolve_center_with(&self, resolver: &dyn NameResolver) -> Result<(f64, f64)> {
        if let Some(&cached) = self.tangent_point.get() {
            return Ok(cached);
        }
        match &self.center {
            FieldCenter::AllSky => Err(CatalogError::DegenerateField {
                reason: "an all-sky field has no tangent point".to_string(),
            }),
            FieldCenter::Named(name) => {
                let position = resolver.resolve(name)?;
                let cached = *self.tangent_point.get_or_init(|| position);
                info!(name = %name, ra = cached.0, dec = cached.1, "resolved field center");
                Ok(cached)
            }
            // Resolved centers were cached at construction.
            FieldCenter::Resolved { ra_deg, dec_deg } => Ok((*ra_deg, *dec_deg)),
        }
    }

    /// The resolved center `(ra, dec)` in degrees.
    ///
    /// Fails for all-sky fields and for named centers that have not been
    /// resolved yet.
    pub fn center_coordinates(&self) -> Result<(f64, f64)> {
        if let Some(&cached) = self.tangent_point.get() {
            return Ok(cached);
        }
        match &self.center {
            FieldCenter::AllSky => Err(CatalogError::DegenerateField {
                reason: "an all-sky field has no tangent point".to_string(),
            }),
            FieldCenter::Named(name) => Err(CatalogError::NameResolution { name: name.clone() }),
            FieldCenter::Resolved { ra_deg, dec_deg } => Ok((*ra_deg, *dec_deg)),
        }
    }

    // ── Gnomonic projection ─────────────────────────────────────────────

    /// Project celestial coordinates (degrees) onto the field's tangent
    /// plane, returning `(ξ, η)` in arcminutes.
    ///
    /// Points at or beyond 90° from the center make the projection
    /// denominator vanish or go negative; following standard floating-point
    /// behavior they come out huge or non-finite, with no special casing.
    pub fn celestial2local(&self, ra_deg: f64, dec_deg: f64) -> Result<(f64, f64)> {
        let (ra0_deg, dec0_deg) = self.center_coordinates()?;
        let delta = (ra_deg - ra0_deg).to_radians();
        let dec = dec_deg.to_radians();
        let dec0 = dec0_deg.to_radians();

        let d = dec.sin() * dec0.sin() + dec.cos() * dec0.cos() * delta.cos();
        let xi = dec.cos() * delta.sin() / d;
        let eta = (dec.sin() * dec0.cos() - dec.cos() * dec0.sin() * delta.cos()) / d;
        Ok((xi * ARCMIN_PER_RAD, eta * ARCMIN_PER_RAD))
    }

    /// Invert the tangent-plane projection: `(ξ, η)` in arcminutes back to
    /// `(ra, dec)` in degrees, with RA wrapped into `[0, 360)`.
    pub fn local2celestial(&self, xi_arcmin: f64, eta_arcmin: f64) -> Result<(f64, f64)> {
        let (ra0_deg, dec0_deg) = self.center_coordinates()?;
        let xi = xi_arcmin / ARCMIN_PER_RAD;
        let eta = eta_arcmin / ARCMIN_PER_RAD;
        let dec0 = dec0_deg.to_radians();

        let rho_sq = xi * xi + eta * eta;
        if rho_sq < 1e-30 {
            return Ok((ra0_deg, dec0_deg));
        }
        let rho = rho_sq.sqrt();
        let c = rho.atan();
        let (sin_c, cos_c) = c.sin_cos();

        let dec = (cos_c * dec0.sin() + eta * sin_c * dec0.cos() / rho).asin();
        let ra = ra0_deg.to_radians()
            + (xi * sin_c).atan2(rho * dec0.cos() * cos_c - eta * dec0.sin() * sin_c);
        Ok((ra.to_degrees().rem_euclid(360.0), dec.to_degrees()))
    }

    // ── Pixel ↔ local affine fit ────────────────────────────────────────

    /// Fit a 6-parameter affine map from an image's pixel coordinates to the
    /// field's local tangent-plane coordinates.
    ///
    /// Samples a coarse pixel grid, maps each point through the image's own
    /// pixel→sky solution and then [`Field::celestial2local`], and solves
    /// two 3-parameter linear systems by least squares. The fitted map is
    /// then inverted and checked: if the round-trip pixel error exceeds one
    /// pixel anywhere on the grid, a warning is reported but the fit is kept
    /// — finder-chart overlays do not need a perfect nonlinear inverse.
    pub fn fit_pixel_affine(
        &self,
        wcs: &dyn WcsLike,
        width: u32,
        height: u32,
    ) -> Result<AffineFit> {
        let step_x = (width.max(2) - 1) as f64 / (AFFINE_GRID - 1) as f64;
        let step_y = (height.max(2) - 1) as f64 / (AFFINE_GRID - 1) as f64;

        let mut pixels = Vec::with_capacity(AFFINE_GRID * AFFINE_GRID);
        let mut locals = Vec::with_capacity(AFFINE_GRID * AFFINE_GRID);
        for iy in 0..AFFINE_GRID {
            for ix in 0..AFFINE_GRID {
                let x = ix as f64 * step_x;
                let y = iy as f64 * step_y;
                let (ra, dec) = wcs.pixel_to_sky(x, y);
                let (xi, eta) = self.celestial2local(ra, dec)?;
                pixels.push((x, y));
                locals.push((xi, eta));
            }
        }

        let n = pixels.len();
        let design = DMatrix::from_fn(n, 3, |r, c| match c {
            0 => pixels[r].0,
            1 => pixels[r].1,
            _ => 1.0,
        });
        let xi_obs = DVector::from_iterator(n, locals.iter().map(|l| l.0));
        let eta_obs = DVector::from_iterator(n, locals.iter().map(|l| l.1));

        let svd = design.svd(true, true);
        let sol_xi = svd
            .solve(&xi_obs, 1e-12)
            .map_err(|_| CatalogError::DegenerateField {
                reason: "singular affine fit (ξ)".to_string(),
            })?;
        let sol_eta = svd
            .solve(&eta_obs, 1e-12)
            .map_err(|_| CatalogError::DegenerateField {
                reason: "singular affine fit (η)".to_string(),
            })?;

        let mut fit = AffineFit {
            a: [[sol_xi[0], sol_xi[1]], [sol_eta[0], sol_eta[1]]],
            b: [sol_xi[2], sol_eta[2]],
            max_roundtrip_px: 0.0,
        };

        // Residual check: true local coordinates back through the inverse
        // affine should land within one pixel of where they started.
        let mut max_err: f64 = 0.0;
        for (&(x, y), &(xi, eta)) in pixels.iter().zip(&locals) {
            let (bx, by) = fit.local_to_pixel(xi, eta)?;
            max_err = max_err.max(((bx - x).powi(2) + (by - y).powi(2)).sqrt());
        }
        fit.max_roundtrip_px = max_err;

        if max_err > 1.0 {
            warn!(
                max_roundtrip_px = max_err,
                "pixel↔local affine approximation exceeds one pixel; keeping the fit anyway"
            );
        } else {
            debug!(max_roundtrip_px = max_err, "pixel↔local affine fit");
        }
        Ok(fit)
    }
}

/// Best-fit affine map from pixel coordinates to local tangent-plane
/// coordinates (arcminutes): `local = a · pixel + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineFit {
    /// Rotation/scale/skew rows.
    pub a: [[f64; 2]; 2],
    /// Offsets.
    pub b: [f64; 2],
    /// Largest round-trip pixel error observed on the fitting grid.
    pub max_roundtrip_px: f64,
}

impl AffineFit {
    /// Map pixel coordinates to local `(ξ, η)` arcminutes.
    pub fn pixel_to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a[0][0] * x + self.a[0][1] * y + self.b[0],
            self.a[1][0] * x + self.a[1][1] * y + self.b[1],
        )
    }

    /// Map local `(ξ, η)` arcminutes back to pixel coordinates by inverting
    /// the fitted matrix. Fails when the matrix is singular.
    pub fn local_to_pixel(&self, xi: f64, eta: f64) -> Result<(f64, f64)> {
        let det = self.a[0][0] * self.a[1][1] - self.a[0][1] * self.a[1][0];
        if det.abs() < 1e-30 {
            return Err(CatalogError::DegenerateField {
                reason: "fitted affine matrix is singular".to_string(),
            });
        }
        let u = xi - self.b[0];
        let v = eta - self.b[1];
        Ok((
            (self.a[1][1] * u - self.a[0][1] * v) / det,
            (self.a[0][0] * v - self.a[1][0] * u) / det,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeResolver {
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn new() -> Self {
            FakeResolver {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl NameResolver for FakeResolver {
        fn resolve(&self, name: &str) -> Result<(f64, f64)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "Vega" => Ok((279.2347, 38.7837)),
                _ => Err(CatalogError::NameResolution {
                    name: name.to_string(),
                }),
            }
        }
    }

    #[test]
    fn all_sky_inputs_are_interchangeable() {
        let by_radius = Field::at(10.0, 20.0, f64::INFINITY);
        let by_center = Field::new(FieldCenter::AllSky, 3.0);
        assert!(by_radius.is_all_sky());
        assert!(by_center.is_all_sky());
        assert!(by_radius.radius_deg().is_infinite());
        assert!(by_center.radius_deg().is_infinite());
        assert!(matches!(
            by_radius.celestial2local(0.0, 0.0),
            Err(CatalogError::DegenerateField { .. })
        ));
    }

    #[test]
    fn center_projects_to_origin() {
        let field = Field::at(120.0, -35.0, 0.5);
        let (xi, eta) = field.celestial2local(120.0, -35.0).unwrap();
        assert!(xi.abs() < 1e-12 && eta.abs() < 1e-12);
    }

    #[test]
    fn one_degree_east_on_equator_is_sixty_arcmin() {
        let field = Field::at(50.0, 0.0, 2.0);
        let (xi, eta) = field.celestial2local(51.0, 0.0).unwrap();
        // tan(1°) in arcminutes, slightly over 60
        assert_relative_eq!(xi, (1.0_f64.to_radians()).tan() * ARCMIN_PER_RAD, epsilon = 1e-9);
        assert!((xi - 60.0).abs() < 0.05);
        assert!(eta.abs() < 1e-12);
    }

    #[test]
    fn projection_round_trips() {
        let field = Field::at(210.3, 47.8, 1.0);
        for &(ra, dec) in &[
            (210.3, 47.8),
            (210.9, 47.5),
            (209.6, 48.4),
            (212.0, 46.0),
        ] {
            let (xi, eta) = field.celestial2local(ra, dec).unwrap();
            let (ra2, dec2) = field.local2celestial(xi, eta).unwrap();
            assert_relative_eq!(ra, ra2, epsilon = 1e-9);
            assert_relative_eq!(dec, dec2, epsilon = 1e-9);
        }
    }

    #[test]
    fn named_center_resolves_once() {
        let field = Field::new(FieldCenter::Named("Vega".to_string()), 0.25);
        assert!(!field.is_resolved());
        assert!(matches!(
            field.center_coordinates(),
            Err(CatalogError::NameResolution { .. })
        ));

        let resolver = FakeResolver::new();
        let first = field.resolve_center_with(&resolver).unwrap();
        let second = field.resolve_center_with(&resolver).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(field.is_resolved());
        // coordinate-dependent operations work after resolution
        assert!(field.celestial2local(279.0, 39.0).is_ok());
    }

    #[test]
    fn unknown_name_surfaces_resolver_error() {
        let field = Field::new(FieldCenter::Named("Not A Star".to_string()), 0.25);
        let resolver = FakeResolver::new();
        assert!(matches!(
            field.resolve_center_with(&resolver),
            Err(CatalogError::NameResolution { .. })
        ));
        assert!(!field.is_resolved());
    }

    // A synthetic image whose pixel→sky solution is exactly gnomonic with a
    // linear pixel grid: the affine fit should recover it to float noise.
    struct LinearWcs {
        field: Field,
        arcmin_per_px: f64,
        rot_rad: f64,
        cx: f64,
        cy: f64,
    }

    impl LinearWcs {
        fn local_of_pixel(&self, x: f64, y: f64) -> (f64, f64) {
            let dx = x - self.cx;
            let dy = y - self.cy;
            let (sin_r, cos_r) = self.rot_rad.sin_cos();
            (
                self.arcmin_per_px * (cos_r * dx - sin_r * dy),
                self.arcmin_per_px * (sin_r * dx + cos_r * dy),
            )
        }
    }

    impl WcsLike for LinearWcs {
        fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
            let (xi, eta) = self.local_of_pixel(x, y);
            self.field.local2celestial(xi, eta).unwrap()
        }

        fn sky_to_pixel(&self, ra_deg: f64, dec_deg: f64) -> (f64, f64) {
            let (xi, eta) = self.field.celestial2local(ra_deg, dec_deg).unwrap();
            let (sin_r, cos_r) = self.rot_rad.sin_cos();
            let u = xi / self.arcmin_per_px;
            let v = eta / self.arcmin_per_px;
            (cos_r * u + sin_r * v + self.cx, -sin_r * u + cos_r * v + self.cy)
        }
    }

    #[test]
    fn affine_fit_recovers_linear_wcs() {
        let field = Field::at(83.0, -5.4, 0.5);
        let wcs = LinearWcs {
            field: Field::at(83.0, -5.4, 0.5),
            arcmin_per_px: 0.02,
            rot_rad: 0.3,
            cx: 256.0,
            cy: 256.0,
        };

        let fit = field.fit_pixel_affine(&wcs, 512, 512).unwrap();
        assert!(
            fit.max_roundtrip_px < 0.5,
            "roundtrip error {} px",
            fit.max_roundtrip_px
        );

        // The fitted linear part matches the generating rotation and scale.
        let (sin_r, cos_r) = 0.3_f64.sin_cos();
        assert_relative_eq!(fit.a[0][0], 0.02 * cos_r, epsilon = 1e-6);
        assert_relative_eq!(fit.a[0][1], -0.02 * sin_r, epsilon = 1e-6);
        assert_relative_eq!(fit.a[1][0], 0.02 * sin_r, epsilon = 1e-6);
        assert_relative_eq!(fit.a[1][1], 0.02 * cos_r, epsilon = 1e-6);

        // Forward and inverse agree with the generator away from grid nodes.
        let (xi, eta) = fit.pixel_to_local(100.5, 301.25);
        let (xi_true, eta_true) = wcs.local_of_pixel(100.5, 301.25);
        assert_relative_eq!(xi, xi_true, epsilon = 1e-6);
        assert_relative_eq!(eta, eta_true, epsilon = 1e-6);
        let (px, py) = fit.local_to_pixel(xi, eta).unwrap();
        assert_relative_eq!(px, 100.5, epsilon = 1e-6);
        assert_relative_eq!(py, 301.25, epsilon = 1e-6);
    }

    // Strongly distorted optics: the affine fit is accepted but flags a
    // round-trip error above a pixel.
    struct QuadraticWcs {
        field: Field,
    }

    impl WcsLike for QuadraticWcs {
        fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
            let dx = x - 50.0;
            let dy = y - 50.0;
            let xi = 0.1 * dx + 0.002 * dx * dx;
            let eta = 0.1 * dy + 0.002 * dy * dy;
            self.field.local2celestial(xi, eta).unwrap()
        }

        fn sky_to_pixel(&self, _ra_deg: f64, _dec_deg: f64) -> (f64, f64) {
            unimplemented!("not consumed by the affine fit")
        }
    }

    #[test]
    fn affine_fit_accepts_but_flags_nonlinear_wcs() {
        let field = Field::at(83.0, -5.4, 0.5);
        let wcs = QuadraticWcs {
            field: Field::at(83.0, -5.4, 0.5),
        };
        let fit = field.fit_pixel_affine(&wcs, 101, 101).unwrap();
        assert!(
            fit.max_roundtrip_px > 1.0,
            "expected over-budget residual, got {} px",
            fit.max_roundtrip_px
        );
    }

    #[test]
    fn singular_affine_cannot_invert() {
        let fit = AffineFit {
            a: [[1.0, 2.0], [2.0, 4.0]],
            b: [0.0, 0.0],
            max_roundtrip_px: 0.0,
        };
        assert!(matches!(
            fit.local_to_pixel(1.0, 1.0),
            Err(CatalogError::DegenerateField { .. })
        ));
    }
}
