//! # Detector Module
//!
//! A rectangular patch grid in a plane, with one ray per patch.
//!
//! ## Geometry
//!
//! ```text
//!            half_y
//!              ▲
//!   ┌───┬───┬──┼┬───┐
//!   │   │   │  ││   │      center + half-vectors span the plate;
//!   ├───┼───┼──┼┼───┤      patches are dx × dy, counted
//!   │   │   │  ●──────▶ half_x   nx = round(2|half_x|/dx), ny likewise
//!   ├───┼───┼───┼───┤
//!   │ ◦ │   │   │   │      ◦ = first patch center
//!   └───┴───┴───┴───┘
//! ```
//!
//! Parallel projection sends each ray along the plate normal from a plane
//! `standoff` behind the plate; point projection sends each ray from a point
//! source to its patch center. Either way a ray ends on the plate.
//!
//! Patches are independent, so a tracing pass fans out over a rayon pool
//! and every worker writes only its own slot of the image buffer. A patch
//! whose ray fails to traverse the mesh is marked invalid and the rest of
//! the image is still produced.

pub mod image;

pub use image::{Image, ImageAxis};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::TraceConfig;
use crate::error::{RadError, Result};
use crate::materials::Database;
use crate::mesh::Mesh;
use crate::transport::{broaden_fwhm, Backlighter, MeshOptics, Ray};
use crate::types::Vec3;

/// Ray geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Rays along the plate normal, starting `standoff` behind the plate
    Parallel { standoff: f64 },
    /// Rays from a point source to each patch center
    Point { source: Vec3 },
}

/// Plate of patches plus the source that illuminates it
#[derive(Debug, Clone)]
pub struct Detector {
    name: String,
    center: Vec3,
    half_x: Vec3,
    half_y: Vec3,
    dx: f64,
    dy: f64,
    nx: usize,
    ny: usize,
    ex: Vec3,
    ey: Vec3,
    ez: Vec3,
    first_patch: Vec3,
    projection: Projection,
    backlighter: Backlighter,
    fwhm: Option<f64>,
    signal: Vec<f64>,
    valid: Vec<bool>,
}

impl Detector {
    /// Build a detector; the half-vectors must be non-zero and perpendicular
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        center: Vec3,
        half_x: Vec3,
        half_y: Vec3,
        dx: f64,
        dy: f64,
        projection: Projection,
        backlighter: Backlighter,
    ) -> Result<Self> {
        if !(dx > 0.0 && dy > 0.0) {
            return Err(RadError::config(format!("patch size must be positive ({} x {})", dx, dy)));
        }
        let (ex, ey) = (half_x.normalize(), half_y.normalize());
        if ex.is_zero() || ey.is_zero() {
            return Err(RadError::degenerate("detector half-vector has zero length"));
        }
        if ex.dot(&ey).abs() > 1e-9 {
            return Err(RadError::degenerate("detector half-vectors are not perpendicular"));
        }
        if let Projection::Parallel { standoff } = projection {
            if !(standoff > 0.0) {
                return Err(RadError::config(format!("standoff must be positive, got {}", standoff)));
            }
        }
        let nx = ((2.0 * half_x.mag() / dx).round() as usize).max(1);
        let ny = ((2.0 * half_y.mag() / dy).round() as usize).max(1);
        let (ux, uy) = (ex * dx, ey * dy);
        Ok(Self {
            name: name.into(),
            center,
            half_x,
            half_y,
            dx,
            dy,
            nx,
            ny,
            ex,
            ey,
            ez: ex.cross(&ey),
            first_patch: center - half_x - half_y + (ux + uy) * 0.5,
            projection,
            backlighter,
            fwhm: None,
            signal: Vec::new(),
            valid: Vec::new(),
        })
    }

    /// Gaussian instrument broadening of every patch spectrum
    pub fn with_fwhm(mut self, fwhm: f64) -> Self {
        self.fwhm = (fwhm > 0.0).then_some(fwhm);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn half_vectors(&self) -> (Vec3, Vec3) {
        (self.half_x, self.half_y)
    }

    /// Patches along x and y
    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Unit normal of the plate (ex × ey)
    pub fn normal(&self) -> Vec3 {
        self.ez
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn patch_center(&self, ix: usize, iy: usize) -> Vec3 {
        self.first_patch + self.ex * (self.dx * ix as f64) + self.ey * (self.dy * iy as f64)
    }

    /// Solid angle of a patch seen from the point source; zero for a
    /// parallel projection
    pub fn patch_solid_angle(&self, ix: usize, iy: usize) -> f64 {
        match self.projection {
            Projection::Parallel { .. } => 0.0,
            Projection::Point { source } => {
                let d = self.patch_center(ix, iy) - source;
                let r2 = d.mag_squared();
                if r2 == 0.0 {
                    return 0.0;
                }
                self.dx * self.dy * d.normalize().dot(&self.ez).abs() / r2
            }
        }
    }

    /// Unstarted ray for patch (ix, iy), carrying the backlighter spectrum
    pub fn patch_ray(&self, ix: usize, iy: usize, hv: &[f64], cfg: &TraceConfig) -> Result<Ray> {
        if ix >= self.nx {
            return Err(RadError::out_of_range("patch column", ix, self.nx));
        }
        if iy >= self.ny {
            return Err(RadError::out_of_range("patch row", iy, self.ny));
        }
        let target = self.patch_center(ix, iy);
        let spectrum = self.backlighter.spectrum(hv);
        match self.projection {
            Projection::Parallel { standoff } => {
                Ok(Ray::new(target - self.ez * standoff, self.ez, spectrum)?.with_max_path(standoff))
            }
            Projection::Point { source } => {
                let d = target - source;
                let distance = d.mag();
                if distance < cfg.tolerance.parallel {
                    return Err(RadError::degenerate(format!(
                        "point source coincides with patch ({}, {})",
                        ix, iy
                    )));
                }
                Ok(Ray::new(source, d, spectrum)?.with_max_path(distance))
            }
        }
    }

    /// Trace the ray of one patch and return its (broadened) spectrum
    pub fn trace_patch(
        &self,
        ix: usize,
        iy: usize,
        mesh: &Mesh,
        optics: &MeshOptics,
        cfg: &TraceConfig,
    ) -> Result<Vec<f64>> {
        let mut ray = self.patch_ray(ix, iy, optics.hv(), cfg)?;
        ray.trace(mesh, optics, cfg)?;
        let spectrum = ray.into_spectrum();
        Ok(match self.fwhm {
            Some(w) => broaden_fwhm(optics.hv(), &spectrum, w),
            None => spectrum,
        })
    }

    /// Trace every patch through `mesh` and assemble the image
    ///
    /// The internal buffer is reset first. Traversal failures mark their
    /// patch invalid; any other error aborts the pass.
    pub fn trace(&mut self, mesh: &Mesh, db: &Database, cfg: &TraceConfig) -> Result<Image> {
        cfg.validate()?;
        let optics = MeshOptics::build(mesh, db)?;
        self.trace_with(mesh, &optics, cfg)
    }

    /// Same as `trace`, with zone optics computed by the caller
    #[instrument(skip_all, fields(detector = %self.name, time = mesh.time()))]
    pub fn trace_with(&mut self, mesh: &Mesh, optics: &MeshOptics, cfg: &TraceConfig) -> Result<Image> {
        cfg.validate()?;
        if optics.len() != mesh.len() {
            return Err(RadError::config(format!(
                "optics cover {} zones, mesh has {}",
                optics.len(),
                mesh.len()
            )));
        }
        let nhv = optics.nhv();
        if nhv == 0 {
            return Err(RadError::config("database has an empty photon grid"));
        }
        let npatch = self.nx * self.ny;
        let mut signal = vec![0.0; npatch * nhv];
        let mut valid = vec![true; npatch];

        let this = &*self;
        signal
            .par_chunks_mut(nhv)
            .zip(valid.par_iter_mut())
            .enumerate()
            .try_for_each(|(k, (slot, ok))| -> Result<()> {
                let (ix, iy) = (k % this.nx, k / this.nx);
                match this.trace_patch(ix, iy, mesh, optics, cfg) {
                    Ok(spectrum) => slot.copy_from_slice(&spectrum),
                    Err(e) if e.is_traversal() => {
                        warn!(ix, iy, error = %e, "patch marked invalid");
                        *ok = false;
                    }
                    Err(e) => return Err(e),
                }
                Ok(())
            })?;

        self.signal = signal;
        self.valid = valid;
        let invalid = self.valid.iter().filter(|v| !**v).count();
        info!(patches = npatch, invalid, "detector traced");
        Ok(self.image(mesh.time(), optics.hv().to_vec()))
    }

    fn image(&self, time: f64, hv: Vec<f64>) -> Image {
        Image {
            name: self.name.clone(),
            time,
            nx: self.nx,
            ny: self.ny,
            hv,
            data: self.signal.clone(),
            valid: self.valid.clone(),
            x_axis: ImageAxis::centered("x (cm)", self.nx, self.dx),
            y_axis: ImageAxis::centered("y (cm)", self.ny, self.dy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{Element, Table, ZoneMaterial};
    use crate::mesh::{Grid, MeshSnapshot, ZoneRecord};

    const HV: [f64; 2] = [1000.0, 2000.0];

    /// 4 × 4 × 1 slab of carbon with density increasing along x
    fn setup() -> (Mesh, Database) {
        let grid = Grid::brick([4, 4, 1], Vec3::zero(), Vec3::new(1.0, 1.0, 0.25)).unwrap();
        let zones = (0..grid.nzones())
            .map(|z| ZoneRecord::new(ZoneMaterial::single("C", 50.0, 1e20 * (1 + z % 4) as f64)))
            .collect();
        let mesh = Mesh::from_snapshot(&grid, &MeshSnapshot::at_rest(&grid, 2.0e-9, zones)).unwrap();
        let db = Database::new("test", HV.to_vec())
            .unwrap()
            .with_table(Table::constant(Element::new("C", 6, 12.011), HV.len(), 1e-20, 1e-22, 4.0).unwrap())
            .unwrap();
        (mesh, db)
    }

    fn face_on(n: usize, projection: Projection) -> Detector {
        Detector::new(
            "face-on",
            Vec3::new(0.5, 0.5, 1.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
            1.0 / n as f64,
            1.0 / n as f64,
            projection,
            Backlighter::Flat { intensity: 100.0 },
        )
        .unwrap()
    }

    #[test]
    fn test_patch_geometry() {
        let d = face_on(4, Projection::Parallel { standoff: 2.0 });
        assert_eq!(d.shape(), (4, 4));
        let p = d.patch_center(0, 0);
        assert!((p - Vec3::new(0.125, 0.125, 1.0)).mag() < 1e-12);
        let q = d.patch_center(3, 2);
        assert!((q - Vec3::new(0.875, 0.625, 1.0)).mag() < 1e-12);
        assert!((d.normal() - Vec3::unit_z()).mag() < 1e-12);
        let ray = d.patch_ray(0, 0, &HV, &TraceConfig::default()).unwrap();
        assert!((ray.origin().z + 1.0).abs() < 1e-12);
        assert!(d.patch_ray(4, 0, &HV, &TraceConfig::default()).is_err());
    }

    #[test]
    fn test_parallel_image_follows_column_density() {
        let (mesh, db) = setup();
        let mut d = face_on(4, Projection::Parallel { standoff: 2.0 });
        let image = d.trace(&mesh, &db, &TraceConfig::default()).unwrap();
        assert_eq!(image.invalid_count(), 0);
        assert!((image.time - 2.0e-9).abs() < 1e-20);
        // Column ix sees κ = ix + 1 over 0.25 cm
        for ix in 0..4 {
            let kappa = (ix + 1) as f64;
            let tr = (-0.25 * kappa).exp();
            let expected = 100.0 * tr + (1.0 - tr) * 1e-2;
            let got = image.at(ix, 1).unwrap()[0];
            assert!((got - expected).abs() < 1e-9, "ix {ix}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_patch_order_does_not_matter() {
        let (mesh, db) = setup();
        let source = Vec3::new(0.5, 0.5, -3.0);
        let mut d = face_on(6, Projection::Point { source });
        let cfg = TraceConfig::default();
        let image = d.trace(&mesh, &db, &cfg).unwrap();

        let optics = MeshOptics::build(&mesh, &db).unwrap();
        let (nx, ny) = d.shape();
        for k in (0..nx * ny).rev() {
            let (ix, iy) = (k % nx, k / nx);
            let spectrum = d.trace_patch(ix, iy, &mesh, &optics, &cfg).unwrap();
            assert_eq!(image.at(ix, iy).unwrap(), spectrum.as_slice());
        }
    }

    #[test]
    fn test_retrace_resets_buffer() {
        let (mesh, db) = setup();
        let mut d = face_on(2, Projection::Parallel { standoff: 2.0 });
        let first = d.trace(&mesh, &db, &TraceConfig::default()).unwrap();
        let second = d.trace(&mesh, &db, &TraceConfig::default()).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn test_prebuilt_optics() {
        let (mesh, db) = setup();
        let mut d = face_on(2, Projection::Parallel { standoff: 2.0 });
        let direct = d.trace(&mesh, &db, &TraceConfig::default()).unwrap();
        let optics = MeshOptics::build(&mesh, &db).unwrap();
        let reused = d.trace_with(&mesh, &optics, &TraceConfig::default()).unwrap();
        assert_eq!(direct.data, reused.data);

        let short = MeshOptics::from_materials(&db, &[ZoneMaterial::vacuum()]).unwrap();
        assert!(matches!(
            d.trace_with(&mesh, &short, &TraceConfig::default()),
            Err(RadError::Config { .. })
        ));
    }

    #[test]
    fn test_failed_patch_is_marked_invalid() {
        // Two zones along x; the +z face of zone 1 is glued to itself
        let grid = Grid::brick([2, 1, 1], Vec3::zero(), Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let mut value = serde_json::to_value(&grid).unwrap();
        value["zones"][1]["faces"][5]["boundary"] = serde_json::json!(false);
        value["zones"][1]["faces"][5]["neighbors"] = serde_json::json!([{ "zone": 1, "face": 5 }]);
        let grid: Grid = serde_json::from_value(value).unwrap();
        let zones = vec![ZoneRecord::new(ZoneMaterial::single("C", 50.0, 1e20)); 2];
        let mesh = Mesh::from_snapshot(&grid, &MeshSnapshot::at_rest(&grid, 0.0, zones)).unwrap();
        let (_, db) = setup();

        let mut d = Detector::new(
            "split",
            Vec3::new(1.0, 0.5, 2.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
            1.0,
            1.0,
            Projection::Parallel { standoff: 3.0 },
            Backlighter::Flat { intensity: 1.0 },
        )
        .unwrap();
        let image = d.trace(&mesh, &db, &TraceConfig::default()).unwrap();
        assert_eq!(image.invalid_count(), 1);
        assert!(image.is_valid(0, 0).unwrap());
        assert!(!image.is_valid(1, 0).unwrap());
        let tr = (-1.0_f64).exp();
        assert!((image.at(0, 0).unwrap()[0] - (tr + (1.0 - tr) * 1e-2)).abs() < 1e-9);
    }

    #[test]
    fn test_point_source_solid_angle() {
        let d = face_on(2, Projection::Point { source: Vec3::new(0.25, 0.25, 0.0) });
        // Patch (0, 0) sits 1 cm straight above the source
        assert!((d.patch_solid_angle(0, 0) - 0.25).abs() < 1e-12);
        assert!(d.patch_solid_angle(1, 1) < 0.25);
        assert_eq!(face_on(2, Projection::Parallel { standoff: 1.0 }).patch_solid_angle(0, 0), 0.0);
    }

    #[test]
    fn test_bad_geometry() {
        let bad = Detector::new(
            "skew",
            Vec3::zero(),
            Vec3::unit_x(),
            Vec3::new(1.0, 1.0, 0.0),
            0.1,
            0.1,
            Projection::Parallel { standoff: 1.0 },
            Backlighter::default(),
        );
        assert!(matches!(bad, Err(RadError::GeometryDegenerate { .. })));
    }
}
