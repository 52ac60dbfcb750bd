//! Conical frustum: the surface swept by the segment a-b of the rz
//! half-plane as it revolves about the z axis.
//!
//! Covers cylinders (ra = rb), annular disks (za = zb) and true cone
//! sections. Nodes live in the φ = 0 half-plane, so a node at (x, y, z)
//! contributes r = x and z = z.

use std::f64::consts::PI;

use super::{solve_quadratic, Area2NormalCenter, Hit, Hits};
use crate::constants::SMALL;
use crate::error::{RadError, Result};
use crate::types::Vec3;

/// RZ frustum between (ra, za) and (rb, zb)
#[derive(Debug, Clone, PartialEq)]
pub struct Cone {
    /// Grid node ids of the two ends
    nodes: [usize; 2],
    pub ra: f64,
    pub za: f64,
    pub rb: f64,
    pub zb: f64,
    /// (vr, vz) of each end node
    velocities: Option<[(f64, f64); 2]>,
}

impl Cone {
    /// Build from two rz end points; fails if they coincide or r < 0
    pub fn new(ra: f64, za: f64, rb: f64, zb: f64) -> Result<Self> {
        if ra < 0.0 || rb < 0.0 {
            return Err(RadError::degenerate(format!(
                "cone radius must be non-negative (ra = {}, rb = {})",
                ra, rb
            )));
        }
        if (rb - ra).hypot(zb - za) < SMALL {
            return Err(RadError::degenerate("cone end points coincide"));
        }
        Ok(Self {
            nodes: [0, 1],
            ra,
            za,
            rb,
            zb,
            velocities: None,
        })
    }

    /// Build from two grid nodes in the φ = 0 half-plane
    pub fn from_nodes(ids: [usize; 2], a: &Vec3, b: &Vec3) -> Result<Self> {
        let mut cone = Self::new(a.x, a.z, b.x, b.z)?;
        cone.nodes = ids;
        Ok(cone)
    }

    /// Attach (vr, vz) end velocities
    pub fn with_velocities(mut self, va: &Vec3, vb: &Vec3) -> Self {
        self.velocities = Some([(va.x, va.z), (vb.x, vb.z)]);
        self
    }

    pub fn nodes(&self) -> [usize; 2] {
        self.nodes
    }

    fn dr(&self) -> f64 {
        self.rb - self.ra
    }

    fn dz(&self) -> f64 {
        self.zb - self.za
    }

    /// Slant length of the generating segment
    pub fn slant(&self) -> f64 {
        self.dr().hypot(self.dz())
    }

    /// True for an annular disk (za = zb)
    pub fn is_flat(&self) -> bool {
        self.dz().abs() < SMALL
    }

    /// Unit right normal of a→b in the rz plane, as (n_r, n_z)
    fn rz_normal(&self) -> (f64, f64) {
        let s = self.slant();
        (self.dz() / s, -self.dr() / s)
    }

    /// Lateral area π(ra + rb)·s
    pub fn area(&self) -> f64 {
        PI * (self.ra + self.rb) * self.slant()
    }

    /// Area², normal at φ = 0, and the area-weighted centroid on the z axis
    pub fn area2_normal_center(&self) -> Area2NormalCenter {
        let area = self.area();
        let (nr, nz) = self.rz_normal();
        let rsum = self.ra + self.rb;
        let zc = if rsum > SMALL {
            self.za + self.dz() * (self.ra + 2.0 * self.rb) / (3.0 * rsum)
        } else {
            0.5 * (self.za + self.zb)
        };
        Area2NormalCenter {
            area2: area * area,
            normal: Vec3::new(nr, 0.0, nz),
            center: Vec3::new(0.0, 0.0, zc),
        }
    }

    /// Midpoint of the generating segment at φ = 0
    pub fn midpoint(&self) -> Vec3 {
        Vec3::new(0.5 * (self.ra + self.rb), 0.0, 0.5 * (self.za + self.zb))
    }

    /// Geometric normal at the azimuth of `point`
    pub fn normal_at(&self, point: &Vec3) -> Vec3 {
        let (nr, nz) = self.rz_normal();
        let (rp, _) = point.rz();
        if rp < SMALL {
            return Vec3::new(nr, 0.0, nz);
        }
        Vec3::new(nr * point.x / rp, nr * point.y / rp, nz)
    }

    /// Projection parameter of `point` onto the generating line (0 at a, 1 at b)
    fn line_parameter(&self, rp: f64, zp: f64) -> f64 {
        let (dr, dz) = (self.dr(), self.dz());
        ((rp - self.ra) * dr + (zp - self.za) * dz) / (dr * dr + dz * dz)
    }

    /// Nearest point on the (infinite) generating cone, at the azimuth of `point`
    pub fn subpoint(&self, point: &Vec3) -> Vec3 {
        let (rp, zp) = point.rz();
        let t = self.line_parameter(rp, zp);
        let rs = self.ra + t * self.dr();
        let phi = point.y.atan2(point.x);
        Vec3::new(rs * phi.cos(), rs * phi.sin(), self.za + t * self.dz())
    }

    /// Signed rz distance from the generating line, positive along the normal
    pub fn distance(&self, point: &Vec3) -> f64 {
        let (rp, zp) = point.rz();
        let (nr, nz) = self.rz_normal();
        (rp - self.ra) * nr + (zp - self.za) * nz
    }

    /// True if the rz image of `point` lies on the segment a-b within `tol`
    pub fn contains(&self, point: &Vec3, tol: f64) -> bool {
        let (rp, zp) = point.rz();
        let t = self.line_parameter(rp, zp).clamp(0.0, 1.0);
        let r = self.ra + t * self.dr();
        let z = self.za + t * self.dz();
        (rp - r).hypot(zp - z) <= tol.max(SMALL) * (1.0 + self.slant())
    }

    /// Crossings of the ray with the frustum (0, 1 or 2 hits)
    pub fn intersect(&self, origin: &Vec3, dir: &Vec3, tol: f64) -> Hits {
        if self.is_flat() {
            if dir.z.abs() < tol.max(SMALL) {
                return Hits::none();
            }
            let t = (self.za - origin.z) / dir.z;
            let w = *origin + *dir * t;
            if !self.contains(&w, tol) {
                return Hits::none();
            }
            return Hits::one(Hit { t, normal: self.normal_at(&w) });
        }

        let (dr, dz) = (self.dr(), self.dz());
        let (px, py, pz) = (origin.x, origin.y, origin.z);
        let (ux, uy, uz) = (dir.x, dir.y, dir.z);
        let rp2 = px * px + py * py;
        let zd = pz - self.za;
        let dz2 = dz * dz;
        let ff = dz2 * (px * ux + py * uy);
        let gg = dz * self.ra * dr;
        let hh = gg + zd * dr * dr;
        let uzdr = uz * dr;

        let a = dz2 * (ux * ux + uy * uy) - uzdr * uzdr;
        let b = 2.0 * (ff - uz * hh);
        let c = dz2 * (rp2 - self.ra * self.ra) - zd * (gg + hh);

        let Some((t1, t2)) = solve_quadratic(a, b, c, tol) else {
            return Hits::none();
        };
        // Keep roots that land on the real (r ≥ 0) sheet inside the segment
        let keep = |t: f64| -> Option<Hit> {
            let w = *origin + *dir * t;
            if self.contains(&w, tol) {
                Some(Hit { t, normal: self.normal_at(&w) })
            } else {
                None
            }
        };
        match (keep(t1), keep(t2)) {
            (Some(h1), Some(h2)) => Hits::two(h1, h2),
            (Some(h), None) | (None, Some(h)) => Hits::one(h),
            (None, None) => Hits::none(),
        }
    }

    /// Node velocity interpolated along the segment and rotated to the azimuth of `point`
    pub fn velocity_at(&self, point: &Vec3) -> Vec3 {
        let Some([(vra, vza), (vrb, vzb)]) = self.velocities else {
            return Vec3::zero();
        };
        let (rp, zp) = point.rz();
        let t = self.line_parameter(rp, zp).clamp(0.0, 1.0);
        let vr = vra + t * (vrb - vra);
        let vz = vza + t * (vzb - vza);
        let phi = point.y.atan2(point.x);
        Vec3::new(vr * phi.cos(), vr * phi.sin(), vz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_area() {
        let c = Cone::new(1.0, 0.0, 1.0, 2.0).unwrap();
        assert!((c.area() - 2.0 * PI * 2.0).abs() < 1e-12);
        let anc = c.area2_normal_center();
        assert!((anc.center.z - 1.0).abs() < 1e-12);
        // right normal of a→b = (dz, -dr)/s points to +r
        assert!((anc.normal - Vec3::unit_x()).mag() < 1e-12);
    }

    #[test]
    fn test_annulus_area_and_plane_hit() {
        let c = Cone::new(1.0, 0.5, 2.0, 0.5).unwrap();
        assert!(c.is_flat());
        assert!((c.area() - PI * (4.0 - 1.0)).abs() < 1e-12);
        let h = c.intersect(&Vec3::new(1.5, 0.0, -1.0), &Vec3::unit_z(), 1e-9);
        assert_eq!(h.len(), 1);
        assert!((h.nearest_after(0.0).unwrap().t - 1.5).abs() < 1e-12);
        // Through the hole
        assert!(c.intersect(&Vec3::new(0.5, 0.0, -1.0), &Vec3::unit_z(), 1e-9).is_empty());
    }

    #[test]
    fn test_ray_through_axis_symmetric_hits() {
        // Frustum from r=2 at z=0 to r=1 at z=2; aim at the axis at the centroid height
        let c = Cone::new(2.0, 0.0, 1.0, 2.0).unwrap();
        let zc = c.area2_normal_center().center.z;
        let origin = Vec3::new(-10.0, 0.0, zc);
        let hits = c.intersect(&origin, &Vec3::unit_x(), 1e-9);
        assert_eq!(hits.len(), 2);
        let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
        // Symmetric about the projection of the axis point (t = 10)
        assert!(((ts[0] + ts[1]) * 0.5 - 10.0).abs() < 1e-9);
        let r_expected = 2.0 - 0.5 * zc;
        assert!((ts[1] - ts[0] - 2.0 * r_expected).abs() < 1e-9);
    }

    #[test]
    fn test_distant_origin_crosses_both_walls() {
        let c = Cone::new(1.0, 0.0, 1.0, 2.0).unwrap();
        let hits = c.intersect(&Vec3::new(-1e5, 0.0, 1.0), &Vec3::unit_x(), 1e-9);
        assert_eq!(hits.len(), 2);
        let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
        assert!((ts[0] - 99999.0).abs() < 1e-6);
        assert!((ts[1] - 100001.0).abs() < 1e-6);
    }

    #[test]
    fn test_ghost_sheet_rejected() {
        // Cone apex at z=2; the mirrored sheet above the apex must not be hit
        let c = Cone::new(1.0, 0.0, 0.0, 1.0).unwrap();
        let hits = c.intersect(&Vec3::new(-5.0, 0.0, 1.5), &Vec3::unit_x(), 1e-9);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_contains_and_distance() {
        let c = Cone::new(1.0, 0.0, 1.0, 2.0).unwrap();
        assert!(c.contains(&Vec3::new(0.0, 1.0, 1.0), 1e-9));
        assert!(!c.contains(&Vec3::new(0.0, 1.0, 3.0), 1e-9));
        assert!((c.distance(&Vec3::new(0.0, 3.0, 1.0)) - 2.0).abs() < 1e-12);
        assert!((c.distance(&Vec3::new(0.5, 0.0, 1.0)) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_rejected() {
        assert!(Cone::new(1.0, 1.0, 1.0, 1.0).is_err());
        assert!(Cone::new(-1.0, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_velocity_rotates_with_azimuth() {
        let c = Cone::new(1.0, 0.0, 1.0, 2.0)
            .unwrap()
            .with_velocities(&Vec3::new(1.0, 0.0, 0.0), &Vec3::new(1.0, 0.0, 0.0));
        let v = c.velocity_at(&Vec3::new(0.0, 1.0, 1.0));
        assert!((v - Vec3::unit_y()).mag() < 1e-12);
    }
}
