//! Sphere with a signed radius.
//!
//! A positive radius is an outer surface (normal points away from the
//! center); a negative radius is an inner surface (normal points toward the
//! center), which is how a spherical shell zone bounds its hole.

use std::f64::consts::PI;

use super::{solve_quadratic, Area2NormalCenter, Hit, Hits};
use crate::constants::SMALL;
use crate::types::Vec3;

/// Sphere with optional center velocity and radial expansion rate
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    /// Grid node id of the center
    pub node: usize,
    pub center: Vec3,
    /// Signed radius (negative for an inner surface)
    pub radius: f64,
    /// Center velocity
    pub velocity: Vec3,
    /// Radial velocity of the surface (d|r|/dt)
    pub expansion: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self {
            node: 0,
            center,
            radius,
            velocity: Vec3::zero(),
            expansion: 0.0,
        }
    }

    /// Inner surface of the given radius
    pub fn inner(center: Vec3, radius: f64) -> Self {
        Self::new(center, -radius.abs())
    }

    pub fn with_motion(mut self, velocity: Vec3, expansion: f64) -> Self {
        self.velocity = velocity;
        self.expansion = expansion;
        self
    }

    /// +1 outer, -1 inner, 0 degenerate
    pub fn orientation(&self) -> f64 {
        if self.radius > 0.0 {
            1.0
        } else if self.radius < 0.0 {
            -1.0
        } else {
            0.0
        }
    }

    /// Position and size after `dt` of uniform motion
    pub fn advanced(&self, dt: f64) -> Self {
        let r = (self.radius.abs() + self.expansion * dt).max(0.0);
        Self {
            center: self.center + self.velocity * dt,
            radius: r * self.orientation(),
            ..self.clone()
        }
    }

    pub fn area(&self) -> f64 {
        4.0 * PI * self.radius * self.radius
    }

    /// The net vector area of a closed surface vanishes, so the normal is zero
    pub fn area2_normal_center(&self) -> Area2NormalCenter {
        let a = self.area();
        Area2NormalCenter {
            area2: a * a,
            normal: Vec3::zero(),
            center: self.center,
        }
    }

    pub fn normal_at(&self, point: &Vec3) -> Vec3 {
        (*point - self.center).normalize() * self.orientation()
    }

    /// (|w - c| - |r|)·sign(r)
    pub fn distance(&self, point: &Vec3) -> f64 {
        ((*point - self.center).mag() - self.radius.abs()) * self.orientation()
    }

    /// Nearest surface point, `None` at the center
    pub fn subpoint(&self, point: &Vec3) -> Option<Vec3> {
        let d = *point - self.center;
        let m = d.mag();
        if m < SMALL {
            None
        } else {
            Some(self.center + d * (self.radius.abs() / m))
        }
    }

    /// A sphere has no rim, so any point within `tol` of it is contained
    pub fn contains(&self, point: &Vec3, tol: f64) -> bool {
        self.distance(point).abs() <= tol.max(SMALL) * (1.0 + self.radius.abs())
    }

    /// Crossings with the ray; a tangent ray yields the double root twice
    pub fn intersect(&self, origin: &Vec3, dir: &Vec3, tol: f64) -> Hits {
        if self.radius == 0.0 {
            return Hits::none();
        }
        let d = *origin - self.center;
        let a = dir.dot(dir);
        let b = 2.0 * d.dot(dir);
        let c = d.dot(&d) - self.radius * self.radius;
        let Some((t1, t2)) = solve_quadratic(a, b, c, tol) else {
            return Hits::none();
        };
        let hit = |t: f64| Hit {
            t,
            normal: self.normal_at(&(*origin + *dir * t)),
        };
        Hits::two(hit(t1), hit(t2))
    }

    /// Surface velocity at `point`: center motion plus radial expansion
    pub fn velocity_at(&self, point: &Vec3) -> Vec3 {
        self.velocity + (*point - self.center).normalize() * self.expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_symmetric_hits_toward_center() {
        let s = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 2.0);
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        let origin = s.center + n * 10.0;
        let hits = s.intersect(&origin, &(-n), 1e-12);
        assert_eq!(hits.len(), 2);
        let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
        assert!((ts[0] - 8.0).abs() < 1e-10);
        assert!((ts[1] - 12.0).abs() < 1e-10);
        assert!(((ts[0] + ts[1]) * 0.5 - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_distant_origin_keeps_both_hits() {
        let s = Sphere::new(Vec3::zero(), 1.0);
        for dist in [4e4, 1e5, 1e7] {
            let hits = s.intersect(&Vec3::new(-dist, 0.0, 0.0), &Vec3::unit_x(), 1e-9);
            assert_eq!(hits.len(), 2);
            let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
            assert!((ts[0] - (dist - 1.0)).abs() < 1e-6 * dist);
            assert!((ts[1] - (dist + 1.0)).abs() < 1e-6 * dist);
            assert!(ts[1] > ts[0]);
        }
    }

    #[test]
    fn test_tangent_is_double_hit() {
        let s = Sphere::new(Vec3::zero(), 1.0);
        let hits = s.intersect(&Vec3::new(-5.0, 1.0, 0.0), &Vec3::unit_x(), 1e-12);
        assert_eq!(hits.len(), 2);
        let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
        assert_eq!(ts[0], ts[1]);
        assert!((ts[0] - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_miss() {
        let s = Sphere::new(Vec3::zero(), 1.0);
        assert!(s.intersect(&Vec3::new(-5.0, 2.0, 0.0), &Vec3::unit_x(), 1e-12).is_empty());
    }

    #[test]
    fn test_inner_surface_normal_and_distance() {
        let s = Sphere::inner(Vec3::zero(), 1.0);
        let p = Vec3::new(0.0, 0.0, 1.0);
        assert!((s.normal_at(&p) + Vec3::unit_z()).mag() < 1e-12);
        // Inside the hole is on the positive side of an inner surface
        assert!((s.distance(&Vec3::new(0.0, 0.0, 0.5)) - 0.5).abs() < 1e-12);
        assert!(s.contains(&p, 1e-9));
    }

    #[test]
    fn test_area_and_advance() {
        let s = Sphere::new(Vec3::zero(), 2.0).with_motion(Vec3::unit_x(), 0.5);
        assert!((s.area() - 16.0 * PI).abs() < 1e-12);
        let t = s.advanced(2.0);
        assert!((t.radius - 3.0).abs() < 1e-12);
        assert!((t.center - Vec3::new(2.0, 0.0, 0.0)).mag() < 1e-12);
        assert_eq!(s.area2_normal_center().normal, Vec3::zero());
    }
}
