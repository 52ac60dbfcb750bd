//! # Geometry Module
//!
//! Surface primitives that bound mesh zones. The set of primitives is
//! closed, so they are variants of one enum and every capability is a
//! `match` over the three shapes:
//!
//! ```text
//! Surface
//! ├── Polygon   planar loop of nodes
//! ├── Cone      RZ frustum, surface of revolution about z
//! └── Sphere    signed radius, optional center velocity
//! ```
//!
//! Every surface answers the same questions: area, area² with normal and
//! centroid, signed distance, containment and ray intersection. Degenerate
//! input never yields NaN: a zero-area polygon or a ray parallel to a plane
//! simply produces no hit.

pub mod cone;
pub mod polygon;
pub mod sphere;

pub use cone::Cone;
pub use polygon::Polygon;
pub use sphere::Sphere;

use crate::types::Vec3;

// ============================================================================
// INTERSECTION RESULTS
// ============================================================================

/// One ray/surface crossing at parameter `t` along the ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Ray parameter of the crossing
    pub t: f64,
    /// Geometric surface normal at the crossing (unit length)
    pub normal: Vec3,
}

/// Up to two crossings, sorted by ascending `t`
#[derive(Debug, Clone, Copy, Default)]
pub struct Hits {
    len: usize,
    hits: [Option<Hit>; 2],
}

impl Hits {
    /// No crossing
    pub fn none() -> Self {
        Self::default()
    }

    /// Single crossing
    pub fn one(hit: Hit) -> Self {
        Self { len: 1, hits: [Some(hit), None] }
    }

    /// Two crossings; reordered so the nearer one comes first
    pub fn two(a: Hit, b: Hit) -> Self {
        let (a, b) = if b.t < a.t { (b, a) } else { (a, b) };
        Self { len: 2, hits: [Some(a), Some(b)] }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().take(self.len).flatten()
    }

    /// Nearest crossing with t > `min_t`
    pub fn nearest_after(&self, min_t: f64) -> Option<Hit> {
        self.iter().copied().find(|h| h.t > min_t)
    }
}

/// Area squared with unit normal and area-weighted centroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area2NormalCenter {
    pub area2: f64,
    pub normal: Vec3,
    pub center: Vec3,
}

// ============================================================================
// SURFACE
// ============================================================================

/// Closed set of zone-bounding surfaces
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Polygon(Polygon),
    Cone(Cone),
    Sphere(Sphere),
}

impl Surface {
    /// Surface area (≥ 0)
    pub fn area(&self) -> f64 {
        match self {
            Surface::Polygon(p) => p.area(),
            Surface::Cone(c) => c.area(),
            Surface::Sphere(s) => s.area(),
        }
    }

    /// Area², unit normal and area-weighted centroid
    pub fn area2_normal_center(&self) -> Area2NormalCenter {
        match self {
            Surface::Polygon(p) => p.area2_normal_center(),
            Surface::Cone(c) => c.area2_normal_center(),
            Surface::Sphere(s) => s.area2_normal_center(),
        }
    }

    /// Signed distance, positive on the side the geometric normal points to
    pub fn distance(&self, point: &Vec3) -> f64 {
        match self {
            Surface::Polygon(p) => p.distance(point),
            Surface::Cone(c) => c.distance(point),
            Surface::Sphere(s) => s.distance(point),
        }
    }

    /// True if `point` lies on the surface patch within `tol`
    pub fn contains(&self, point: &Vec3, tol: f64) -> bool {
        match self {
            Surface::Polygon(p) => p.contains(point, tol),
            Surface::Cone(c) => c.contains(point, tol),
            Surface::Sphere(s) => s.contains(point, tol),
        }
    }

    /// Crossings of the ray `origin + t·dir` with this surface
    pub fn intersect(&self, origin: &Vec3, dir: &Vec3, tol: f64) -> Hits {
        match self {
            Surface::Polygon(p) => p.intersect(origin, dir, tol),
            Surface::Cone(c) => c.intersect(origin, dir, tol),
            Surface::Sphere(s) => s.intersect(origin, dir, tol),
        }
    }

    /// Geometric normal at a point on (or near) the surface
    pub fn normal_at(&self, point: &Vec3) -> Vec3 {
        match self {
            Surface::Polygon(p) => p.normal(),
            Surface::Cone(c) => c.normal_at(point),
            Surface::Sphere(s) => s.normal_at(point),
        }
    }

    /// A representative point on the surface patch
    pub fn representative_point(&self) -> Vec3 {
        match self {
            Surface::Polygon(p) => p.center(),
            Surface::Cone(c) => c.midpoint(),
            Surface::Sphere(s) => s.center + Vec3::unit_x() * s.radius.abs(),
        }
    }

    /// Short name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Surface::Polygon(_) => "polygon",
            Surface::Cone(_) => "cone",
            Surface::Sphere(_) => "sphere",
        }
    }
}

impl From<Polygon> for Surface {
    fn from(p: Polygon) -> Self {
        Surface::Polygon(p)
    }
}

impl From<Cone> for Surface {
    fn from(c: Cone) -> Self {
        Surface::Cone(c)
    }
}

impl From<Sphere> for Surface {
    fn from(s: Sphere) -> Self {
        Surface::Sphere(s)
    }
}

/// Real roots of a·t² + b·t + c = 0, ascending
///
/// A vanishing discriminant yields the double root twice. The linear
/// solution is used when `a` is negligible against `b`, which puts the
/// second root beyond |b/a| > 1/tol. `c` grows with the squared distance
/// of the origin and takes no part in that test.
pub(crate) fn solve_quadratic(a: f64, b: f64, c: f64, tol: f64) -> Option<(f64, f64)> {
    if a.abs() <= tol * b.abs() {
        if b == 0.0 {
            return None;
        }
        let t = -c / b;
        return Some((t, t));
    }
    let disc = b * b - 4.0 * a * c;
    if disc < -tol * (b * b).max((4.0 * a * c).abs()) {
        return None;
    }
    if disc <= 0.0 {
        let t = -b / (2.0 * a);
        return Some((t, t));
    }
    // Numerically stable form
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let (t1, t2) = if q == 0.0 {
        let r = (-c / a).sqrt();
        (-r, r)
    } else {
        (q / a, c / q)
    };
    Some(if t1 <= t2 { (t1, t2) } else { (t2, t1) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_sorted() {
        let a = Hit { t: 3.0, normal: Vec3::unit_x() };
        let b = Hit { t: 1.0, normal: Vec3::unit_y() };
        let h = Hits::two(a, b);
        let ts: Vec<f64> = h.iter().map(|h| h.t).collect();
        assert_eq!(ts, vec![1.0, 3.0]);
        assert_eq!(h.nearest_after(1.5).map(|h| h.t), Some(3.0));
        assert!(Hits::none().is_empty());
    }

    #[test]
    fn test_quadratic() {
        let (t1, t2) = solve_quadratic(1.0, -3.0, 2.0, 1e-12).unwrap();
        assert!((t1 - 1.0).abs() < 1e-12 && (t2 - 2.0).abs() < 1e-12);
        // Double root
        let (t1, t2) = solve_quadratic(1.0, -2.0, 1.0, 1e-12).unwrap();
        assert_eq!(t1, t2);
        // No real root
        assert!(solve_quadratic(1.0, 0.0, 1.0, 1e-12).is_none());
        // Linear fallback
        let (t1, _) = solve_quadratic(0.0, 2.0, -4.0, 1e-12).unwrap();
        assert!((t1 - 2.0).abs() < 1e-12);
        assert!(solve_quadratic(0.0, 0.0, 3.0, 1e-12).is_none());
        // Large constant term stays quadratic
        let (t1, t2) = solve_quadratic(1.0, -2e5, 1e10 - 1.0, 1e-9).unwrap();
        assert!((t1 - 99999.0).abs() < 1e-6);
        assert!((t2 - 100001.0).abs() < 1e-6);
    }

    #[test]
    fn test_surface_dispatch() {
        let s: Surface = Sphere::new(Vec3::zero(), 2.0).into();
        assert_eq!(s.kind(), "sphere");
        assert!(s.contains(&Vec3::new(0.0, 2.0, 0.0), 1e-9));
        assert!((s.distance(&Vec3::new(0.0, 0.0, 3.0)) - 1.0).abs() < 1e-12);
    }
}
