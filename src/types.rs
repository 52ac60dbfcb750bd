//! # Core Types
//!
//! Three-dimensional vector algebra shared by the geometry, mesh, transport
//! and detector layers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BIG, COS_UNDEFINED, SMALL};

// ============================================================================
// VECTOR TYPE (3D)
// ============================================================================

/// 3D vector for positions, velocities, directions and normals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Unit vectors
    pub const fn unit_x() -> Self { Self::new(1.0, 0.0, 0.0) }
    pub const fn unit_y() -> Self { Self::new(0.0, 1.0, 0.0) }
    pub const fn unit_z() -> Self { Self::new(0.0, 0.0, 1.0) }

    /// Unit vector from polar angle `theta` (from +z) and azimuth `phi` (from +x)
    pub fn from_spherical(theta: f64, phi: f64) -> Self {
        let st = theta.sin();
        Self::new(st * phi.cos(), st * phi.sin(), theta.cos())
    }

    /// Magnitude squared
    pub fn mag_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Magnitude
    pub fn mag(&self) -> f64 {
        self.mag_squared().sqrt()
    }

    /// Normalize to unit vector; a zero-length vector normalizes to zero
    pub fn normalize(&self) -> Self {
        let m = self.mag();
        if m > SMALL {
            Self::new(self.x / m, self.y / m, self.z / m)
        } else {
            Self::zero()
        }
    }

    /// True when every component is exactly zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Scale by scalar
    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Add vectors
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Subtract vectors
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Sum of absolute component differences
    pub fn abs_diff(&self, other: &Self) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    /// Cosine of the angle to `other`; `COS_UNDEFINED` if either is zero-length
    pub fn cos_angle(&self, other: &Self) -> f64 {
        let denom = self.mag() * other.mag();
        if denom < SMALL {
            return COS_UNDEFINED;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0)
    }

    /// Angle to `other` in radians; `BIG` if either is zero-length
    pub fn angle(&self, other: &Self) -> f64 {
        let c = self.cos_angle(other);
        if c == COS_UNDEFINED {
            BIG
        } else {
            c.acos()
        }
    }

    /// Parallel or antiparallel within `tol` (on |sin θ|)
    pub fn parallel_to(&self, other: &Self, tol: f64) -> bool {
        let denom = self.mag() * other.mag();
        if denom < SMALL {
            return false;
        }
        self.cross(other).mag() / denom <= tol
    }

    /// Perpendicular within `tol` (on |cos θ|)
    pub fn perpendicular_to(&self, other: &Self, tol: f64) -> bool {
        let denom = self.mag() * other.mag();
        if denom < SMALL {
            return false;
        }
        (self.dot(other) / denom).abs() <= tol
    }

    /// Mirror image of `self` about a plane with the given normal
    pub fn reflect(&self, normal: &Self) -> Self {
        let n = normal.normalize();
        *self - n * (2.0 * self.dot(&n))
    }

    /// True if `self` lies in the ball whose diameter is the segment a-b
    pub fn is_between(&self, a: &Self, b: &Self, tol: f64) -> bool {
        (*self - *a).dot(&(*self - *b)) <= tol
    }

    /// Cylindrical (r, z) projection, with r = sqrt(x² + y²)
    pub fn rz(&self) -> (f64, f64) {
        ((self.x * self.x + self.y * self.y).sqrt(), self.z)
    }

    /// In-plane right normal of the xy components, (y, -x, 0)
    pub fn right_normal(&self) -> Self {
        Self::new(self.y, -self.x, 0.0)
    }
}

/// Sign of the turn a → b → c as seen along `axis`: +1 left, -1 right, 0 collinear
pub fn turn(a: &Vec3, b: &Vec3, c: &Vec3, axis: &Vec3, tol: f64) -> i32 {
    let s = (*b - *a).cross(&(*c - *b)).dot(axis);
    if s > tol {
        1
    } else if s < -tol {
        -1
    } else {
        0
    }
}

// ============================================================================
// LINES AND PLANES
// ============================================================================

/// Parameter t where p + t·u meets the plane through `q` with normal `n`
pub fn line_plane_intersection(p: &Vec3, u: &Vec3, q: &Vec3, n: &Vec3, tol: f64) -> Option<f64> {
    let un = u.dot(n);
    if un.abs() <= tol {
        return None;
    }
    Some((*q - *p).dot(n) / un)
}

/// Parameters (s, t) of the closest points p1 + s·u1 and p2 + t·u2
///
/// Returns `None` for parallel or degenerate lines.
pub fn line_line_closest(p1: &Vec3, u1: &Vec3, p2: &Vec3, u2: &Vec3, tol: f64) -> Option<(f64, f64)> {
    let w = *p1 - *p2;
    let a = u1.dot(u1);
    let b = u1.dot(u2);
    let c = u2.dot(u2);
    let d = u1.dot(&w);
    let e = u2.dot(&w);
    let denom = a * c - b * b;
    if denom.abs() <= tol * a * c || a < SMALL || c < SMALL {
        return None;
    }
    Some(((b * e - c * d) / denom, (a * e - b * d) / denom))
}

/// Intersection point of two lines, if they pass within `tol` of each other
pub fn line_line_intersection(p1: &Vec3, u1: &Vec3, p2: &Vec3, u2: &Vec3, tol: f64) -> Option<Vec3> {
    let (s, t) = line_line_closest(p1, u1, p2, u2, tol)?;
    let a = *p1 + *u1 * s;
    let b = *p2 + *u2 * t;
    if (a - b).mag() <= tol {
        Some((a + b) * 0.5)
    } else {
        None
    }
}

/// Least-squares line y = slope·x + intercept; `None` with fewer than two distinct x
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mx = xs[..n].iter().sum::<f64>() / nf;
    let my = ys[..n].iter().sum::<f64>() / nf;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx < SMALL {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl std::ops::Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(self * v.x, self * v.y, self * v.z)
    }
}

impl std::ops::Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, s: f64) -> Self {
        Self::new(self.x / s, self.y / s, self.z / s)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6e}, {:.6e}, {:.6e})", self.x, self.y, self.z)
    }
}
