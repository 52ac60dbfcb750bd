//! Planar polygon bounded by an ordered loop of mesh nodes.
//!
//! The polygon is assumed convex and planar. Area, normal and centroid come
//! from a triangle fan anchored at the first vertex and are cached at
//! construction, since faces are immutable once a mesh is built.

use super::{Area2NormalCenter, Hit, Hits};
use crate::constants::SMALL;
use crate::error::{RadError, Result};
use crate::types::Vec3;

/// Convex planar polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Grid node indices, in loop order
    nodes: Vec<usize>,
    /// Node positions, in loop order
    vertices: Vec<Vec3>,
    /// Node velocities (empty when the mesh carries none)
    velocities: Vec<Vec3>,
    /// Fan sum of cross products; |s| = 2·area
    s: Vec3,
    normal: Vec3,
    center: Vec3,
}

impl Polygon {
    /// Build from node ids and their positions
    ///
    /// Fails with `GeometryDegenerate` for fewer than three vertices or a
    /// node/vertex count mismatch. A zero-area loop is accepted; it has a
    /// zero normal and never reports an intersection.
    pub fn new(nodes: Vec<usize>, vertices: Vec<Vec3>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(RadError::degenerate(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if nodes.len() != vertices.len() {
            return Err(RadError::degenerate(format!(
                "polygon has {} node ids for {} vertices",
                nodes.len(),
                vertices.len()
            )));
        }
        let (s, center) = fan(&vertices);
        Ok(Self {
            nodes,
            vertices,
            velocities: Vec::new(),
            normal: s.normalize(),
            s,
            center,
        })
    }

    /// Build from bare positions, numbering nodes 0..n
    pub fn from_points(vertices: Vec<Vec3>) -> Result<Self> {
        let nodes = (0..vertices.len()).collect();
        Self::new(nodes, vertices)
    }

    /// Attach per-node velocities (same order as the vertices)
    pub fn with_velocities(mut self, velocities: Vec<Vec3>) -> Self {
        if velocities.len() == self.vertices.len() {
            self.velocities = velocities;
        }
        self
    }

    /// Same loop traversed in the opposite direction (normal flipped)
    pub fn reversed(&self) -> Self {
        let mut nodes = self.nodes.clone();
        let mut vertices = self.vertices.clone();
        let mut velocities = self.velocities.clone();
        nodes.reverse();
        vertices.reverse();
        velocities.reverse();
        let (s, center) = fan(&vertices);
        Self {
            nodes,
            vertices,
            velocities,
            normal: s.normalize(),
            s,
            center,
        }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Unit normal following the right-hand rule on the vertex order
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Area-weighted centroid
    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn area(&self) -> f64 {
        0.5 * self.s.mag()
    }

    pub fn area2_normal_center(&self) -> Area2NormalCenter {
        Area2NormalCenter {
            area2: 0.25 * self.s.mag_squared(),
            normal: self.normal,
            center: self.center,
        }
    }

    /// Signed distance from the plane, positive along the normal
    pub fn distance(&self, point: &Vec3) -> f64 {
        (*point - self.vertices[0]).dot(&self.normal)
    }

    /// Foot of the perpendicular from `point` onto the plane
    pub fn subpoint(&self, point: &Vec3) -> Vec3 {
        *point - self.normal * self.distance(point)
    }

    /// True if `point` lies in the plane and inside the loop, within `tol`
    ///
    /// Points on an edge count as inside.
    pub fn contains(&self, point: &Vec3, tol: f64) -> bool {
        if self.normal.is_zero() || self.distance(point).abs() > tol {
            return false;
        }
        let n = self.vertices.len();
        let mut first_turn = 0.0_f64;
        for j in 0..n {
            let tail = self.vertices[j];
            let head = self.vertices[(j + 1) % n];
            let edge = head - tail;
            let len = edge.mag();
            if len < SMALL {
                continue;
            }
            // Signed in-plane distance of the point from this edge's line
            let side = edge.cross(&(*point - tail)).dot(&self.normal) / len;
            if side.abs() <= tol {
                continue;
            }
            if first_turn == 0.0 {
                first_turn = side.signum();
            } else if first_turn != side.signum() {
                return false;
            }
        }
        true
    }

    /// Crossing of the ray with the polygon (0 or 1 hit)
    pub fn intersect(&self, origin: &Vec3, dir: &Vec3, tol: f64) -> Hits {
        let denom = dir.dot(&self.normal);
        if denom.abs() < tol.max(SMALL) {
            return Hits::none();
        }
        let t = (self.vertices[0] - *origin).dot(&self.normal) / denom;
        let w = *origin + *dir * t;
        if self.contains(&w, tol) {
            Hits::one(Hit { t, normal: self.normal })
        } else {
            Hits::none()
        }
    }

    /// Inverse-distance weighted node velocity at `point`
    pub fn velocity_at(&self, point: &Vec3) -> Vec3 {
        if self.velocities.is_empty() {
            return Vec3::zero();
        }
        let mut sum = Vec3::zero();
        let mut wsum = 0.0;
        for (x, v) in self.vertices.iter().zip(&self.velocities) {
            let d = (*x - *point).mag();
            if d < SMALL {
                return *v;
            }
            sum += *v / d;
            wsum += 1.0 / d;
        }
        sum / wsum
    }
}

/// Triangle fan about vertex 0: cross-product sum and area-weighted centroid
fn fan(vertices: &[Vec3]) -> (Vec3, Vec3) {
    let origin = vertices[0];
    let mut s = Vec3::zero();
    let mut c = Vec3::zero();
    let mut weight = 0.0;
    for i in 2..vertices.len() {
        let a = (vertices[i - 1] - origin).cross(&(vertices[i] - origin));
        s += a;
        let w = a.mag();
        c += (origin + vertices[i - 1] + vertices[i]) * (w / 3.0);
        weight += w;
    }
    let center = if weight > SMALL {
        c / weight
    } else {
        let n = vertices.len() as f64;
        vertices.iter().fold(Vec3::zero(), |acc, v| acc + *v) / n
    };
    (s, center)
}
