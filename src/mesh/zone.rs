//! Faces and zones of one mesh snapshot.

use std::f64::consts::PI;

use super::cell::Cell;
use super::FaceId;
use crate::error::{RadError, Result};
use crate::geometry::Surface;
use crate::materials::ZoneMaterial;
use crate::types::Vec3;

// ============================================================================
// FACE
// ============================================================================

/// Bounding surface of a zone, with its neighbor links
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub id: FaceId,
    pub surface: Surface,
    /// +1 if the geometric normal points out of the zone, -1 otherwise
    pub orientation: f64,
    /// Faces of other zones glued to this one
    pub neighbors: Vec<FaceId>,
    /// Lies on the outer boundary of the mesh
    pub boundary: bool,
}

impl Face {
    /// Outward normal at a point on the face
    pub fn outward_normal(&self, point: &Vec3) -> Vec3 {
        self.surface.normal_at(point) * self.orientation
    }

    /// Signed distance, positive outside the zone
    pub fn outward_distance(&self, point: &Vec3) -> f64 {
        self.surface.distance(point) * self.orientation
    }
}

// ============================================================================
// ZONE
// ============================================================================

/// Where a ray leaves a zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneExit {
    /// Local index of the exit face
    pub face: usize,
    /// Path length from the query point (≥ 0)
    pub t: f64,
    pub point: Vec3,
}

/// Volumetric mesh element
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: usize,
    pub faces: Vec<Face>,
    pub material: ZoneMaterial,
    pub cells: Vec<Cell>,
    centroid: Vec3,
}

impl Zone {
    /// Build a zone and orient its faces outward
    ///
    /// The zone centroid is the mean of the face representative points.
    /// Planar and conical faces are oriented by which side of them the
    /// centroid falls on; spheres carry their side in the sign of the radius.
    pub fn new(
        id: usize,
        faces: Vec<(Surface, Vec<FaceId>, bool)>,
        material: ZoneMaterial,
        cells: Vec<Cell>,
    ) -> Result<Self> {
        if faces.is_empty() {
            return Err(RadError::mesh(id, None, "zone has no faces"));
        }
        let n = faces.len() as f64;
        let centroid = faces
            .iter()
            .fold(Vec3::zero(), |acc, (s, _, _)| acc + s.representative_point())
            / n;

        let mut built = Vec::with_capacity(faces.len());
        for (f, (surface, neighbors, boundary)) in faces.into_iter().enumerate() {
            let orientation = match &surface {
                Surface::Sphere(_) => 1.0,
                _ => {
                    let rep = surface.representative_point();
                    let normal = surface.normal_at(&rep);
                    if normal.is_zero() {
                        // Collapsed face: never intersected, sign is irrelevant
                        built.push(Face {
                            id: FaceId::new(id, f),
                            surface,
                            orientation: 1.0,
                            neighbors,
                            boundary,
                        });
                        continue;
                    }
                    let side = (rep - centroid).dot(&normal);
                    if side == 0.0 {
                        return Err(RadError::mesh(
                            id,
                            Some(f),
                            format!("{} face passes through the zone centroid", surface.kind()),
                        ));
                    }
                    side.signum()
                }
            };
            built.push(Face {
                id: FaceId::new(id, f),
                surface,
                orientation,
                neighbors,
                boundary,
            });
        }
        Ok(Self {
            id,
            faces: built,
            material,
            cells,
            centroid,
        })
    }

    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    pub fn nfaces(&self) -> usize {
        self.faces.len()
    }

    pub fn face(&self, index: usize) -> Result<&Face> {
        self.faces
            .get(index)
            .ok_or_else(|| RadError::out_of_range("face", index, self.faces.len()))
    }

    /// True if `point` is on the inner side of every face, within `tol`
    pub fn contains(&self, point: &Vec3, tol: f64) -> bool {
        self.faces.iter().all(|f| f.outward_distance(point) <= tol)
    }

    /// Analysis cases of this zone, 1 without an analysis cell
    pub fn ncases(&self) -> usize {
        self.cells.first().map_or(1, Cell::get_ncases)
    }

    /// Material for zone case `case`; the only case of a zone without a
    /// cell is its hydro material
    pub fn case_material(&self, case: usize) -> Result<ZoneMaterial> {
        match self.cells.first() {
            Some(cell) => cell.get_cell_eos(case),
            None if case == 0 => Ok(self.material.clone()),
            None => Err(RadError::out_of_range("zone case", case, 1)),
        }
    }

    /// Enclosed volume from the flux of (0, 0, z) through the faces
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|face| match &face.surface {
                Surface::Polygon(p) => face.orientation * p.normal().z * p.area() * p.center().z,
                Surface::Sphere(s) => s.orientation() * 4.0 / 3.0 * PI * s.radius.abs().powi(3),
                Surface::Cone(c) => {
                    let rep = c.midpoint();
                    let nz = face.outward_normal(&rep).z;
                    let (dr, dz) = (c.rb - c.ra, c.zb - c.za);
                    let moment = c.za * c.ra + 0.5 * (c.za * dr + c.ra * dz) + dz * dr / 3.0;
                    2.0 * PI * nz * c.slant() * moment
                }
            })
            .sum()
    }

    /// Nearest exit crossing of the ray `origin + t·dir`
    ///
    /// Only crossings that leave the zone (outward normal along `dir`)
    /// qualify. Crossings of `entry_face` must lie strictly ahead by more
    /// than `tol` so the entry point is not picked again. If the query point
    /// has drifted so far that nothing qualifies, the search is repeated from
    /// the centroid and the result projected back onto the ray.
    pub fn exit(&self, origin: &Vec3, dir: &Vec3, entry_face: Option<usize>, tol: f64) -> Option<ZoneExit> {
        if let Some(found) = self.nearest_exit(origin, dir, entry_face, tol) {
            return Some(found);
        }
        let found = self.nearest_exit(&self.centroid, dir, None, tol)?;
        let t = (found.point - *origin).dot(dir).max(0.0);
        Some(ZoneExit {
            face: found.face,
            t,
            point: *origin + *dir * t,
        })
    }

    fn nearest_exit(&self, origin: &Vec3, dir: &Vec3, entry_face: Option<usize>, tol: f64) -> Option<ZoneExit> {
        let mut best: Option<(usize, f64)> = None;
        for (i, face) in self.faces.iter().enumerate() {
            let floor = if entry_face == Some(i) { tol } else { -tol };
            for hit in face.surface.intersect(origin, dir, tol).iter() {
                if hit.t <= floor || (hit.normal * face.orientation).dot(dir) <= 0.0 {
                    continue;
                }
                if best.map_or(true, |(_, t)| hit.t < t) {
                    best = Some((i, hit.t));
                }
            }
        }
        best.map(|(face, t)| {
            let t = t.max(0.0);
            ZoneExit {
                face,
                t,
                point: *origin + *dir * t,
            }
        })
    }
}
