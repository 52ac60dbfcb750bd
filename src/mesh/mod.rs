//! # Mesh Module
//!
//! Unstructured, time-indexed zone mesh that rays walk through.
//!
//! ## Layout
//!
//! ```text
//! Grid (nodes + topology template, shared across time steps)
//!   │
//!   │  + MeshSnapshot (positions, velocities, zone material) from Hydro
//!   ▼
//! Mesh (one time index)
//!   └── Zone[id] ── Face[k] ── Surface + neighbor FaceIds
//!              └── Cell[m]
//! ```
//!
//! Zones and faces live in flat vectors and refer to one another by
//! `FaceId` indices. A mesh is never updated in place: each time step builds
//! a fresh one from the grid and that step's snapshot.

pub mod cell;
pub mod grid;
pub mod hydro;
pub mod zone;

pub use cell::{CaseLayout, Cell, SearchAxis, Spacing};
pub use grid::{FaceTemplate, Grid, Node, ShapeTemplate, ZoneTemplate};
pub use hydro::{Hydro, HydroSeries, MeshSnapshot, ZoneRecord};
pub use zone::{Face, Zone, ZoneExit};

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::constants::SMALL;
use crate::error::{RadError, Result};
use crate::geometry::{Cone, Polygon, Sphere, Surface};
use crate::materials::ZoneMaterial;
use crate::types::Vec3;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Face `face` of zone `zone`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId {
    pub zone: usize,
    pub face: usize,
}

impl FaceId {
    pub fn new(zone: usize, face: usize) -> Self {
        Self { zone, face }
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {} face {}", self.zone, self.face)
    }
}

/// What lies across a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFace {
    /// Entry face of the neighboring zone
    Zone(FaceId),
    /// Outside the mesh
    Exterior,
}

// ============================================================================
// MESH
// ============================================================================

/// Zone collection for one time index
#[derive(Debug, Clone)]
pub struct Mesh {
    time: f64,
    time_index: usize,
    ndim: usize,
    zones: Vec<Zone>,
    boundary: Vec<FaceId>,
}

impl Mesh {
    /// Build the mesh for `time_index` from the grid and the hydro state
    #[instrument(skip(grid, hydro), fields(nzones = grid.nzones()))]
    pub fn load(grid: &Grid, hydro: &dyn Hydro, time_index: usize) -> Result<Self> {
        if hydro.get_nzones() != grid.nzones() {
            return Err(RadError::mesh(
                0,
                None,
                format!(
                    "hydro has {} zones, grid has {}",
                    hydro.get_nzones(),
                    grid.nzones()
                ),
            ));
        }
        let snapshot = hydro.load_at(time_index)?;
        let mut mesh = Self::from_snapshot(grid, &snapshot)?;
        mesh.time_index = time_index;
        debug!(time = mesh.time, boundary_faces = mesh.boundary.len(), "mesh loaded");
        Ok(mesh)
    }

    /// Build a mesh from the grid template and one snapshot
    ///
    /// Fails with `MeshIntegrity` if the snapshot does not match the grid
    /// or a face cannot be built from its nodes.
    pub fn from_snapshot(grid: &Grid, snapshot: &MeshSnapshot) -> Result<Self> {
        let nnodes = grid.nnodes();
        if snapshot.positions.len() != nnodes {
            return Err(RadError::mesh(
                0,
                None,
                format!("snapshot has {} node positions, grid has {}", snapshot.positions.len(), nnodes),
            ));
        }
        if let Some(v) = &snapshot.velocities {
            if v.len() != nnodes {
                return Err(RadError::mesh(
                    0,
                    None,
                    format!("snapshot has {} node velocities, grid has {}", v.len(), nnodes),
                ));
            }
        }
        if snapshot.zones.len() != grid.nzones() {
            return Err(RadError::mesh(
                snapshot.zones.len().min(grid.nzones()),
                None,
                format!("snapshot has {} zones, grid has {}", snapshot.zones.len(), grid.nzones()),
            ));
        }

        let mut zones = Vec::with_capacity(grid.nzones());
        let mut boundary = Vec::new();
        for (z, (template, record)) in grid.zones().iter().zip(&snapshot.zones).enumerate() {
            let mut faces = Vec::with_capacity(template.faces.len());
            for (f, ft) in template.faces.iter().enumerate() {
                let surface = build_surface(&ft.shape, snapshot)
                    .map_err(|e| RadError::mesh(z, Some(f), e.to_string()))?;
                if ft.boundary {
                    boundary.push(FaceId::new(z, f));
                }
                faces.push((surface, ft.neighbors.clone(), ft.boundary));
            }
            zones.push(Zone::new(z, faces, record.material.clone(), record.cells.clone())?);
        }

        let mesh = Self {
            time: snapshot.time,
            time_index: 0,
            ndim: grid.ndim(),
            zones,
            boundary,
        };
        mesh.check_links()?;
        Ok(mesh)
    }

    /// Every interior face has a neighbor that exists and links back
    fn check_links(&self) -> Result<()> {
        for zone in &self.zones {
            for face in &zone.faces {
                if !face.boundary && face.neighbors.is_empty() {
                    return Err(RadError::mesh(zone.id, Some(face.id.face), "interior face has no neighbor"));
                }
                for nb in &face.neighbors {
                    let back = self.face(*nb).map_err(|_| {
                        RadError::mesh(zone.id, Some(face.id.face), format!("neighbor {} does not exist", nb))
                    })?;
                    if !back.neighbors.contains(&face.id) {
                        return Err(RadError::mesh(
                            zone.id,
                            Some(face.id.face),
                            format!("neighbor {} does not link back", nb),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, id: usize) -> Result<&Zone> {
        self.zones
            .get(id)
            .ok_or_else(|| RadError::out_of_range("zone", id, self.zones.len()))
    }

    pub fn face(&self, id: FaceId) -> Result<&Face> {
        self.zone(id.zone)?.face(id.face)
    }

    /// Faces on the outer boundary
    pub fn boundary_faces(&self) -> &[FaceId] {
        &self.boundary
    }

    /// Number of analysis cases under `layout`
    pub fn get_ncases(&self, layout: CaseLayout) -> Result<usize> {
        let mut counts = self.zones.iter().map(Zone::ncases);
        match layout {
            CaseLayout::Product => counts
                .try_fold(1usize, |acc, n| acc.checked_mul(n))
                .ok_or_else(|| RadError::config("analysis case count overflows")),
            CaseLayout::PerZone => Ok(counts.sum()),
        }
    }

    /// Material of every zone in analysis case `case`
    pub fn case_materials(&self, layout: CaseLayout, case: usize) -> Result<Vec<ZoneMaterial>> {
        let ncases = self.get_ncases(layout)?;
        if case >= ncases {
            return Err(RadError::out_of_range("analysis case", case, ncases));
        }
        let mut rest = case;
        match layout {
            CaseLayout::Product => self
                .zones
                .iter()
                .map(|z| {
                    let n = z.ncases();
                    let digit = rest % n;
                    rest /= n;
                    z.case_material(digit)
                })
                .collect(),
            CaseLayout::PerZone => {
                let mut found = false;
                let mut materials = Vec::with_capacity(self.zones.len());
                for z in &self.zones {
                    let n = z.ncases();
                    if !found && rest < n {
                        found = true;
                        materials.push(z.case_material(rest)?);
                        continue;
                    }
                    if !found {
                        rest -= n;
                    }
                    materials.push(z.material.clone());
                }
                Ok(materials)
            }
        }
    }

    /// Zone containing `point`, or `None` outside the mesh
    ///
    /// Walks outward from `seed` through face neighbors, then scans any
    /// zone the walk did not reach.
    pub fn get_zone(&self, point: &Vec3, seed: Option<usize>, tol: f64) -> Option<usize> {
        let n = self.zones.len();
        let mut visited = vec![false; n];
        if let Some(start) = seed.filter(|&s| s < n) {
            let mut queue = VecDeque::from([start]);
            visited[start] = true;
            while let Some(z) = queue.pop_front() {
                let zone = &self.zones[z];
                if zone.contains(point, tol) {
                    return Some(z);
                }
                for nb in zone.faces.iter().flat_map(|f| f.neighbors.iter()) {
                    if !visited[nb.zone] {
                        visited[nb.zone] = true;
                        queue.push_back(nb.zone);
                    }
                }
            }
        }
        (0..n).find(|&z| !visited[z] && self.zones[z].contains(point, tol))
    }

    /// First boundary crossing that enters the mesh along `origin + t·dir`
    ///
    /// Crossings of `exclude` must lie ahead by more than `tol`.
    pub fn entry(&self, origin: &Vec3, dir: &Vec3, exclude: Option<FaceId>, tol: f64) -> Option<(FaceId, f64)> {
        let mut best: Option<(FaceId, f64)> = None;
        for &id in &self.boundary {
            let face = &self.zones[id.zone].faces[id.face];
            let floor = if exclude == Some(id) { tol } else { -tol };
            for hit in face.surface.intersect(origin, dir, tol).iter() {
                if hit.t <= floor || (hit.normal * face.orientation).dot(dir) >= 0.0 {
                    continue;
                }
                if best.map_or(true, |(_, t)| hit.t < t) {
                    best = Some((id, hit.t));
                }
            }
        }
        best.map(|(id, t)| (id, t.max(0.0)))
    }

    /// Face a ray enters after leaving through `exit` at `point`
    ///
    /// With several glued neighbors the one whose zone contains `point`
    /// is chosen.
    pub fn next_face(&self, exit: FaceId, point: &Vec3, tol: f64) -> Result<NextFace> {
        let face = self.face(exit)?;
        if face.boundary {
            return Ok(NextFace::Exterior);
        }
        match face.neighbors.as_slice() {
            [] => Err(RadError::traversal(exit.zone, Some(exit.face), "interior face has no neighbor")),
            [only] => Ok(NextFace::Zone(*only)),
            many => many
                .iter()
                .find(|nb| self.zones[nb.zone].contains(point, tol))
                .map(|nb| NextFace::Zone(*nb))
                .ok_or_else(|| {
                    RadError::traversal(
                        exit.zone,
                        Some(exit.face),
                        format!("no neighbor zone contains exit point {}", point),
                    )
                }),
        }
    }
}

/// Surface for one face template at the snapshot's node positions
fn build_surface(shape: &ShapeTemplate, snapshot: &MeshSnapshot) -> Result<Surface> {
    let pos = |id: usize| snapshot.positions[id];
    let vel = |id: usize| snapshot.velocities.as_ref().map(|v| v[id]);
    match shape {
        ShapeTemplate::Polygon { nodes } => {
            let polygon = Polygon::new(nodes.clone(), nodes.iter().map(|&n| pos(n)).collect())?;
            Ok(match snapshot.velocities {
                Some(_) => polygon.with_velocities(nodes.iter().filter_map(|&n| vel(n)).collect()),
                None => polygon,
            }
            .into())
        }
        ShapeTemplate::Cone { nodes } => {
            let [a, b] = *nodes;
            let cone = Cone::from_nodes(*nodes, &pos(a), &pos(b))?;
            Ok(match (vel(a), vel(b)) {
                (Some(va), Some(vb)) => cone.with_velocities(&va, &vb),
                _ => cone,
            }
            .into())
        }
        ShapeTemplate::Sphere { center, surface, inner } => {
            let radial = pos(*surface) - pos(*center);
            let radius = radial.mag();
            if radius < SMALL {
                return Err(RadError::degenerate("sphere surface node coincides with its center"));
            }
            let mut sphere = if *inner {
                Sphere::inner(pos(*center), radius)
            } else {
                Sphere::new(pos(*center), radius)
            };
            sphere.node = *center;
            if let (Some(vc), Some(vs)) = (vel(*center), vel(*surface)) {
                sphere = sphere.with_motion(vc, (vs - vc).dot(&radial.normalize()));
            }
            Ok(sphere.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::ZoneMaterial;

    fn brick_mesh(n: [usize; 3]) -> (Grid, Mesh) {
        let hi = Vec3::new(n[0] as f64, n[1] as f64, n[2] as f64);
        let grid = Grid::brick(n, Vec3::zero(), hi).unwrap();
        let snap = MeshSnapshot::at_rest(&grid, 0.0, vec![ZoneRecord::default(); grid.nzones()]);
        let mesh = Mesh::from_snapshot(&grid, &snap).unwrap();
        (grid, mesh)
    }

    #[test]
    fn test_get_zone() {
        let (_, mesh) = brick_mesh([3, 2, 1]);
        assert_eq!(mesh.get_zone(&Vec3::new(2.5, 1.5, 0.5), Some(0), 1e-9), Some(5));
        assert_eq!(mesh.get_zone(&Vec3::new(0.5, 0.5, 0.5), None, 1e-9), Some(0));
        assert_eq!(mesh.get_zone(&Vec3::new(1.5, 0.5, 0.5), Some(99), 1e-9), Some(1));
        assert_eq!(mesh.get_zone(&Vec3::new(5.0, 0.5, 0.5), Some(0), 1e-9), None);
    }

    #[test]
    fn test_entry_and_next_face() {
        let (_, mesh) = brick_mesh([2, 1, 1]);
        let origin = Vec3::new(-1.0, 0.5, 0.5);
        let (face, t) = mesh.entry(&origin, &Vec3::unit_x(), None, 1e-9).unwrap();
        assert_eq!(face, FaceId::new(0, 0));
        assert!((t - 1.0).abs() < 1e-12);
        let across = mesh.next_face(FaceId::new(0, 1), &Vec3::new(1.0, 0.5, 0.5), 1e-9).unwrap();
        assert_eq!(across, NextFace::Zone(FaceId::new(1, 0)));
        let out = mesh.next_face(FaceId::new(1, 1), &Vec3::new(2.0, 0.5, 0.5), 1e-9).unwrap();
        assert_eq!(out, NextFace::Exterior);
        // Heading away from the mesh
        assert!(mesh.entry(&origin, &(-Vec3::unit_x()), None, 1e-9).is_none());
    }

    #[test]
    fn test_size_mismatch_is_integrity_error() {
        let grid = Grid::brick([2, 1, 1], Vec3::zero(), Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let mut snap = MeshSnapshot::at_rest(&grid, 0.0, vec![ZoneRecord::default(); 2]);
        snap.positions.pop();
        assert!(matches!(
            Mesh::from_snapshot(&grid, &snap),
            Err(RadError::MeshIntegrity { .. })
        ));
        let snap = MeshSnapshot::at_rest(&grid, 0.0, vec![ZoneRecord::default(); 3]);
        assert!(matches!(
            Mesh::from_snapshot(&grid, &snap),
            Err(RadError::MeshIntegrity { .. })
        ));
    }

    #[test]
    fn test_rebuild_does_not_alias_previous_step() {
        let grid = Grid::brick([2, 1, 1], Vec3::zero(), Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let mut hydro = HydroSeries::for_grid(&grid);
        let hot = ZoneRecord::new(ZoneMaterial::single("Al", 100.0, 1e21));
        hydro
            .push(MeshSnapshot::drifting(&grid, 0.0, Vec3::unit_z(), vec![hot.clone(); 2]))
            .unwrap();
        let cold = ZoneRecord::new(ZoneMaterial::single("Al", 10.0, 1e21));
        hydro
            .push(MeshSnapshot::drifting(&grid, 1.0, Vec3::unit_z(), vec![cold; 2]))
            .unwrap();

        let first = Mesh::load(&grid, &hydro, 0).unwrap();
        let second = Mesh::load(&grid, &hydro, 1).unwrap();
        assert_eq!(second.time_index(), 1);

        // Step 0 is untouched by building step 1
        assert!((first.zone(0).unwrap().material.te - 100.0).abs() < 1e-12);
        assert!((second.zone(0).unwrap().material.te - 10.0).abs() < 1e-12);
        let p = Vec3::new(0.5, 0.5, 0.5);
        assert_eq!(first.get_zone(&p, None, 1e-9), Some(0));
        assert_eq!(second.get_zone(&p, None, 1e-9), None);
        assert_eq!(second.get_zone(&(p + Vec3::unit_z()), None, 1e-9), Some(0));
        for (a, b) in first.zones().iter().zip(second.zones()) {
            assert!(!std::ptr::eq(a, b));
            assert!(!std::ptr::eq(a.faces.as_ptr(), b.faces.as_ptr()));
        }
    }

    #[test]
    fn test_case_materials() {
        let grid = Grid::brick([2, 1, 1], Vec3::zero(), Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let cell = |low: f64, high: f64, count: usize| {
            Cell::new(
                &SearchAxis::linear(low, high, count),
                &SearchAxis::fixed(5.0),
                &[("Al", SearchAxis::fixed(1e21))],
            )
            .unwrap()
        };
        let zones = vec![
            ZoneRecord::new(ZoneMaterial::single("Al", 1.0, 1e20)).with_cells(vec![cell(10.0, 20.0, 2)]),
            ZoneRecord::new(ZoneMaterial::single("Al", 2.0, 1e20)).with_cells(vec![cell(30.0, 50.0, 3)]),
        ];
        let mesh = Mesh::from_snapshot(&grid, &MeshSnapshot::at_rest(&grid, 0.0, zones)).unwrap();
        assert_eq!(mesh.get_ncases(CaseLayout::Product).unwrap(), 6);
        assert_eq!(mesh.get_ncases(CaseLayout::PerZone).unwrap(), 5);

        // Product case 3: zone 0 takes its case 1, zone 1 its case 1
        let m = mesh.case_materials(CaseLayout::Product, 3).unwrap();
        assert!((m[0].te - 20.0).abs() < 1e-12);
        assert!((m[1].te - 40.0).abs() < 1e-12);
        assert!((m[1].np - 1e21).abs() < 1e6);

        // Per-zone case 3 is zone 1's case 1; zone 0 keeps its hydro state
        let m = mesh.case_materials(CaseLayout::PerZone, 3).unwrap();
        assert!((m[0].te - 1.0).abs() < 1e-12);
        assert!((m[1].te - 40.0).abs() < 1e-12);

        assert!(matches!(
            mesh.case_materials(CaseLayout::Product, 6),
            Err(RadError::IndexOutOfRange { .. })
        ));

        let (_, plain) = brick_mesh([3, 1, 1]);
        assert_eq!(plain.get_ncases(CaseLayout::Product).unwrap(), 1);
        assert_eq!(plain.get_ncases(CaseLayout::PerZone).unwrap(), 3);
    }

    #[test]
    fn test_spherical_mesh() {
        let grid = Grid::spherical_shells(&[1.0, 2.0]).unwrap();
        let snap = MeshSnapshot::at_rest(&grid, 0.0, vec![ZoneRecord::default(); 2]);
        let mesh = Mesh::from_snapshot(&grid, &snap).unwrap();
        assert_eq!(mesh.get_zone(&Vec3::new(0.0, 0.5, 0.0), None, 1e-9), Some(0));
        assert_eq!(mesh.get_zone(&Vec3::new(0.0, 0.0, -1.5), Some(0), 1e-9), Some(1));
        assert_eq!(mesh.get_zone(&Vec3::new(3.0, 0.0, 0.0), Some(1), 1e-9), None);
        let (face, t) = mesh
            .entry(&Vec3::new(-5.0, 0.0, 0.0), &Vec3::unit_x(), None, 1e-9)
            .unwrap();
        assert_eq!(face, FaceId::new(1, 1));
        assert!((t - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_expanding_sphere_motion() {
        let grid = Grid::spherical_shells(&[1.0]).unwrap();
        let mut snap = MeshSnapshot::at_rest(&grid, 0.0, vec![ZoneRecord::default()]);
        snap.velocities = Some(vec![Vec3::zero(), Vec3::new(3.0, 0.0, 0.0)]);
        let mesh = Mesh::from_snapshot(&grid, &snap).unwrap();
        match &mesh.zone(0).unwrap().faces[0].surface {
            Surface::Sphere(s) => assert!((s.expansion - 3.0).abs() < 1e-12),
            other => panic!("unexpected {}", other.kind()),
        }
    }
}
