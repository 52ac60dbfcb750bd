//! Nodes and the topological template shared by every time step of one
//! mesh geometry.
//!
//! A `Grid` knows which nodes bound which faces and which faces are
//! glued together. Positions in the grid are only reference positions;
//! each time step supplies its own through a `MeshSnapshot`.

use serde::{Deserialize, Serialize};

use super::FaceId;
use crate::error::{RadError, Result};
use crate::types::Vec3;

// ============================================================================
// NODES
// ============================================================================

/// Mesh node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Index within the grid
    pub id: usize,
    /// Position (cm)
    pub position: Vec3,
    /// Velocity (cm/s)
    pub velocity: Vec3,
}

impl Node {
    pub fn new(id: usize, position: Vec3) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::zero(),
        }
    }
}

// ============================================================================
// TOPOLOGY TEMPLATE
// ============================================================================

/// Shape of a face, in terms of grid nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeTemplate {
    /// Planar loop of nodes
    Polygon { nodes: Vec<usize> },
    /// RZ frustum between two nodes of the φ = 0 half-plane
    Cone { nodes: [usize; 2] },
    /// Sphere through `surface` centered on `center`; `inner` flips the normal
    Sphere {
        center: usize,
        surface: usize,
        inner: bool,
    },
}

impl ShapeTemplate {
    /// Every node id referenced by the shape
    pub fn node_ids(&self) -> Vec<usize> {
        match self {
            ShapeTemplate::Polygon { nodes } => nodes.clone(),
            ShapeTemplate::Cone { nodes } => nodes.to_vec(),
            ShapeTemplate::Sphere { center, surface, .. } => vec![*center, *surface],
        }
    }
}

/// One face of a zone template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceTemplate {
    pub shape: ShapeTemplate,
    /// Faces of other zones glued to this one
    pub neighbors: Vec<FaceId>,
    /// True if this face lies on the outer boundary of the mesh
    pub boundary: bool,
}

impl FaceTemplate {
    pub fn interior(shape: ShapeTemplate, neighbor: FaceId) -> Self {
        Self {
            shape,
            neighbors: vec![neighbor],
            boundary: false,
        }
    }

    pub fn exterior(shape: ShapeTemplate) -> Self {
        Self {
            shape,
            neighbors: Vec::new(),
            boundary: true,
        }
    }
}

/// Faces of one zone
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneTemplate {
    pub faces: Vec<FaceTemplate>,
}

// ============================================================================
// GRID
// ============================================================================

/// Nodes plus the zone/face topology of one mesh geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    nodes: Vec<Node>,
    zones: Vec<ZoneTemplate>,
    /// Spatial dimensionality of the underlying hydro problem (1, 2 or 3)
    ndim: usize,
}

impl Grid {
    /// Build and validate a grid
    pub fn new(nodes: Vec<Node>, zones: Vec<ZoneTemplate>, ndim: usize) -> Result<Self> {
        let grid = Self { nodes, zones, ndim };
        grid.validate()?;
        Ok(grid)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| RadError::out_of_range("node", id, self.nodes.len()))
    }

    pub fn zones(&self) -> &[ZoneTemplate] {
        &self.zones
    }

    pub fn nnodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nzones(&self) -> usize {
        self.zones.len()
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Reference node positions, in id order
    pub fn positions(&self) -> Vec<Vec3> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Check node references and face gluing
    ///
    /// Every non-boundary face must have at least one neighbor, every
    /// neighbor must exist and must list this face back, and boundary faces
    /// carry no neighbors.
    pub fn validate(&self) -> Result<()> {
        let nnodes = self.nodes.len();
        for (z, zone) in self.zones.iter().enumerate() {
            if zone.faces.is_empty() {
                return Err(RadError::mesh(z, None, "zone has no faces"));
            }
            for (f, face) in zone.faces.iter().enumerate() {
                if let Some(bad) = face.shape.node_ids().into_iter().find(|&n| n >= nnodes) {
                    return Err(RadError::mesh(
                        z,
                        Some(f),
                        format!("node {} out of range ({} nodes)", bad, nnodes),
                    ));
                }
                if face.boundary {
                    if !face.neighbors.is_empty() {
                        return Err(RadError::mesh(z, Some(f), "boundary face lists neighbors"));
                    }
                    continue;
                }
                if face.neighbors.is_empty() {
                    return Err(RadError::mesh(z, Some(f), "interior face has no neighbor zone"));
                }
                let me = FaceId::new(z, f);
                for nb in &face.neighbors {
                    if nb.zone == z {
                        return Err(RadError::mesh(z, Some(f), "face glued to its own zone"));
                    }
                    let other = self
                        .zones
                        .get(nb.zone)
                        .and_then(|zt| zt.faces.get(nb.face))
                        .ok_or_else(|| {
                            RadError::mesh(z, Some(f), format!("neighbor {} does not exist", nb))
                        })?;
                    if !other.neighbors.contains(&me) {
                        return Err(RadError::mesh(
                            z,
                            Some(f),
                            format!("neighbor {} does not list this face back", nb),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // TEST PROBLEMS
    // ========================================================================

    /// Structured block of `n[0] × n[1] × n[2]` hexahedral zones spanning `lo`..`hi`
    ///
    /// Zone (i, j, k) has id `i + nx·(j + ny·k)`; its faces are
    /// -x, +x, -y, +y, -z, +z in that order.
    pub fn brick(n: [usize; 3], lo: Vec3, hi: Vec3) -> Result<Self> {
        let [nx, ny, nz] = n;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(RadError::config("brick needs at least one zone per axis"));
        }
        if hi.x <= lo.x || hi.y <= lo.y || hi.z <= lo.z {
            return Err(RadError::config("brick upper corner must exceed the lower corner"));
        }
        let node_id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let zone_id = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

        let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    let p = Vec3::new(
                        lo.x + (hi.x - lo.x) * i as f64 / nx as f64,
                        lo.y + (hi.y - lo.y) * j as f64 / ny as f64,
                        lo.z + (hi.z - lo.z) * k as f64 / nz as f64,
                    );
                    nodes.push(Node::new(node_id(i, j, k), p));
                }
            }
        }

        let mut zones = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let quad = |a, b, c, d| ShapeTemplate::Polygon { nodes: vec![a, b, c, d] };
                    let glue = |shape, neighbor: Option<usize>, face: usize| match neighbor {
                        Some(zone) => FaceTemplate::interior(shape, FaceId::new(zone, face)),
                        None => FaceTemplate::exterior(shape),
                    };
                    let faces = vec![
                        glue(
                            quad(node_id(i, j, k), node_id(i, j + 1, k), node_id(i, j + 1, k + 1), node_id(i, j, k + 1)),
                            (i > 0).then(|| zone_id(i - 1, j, k)),
                            1,
                        ),
                        glue(
                            quad(node_id(i + 1, j, k), node_id(i + 1, j + 1, k), node_id(i + 1, j + 1, k + 1), node_id(i + 1, j, k + 1)),
                            (i + 1 < nx).then(|| zone_id(i + 1, j, k)),
                            0,
                        ),
                        glue(
                            quad(node_id(i, j, k), node_id(i + 1, j, k), node_id(i + 1, j, k + 1), node_id(i, j, k + 1)),
                            (j > 0).then(|| zone_id(i, j - 1, k)),
                            3,
                        ),
                        glue(
                            quad(node_id(i, j + 1, k), node_id(i + 1, j + 1, k), node_id(i + 1, j + 1, k + 1), node_id(i, j + 1, k + 1)),
                            (j + 1 < ny).then(|| zone_id(i, j + 1, k)),
                            2,
                        ),
                        glue(
                            quad(node_id(i, j, k), node_id(i + 1, j, k), node_id(i + 1, j + 1, k), node_id(i, j + 1, k)),
                            (k > 0).then(|| zone_id(i, j, k - 1)),
                            5,
                        ),
                        glue(
                            quad(node_id(i, j, k + 1), node_id(i + 1, j, k + 1), node_id(i + 1, j + 1, k + 1), node_id(i, j + 1, k + 1)),
                            (k + 1 < nz).then(|| zone_id(i, j, k + 1)),
                            4,
                        ),
                    ];
                    zones.push(ZoneTemplate { faces });
                }
            }
        }
        Self::new(nodes, zones, 3)
    }

    /// Concentric spherical zones about the origin with the given outer radii
    ///
    /// Zone 0 is the central ball (one face); zone k > 0 is the shell between
    /// `radii[k-1]` (face 0, inner surface) and `radii[k]` (face 1).
    pub fn spherical_shells(radii: &[f64]) -> Result<Self> {
        if radii.is_empty() {
            return Err(RadError::config("spherical grid needs at least one radius"));
        }
        if radii[0] <= 0.0 || radii.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RadError::config("shell radii must be positive and increasing"));
        }
        let mut nodes = vec![Node::new(0, Vec3::zero())];
        for (k, r) in radii.iter().enumerate() {
            nodes.push(Node::new(k + 1, Vec3::new(*r, 0.0, 0.0)));
        }
        let nz = radii.len();
        let outer_face = |k: usize| if k == 0 { 0 } else { 1 };
        let mut zones = Vec::with_capacity(nz);
        for k in 0..nz {
            let mut faces = Vec::new();
            if k > 0 {
                faces.push(FaceTemplate::interior(
                    ShapeTemplate::Sphere { center: 0, surface: k, inner: true },
                    FaceId::new(k - 1, outer_face(k - 1)),
                ));
            }
            let outer = ShapeTemplate::Sphere { center: 0, surface: k + 1, inner: false };
            faces.push(if k + 1 < nz {
                FaceTemplate::interior(outer, FaceId::new(k + 1, 0))
            } else {
                FaceTemplate::exterior(outer)
            });
            zones.push(ZoneTemplate { faces });
        }
        Self::new(nodes, zones, 1)
    }
}
