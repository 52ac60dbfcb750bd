//! # Ray Transport Module
//!
//! Walks a ray through the zones of one mesh snapshot and integrates the
//! formal solution of the transfer equation along the way.
//!
//! ## Intensity update
//!
//! Across a zone chord of length Δs, in every photon bin:
//!
//! ```text
//! τ  = (κa + κs)·Δs
//! I' = I·e^-τ + S
//! S  = j·Δs                   τ < 2e-10 (optically thin)
//! S  = (1 - e^-τ)·j/(κa + κs)  otherwise
//! ```
//!
//! ## States
//!
//! ```text
//! Unstarted ──trace──▶ Traversing ──▶ Escaped   left the mesh for good
//!                                  ├─▶ Complete  reached its maximum path
//!                                  └─▶ Absorbed  optical depth ceiling hit
//! ```
//!
//! A ray that leaves a concave mesh looks ahead for another boundary face
//! before declaring itself escaped. Mesh and material data are only read,
//! so independent rays may be traced concurrently.

pub mod spectrum;

pub use spectrum::{broaden_fwhm, integrate, planckian, Backlighter};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TraceConfig;
use crate::constants::{SMALL, THIN_OPTICAL_DEPTH};
use crate::error::{RadError, Result};
use crate::materials::{Database, ZoneMaterial, ZoneOptics};
use crate::mesh::{CaseLayout, FaceId, Mesh, NextFace};
use crate::types::Vec3;

// ============================================================================
// PER-ZONE OPTICS
// ============================================================================

/// Transport coefficients of every zone of one mesh, on one photon grid
#[derive(Debug, Clone)]
pub struct MeshOptics {
    hv: Vec<f64>,
    zones: Vec<ZoneOptics>,
}

impl MeshOptics {
    /// Look up every zone's material in the database
    pub fn build(mesh: &Mesh, db: &Database) -> Result<Self> {
        let zones = mesh
            .zones()
            .par_iter()
            .map(|z| db.zone_optics(&z.material))
            .collect::<Result<Vec<_>>>()?;
        debug!(zones = zones.len(), nhv = db.get_nhv(), "zone optics computed");
        Ok(Self {
            hv: db.hv().to_vec(),
            zones,
        })
    }

    /// Look up explicit zone materials, one per zone
    pub fn from_materials(db: &Database, materials: &[ZoneMaterial]) -> Result<Self> {
        let zones = materials
            .par_iter()
            .map(|m| db.zone_optics(m))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            hv: db.hv().to_vec(),
            zones,
        })
    }

    /// Optics of analysis case `case` of `mesh`
    pub fn for_case(mesh: &Mesh, db: &Database, layout: CaseLayout, case: usize) -> Result<Self> {
        let materials = mesh.case_materials(layout, case)?;
        Self::from_materials(db, &materials)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Coefficients supplied directly, one entry per zone
    pub fn from_zones(hv: Vec<f64>, zones: Vec<ZoneOptics>) -> Result<Self> {
        if let Some((i, z)) = zones.iter().enumerate().find(|(_, z)| z.nhv() != hv.len()) {
            return Err(RadError::config(format!(
                "zone {} optics have {} bins, photon grid has {}",
                i,
                z.nhv(),
                hv.len()
            )));
        }
        Ok(Self { hv, zones })
    }

    pub fn hv(&self) -> &[f64] {
        &self.hv
    }

    pub fn nhv(&self) -> usize {
        self.hv.len()
    }

    pub fn zone(&self, id: usize) -> Result<&ZoneOptics> {
        self.zones
            .get(id)
            .ok_or_else(|| RadError::out_of_range("zone optics", id, self.zones.len()))
    }
}

// ============================================================================
// RAY
// ============================================================================

/// Life cycle of a ray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RayState {
    Unstarted,
    Traversing,
    /// Stopped at its maximum path length
    Complete,
    /// Left the mesh
    Escaped,
    /// Accumulated optical depth exceeded the ceiling
    Absorbed,
}

impl RayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RayState::Complete | RayState::Escaped | RayState::Absorbed)
    }
}

/// One zone crossing
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub zone: usize,
    /// Face the ray came in through; `None` if it started inside the zone
    pub entry_face: Option<usize>,
    /// Face the ray left through; `None` if it stopped inside the zone
    pub exit_face: Option<usize>,
    pub entry: Vec3,
    pub exit: Vec3,
    /// Chord length (cm)
    pub length: f64,
    /// Smallest optical depth over the photon bins
    pub optical_depth: f64,
    /// Intensity after the crossing, when recording is enabled
    pub spectrum: Option<Vec<f64>>,
}

/// Ordered record of the crossings of one trace
pub type RayStack = Vec<Crossing>;

/// Directed line carrying an intensity spectrum through the mesh
#[derive(Debug, Clone)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
    max_path: f64,
    state: RayState,
    position: Vec3,
    path_length: f64,
    optical_depth: f64,
    spectrum: Vec<f64>,
    stack: RayStack,
}

impl Ray {
    /// Ray from `origin` along `direction` (normalized here) carrying `spectrum`
    pub fn new(origin: Vec3, direction: Vec3, spectrum: Vec<f64>) -> Result<Self> {
        let direction = direction.normalize();
        if direction.is_zero() {
            return Err(RadError::degenerate("ray direction has zero length"));
        }
        Ok(Self {
            origin,
            direction,
            max_path: f64::INFINITY,
            state: RayState::Unstarted,
            position: origin,
            path_length: 0.0,
            optical_depth: 0.0,
            spectrum,
            stack: Vec::new(),
        })
    }

    /// Stop once this distance from the origin is reached
    pub fn with_max_path(mut self, max_path: f64) -> Self {
        self.max_path = max_path;
        self
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn state(&self) -> RayState {
        self.state
    }

    pub fn stack(&self) -> &RayStack {
        &self.stack
    }

    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    pub fn into_spectrum(self) -> Vec<f64> {
        self.spectrum
    }

    /// Accumulated optical depth (sum of per-crossing minima)
    pub fn optical_depth(&self) -> f64 {
        self.optical_depth
    }

    /// Distance travelled from the origin, including gaps outside the mesh
    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    /// Current position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Trace through `mesh` to a terminal state
    ///
    /// A ray starting inside the mesh begins in its containing zone; one
    /// starting outside enters through the nearest boundary face ahead of
    /// it. Returns `RayTraversal` if the walk loops or a zone has no exit.
    pub fn trace(&mut self, mesh: &Mesh, optics: &MeshOptics, cfg: &TraceConfig) -> Result<RayState> {
        if self.state != RayState::Unstarted {
            return Err(RadError::config("ray has already been traced"));
        }
        if self.spectrum.len() != optics.nhv() {
            return Err(RadError::config(format!(
                "ray carries {} photon bins, optics have {}",
                self.spectrum.len(),
                optics.nhv()
            )));
        }
        let tol = cfg.tolerance.geometric;
        self.state = RayState::Traversing;

        let (mut zone, mut entry_face, start) = match mesh.get_zone(&self.origin, None, tol) {
            Some(z) => (z, None, 0.0),
            None => match mesh.entry(&self.origin, &self.direction, None, tol) {
                Some((face, t)) => (face.zone, Some(face.face), t),
                None => {
                    self.state = RayState::Escaped;
                    return Ok(self.state);
                }
            },
        };
        if !self.advance_gap(start) {
            return Ok(self.state);
        }

        loop {
            if self.stack.len() >= cfg.max_crossings {
                return Err(RadError::traversal(
                    zone,
                    entry_face,
                    format!("more than {} zone crossings", cfg.max_crossings),
                ));
            }
            let exit = mesh
                .zone(zone)?
                .exit(&self.position, &self.direction, entry_face, tol)
                .ok_or_else(|| RadError::traversal(zone, entry_face, "no exit face ahead of the ray"))?;

            let remaining = self.max_path - self.path_length;
            let truncated = exit.t >= remaining;
            let length = if truncated { remaining.max(0.0) } else { exit.t };
            let exit_point = if truncated {
                self.position + self.direction * length
            } else {
                exit.point
            };

            let depth = self.transport(optics.zone(zone)?, length);
            self.optical_depth += depth;
            self.path_length += length;
            self.stack.push(Crossing {
                zone,
                entry_face,
                exit_face: (!truncated).then_some(exit.face),
                entry: self.position,
                exit: exit_point,
                length,
                optical_depth: depth,
                spectrum: cfg.record_spectra.then(|| self.spectrum.clone()),
            });
            self.position = exit_point;

            if self.optical_depth > cfg.max_optical_depth {
                for y in self.spectrum.iter_mut().filter(|y| !y.is_finite()) {
                    *y = 0.0;
                }
                self.state = RayState::Absorbed;
                break;
            }
            if truncated {
                self.state = RayState::Complete;
                break;
            }

            let exit_id = FaceId::new(zone, exit.face);
            match mesh.next_face(exit_id, &exit_point, tol)? {
                NextFace::Zone(next) => {
                    if next.zone == zone && Some(next.face) == entry_face {
                        return Err(RadError::traversal(
                            zone,
                            entry_face,
                            "ray re-entered the zone through the face it just crossed",
                        ));
                    }
                    if self.is_bouncing(next, tol) {
                        return Err(RadError::traversal(
                            next.zone,
                            Some(next.face),
                            format!("ray oscillates across {} without advancing", exit_id),
                        ));
                    }
                    zone = next.zone;
                    entry_face = Some(next.face);
                }
                NextFace::Exterior => match mesh.entry(&exit_point, &self.direction, Some(exit_id), tol) {
                    Some((face, t)) => {
                        if !self.advance_gap(t) {
                            break;
                        }
                        zone = face.zone;
                        entry_face = Some(face.face);
                    }
                    None => {
                        self.state = RayState::Escaped;
                        break;
                    }
                },
            }
        }
        Ok(self.state)
    }

    /// Move through empty space; false (and `Complete`) if the maximum path ends first
    fn advance_gap(&mut self, t: f64) -> bool {
        let remaining = self.max_path - self.path_length;
        if t >= remaining {
            self.position = self.position + self.direction * remaining.max(0.0);
            self.path_length = self.max_path;
            self.state = RayState::Complete;
            return false;
        }
        self.position = self.position + self.direction * t;
        self.path_length += t;
        true
    }

    /// Two zero-length crossings in a row, about to repeat the earlier one
    fn is_bouncing(&self, next: FaceId, tol: f64) -> bool {
        let n = self.stack.len();
        if n < 2 {
            return false;
        }
        let (a, b) = (&self.stack[n - 2], &self.stack[n - 1]);
        a.zone == next.zone && a.entry_face == Some(next.face) && a.length <= tol && b.length <= tol
    }

    /// Update the spectrum across a chord of length `ct`; returns the
    /// smallest optical depth over the bins
    fn transport(&mut self, optics: &ZoneOptics, ct: f64) -> f64 {
        if ct <= SMALL || self.spectrum.is_empty() {
            return 0.0;
        }
        let mut min_depth = f64::INFINITY;
        for (i, y) in self.spectrum.iter_mut().enumerate() {
            let op = optics.absorption[i] + optics.scattering[i];
            let em = optics.emission[i];
            let tau = op * ct;
            let tr = (-tau).exp();
            let se = if tau < THIN_OPTICAL_DEPTH {
                em * ct
            } else {
                (1.0 - tr) * em / op
            };
            *y = *y * tr + se;
            min_depth = min_depth.min(tau);
        }
        min_depth
    }
}
