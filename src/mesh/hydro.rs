//! Time series of hydrodynamic state feeding mesh construction.
//!
//! A hydro source hands out one `MeshSnapshot` per time index: node
//! positions (and optionally velocities) plus the material state of every
//! zone. The mesh layer consumes a snapshot once and keeps nothing from it.

use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::cell::Cell;
use super::grid::Grid;
use crate::error::{RadError, Result};
use crate::materials::ZoneMaterial;
use crate::types::Vec3;

// ============================================================================
// SNAPSHOT DATA
// ============================================================================

/// Material content of one zone at one time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub material: ZoneMaterial,
    /// Analysis cells (may be empty)
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl ZoneRecord {
    pub fn new(material: ZoneMaterial) -> Self {
        Self {
            material,
            cells: Vec::new(),
        }
    }

    pub fn with_cells(mut self, cells: Vec<Cell>) -> Self {
        self.cells = cells;
        self
    }
}

/// Node and zone state for one time index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    /// Simulation time (s)
    pub time: f64,
    /// Node positions, in grid node order
    pub positions: Vec<Vec3>,
    /// Node velocities, if the hydro code writes them
    #[serde(default)]
    pub velocities: Option<Vec<Vec3>>,
    /// Zone state, in grid zone order
    pub zones: Vec<ZoneRecord>,
}

impl MeshSnapshot {
    /// Snapshot at the grid's reference node positions
    pub fn at_rest(grid: &Grid, time: f64, zones: Vec<ZoneRecord>) -> Self {
        Self {
            time,
            positions: grid.positions(),
            velocities: None,
            zones,
        }
    }

    /// Snapshot with every node displaced by `velocity·time` (uniform drift)
    pub fn drifting(grid: &Grid, time: f64, velocity: Vec3, zones: Vec<ZoneRecord>) -> Self {
        Self {
            time,
            positions: grid.positions().into_iter().map(|p| p + velocity * time).collect(),
            velocities: Some(vec![velocity; grid.nnodes()]),
            zones,
        }
    }
}

// ============================================================================
// HYDRO SOURCE
// ============================================================================

/// Source of per-time-step mesh state
pub trait Hydro {
    /// Number of stored time steps
    fn ntimes(&self) -> usize;

    /// Simulation time of step `index`
    fn time_at(&self, index: usize) -> Result<f64>;

    /// Time-step length following step `index` (the preceding one at the last step)
    fn dt_at(&self, index: usize) -> Result<f64> {
        let n = self.ntimes();
        if index >= n {
            return Err(RadError::out_of_range("time step", index, n));
        }
        if n < 2 {
            return Ok(0.0);
        }
        if index + 1 < n {
            Ok(self.time_at(index + 1)? - self.time_at(index)?)
        } else {
            Ok(self.time_at(index)? - self.time_at(index - 1)?)
        }
    }

    fn get_nzones(&self) -> usize;

    /// Spatial dimensionality of the hydro problem
    fn get_ndim(&self) -> usize;

    /// Node and zone state at step `index`
    fn load_at(&self, index: usize) -> Result<MeshSnapshot>;
}

/// In-memory hydro time series
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HydroSeries {
    ndim: usize,
    nzones: usize,
    snapshots: Vec<MeshSnapshot>,
}

impl HydroSeries {
    pub fn new(ndim: usize, nzones: usize) -> Self {
        Self {
            ndim,
            nzones,
            snapshots: Vec::new(),
        }
    }

    /// Empty series sized for `grid`
    pub fn for_grid(grid: &Grid) -> Self {
        Self::new(grid.ndim(), grid.nzones())
    }

    /// Append a snapshot; zone count must match and times must increase
    pub fn push(&mut self, snapshot: MeshSnapshot) -> Result<()> {
        if snapshot.zones.len() != self.nzones {
            return Err(RadError::mesh(
                snapshot.zones.len().min(self.nzones),
                None,
                format!(
                    "snapshot has {} zones, series has {}",
                    snapshot.zones.len(),
                    self.nzones
                ),
            ));
        }
        if let Some(last) = self.snapshots.last() {
            if snapshot.time <= last.time {
                return Err(RadError::config(format!(
                    "snapshot time {} does not follow {}",
                    snapshot.time, last.time
                )));
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn with_snapshot(mut self, snapshot: MeshSnapshot) -> Result<Self> {
        self.push(snapshot)?;
        Ok(self)
    }

    /// Load a series from JSON (`{"ndim", "nzones", "snapshots": [...]}`)
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: HydroSeries = serde_json::from_reader(reader)?;
        let mut series = Self::new(raw.ndim, raw.nzones);
        for snapshot in raw.snapshots {
            series.push(snapshot)?;
        }
        info!(ntimes = series.ntimes(), nzones = series.nzones, "hydro series loaded");
        Ok(series)
    }

    fn snapshot(&self, index: usize) -> Result<&MeshSnapshot> {
        self.snapshots
            .get(index)
            .ok_or_else(|| RadError::out_of_range("time step", index, self.snapshots.len()))
    }
}

impl Hydro for HydroSeries {
    fn ntimes(&self) -> usize {
        self.snapshots.len()
    }

    fn time_at(&self, index: usize) -> Result<f64> {
        Ok(self.snapshot(index)?.time)
    }

    fn get_nzones(&self) -> usize {
        self.nzones
    }

    fn get_ndim(&self) -> usize {
        self.ndim
    }

    fn load_at(&self, index: usize) -> Result<MeshSnapshot> {
        Ok(self.snapshot(index)?.clone())
    }
}
