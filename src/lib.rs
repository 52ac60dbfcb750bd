//! # RADSYNTH-RS
//!
//! Synthetic radiography through time-dependent hydrodynamic meshes, and
//! fitting of the synthetic signals against goal data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              RADSYNTH-RS                                    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  LEVEL 1: GEOMETRY   Vec3, Surface {Polygon, Cone, Sphere}, ray hits        │
//! │  LEVEL 2: MESH       Grid topology + Hydro snapshots → Mesh of Zones        │
//! │  LEVEL 3: MATERIALS  per-element opacity/EOS tables, Database               │
//! │  LEVEL 4: TRANSPORT  Ray walks zones, formal solution per photon bin        │
//! │  LEVEL 5: DETECTOR   patch grid → one ray per patch → Image                 │
//! │  LEVEL 6: FITTING    Objective / Goal scored under a scale, ScaleSearch     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Units: cm, eV, particles/cm³, W/cm²/sr/eV.
//!
//! ## Example
//!
//! ```no_run
//! use radsynth_rs::config::RunConfig;
//!
//! let report = radsynth_rs::simulator::run(&RunConfig::default())?;
//! println!("best scale {}", report.search.best_scale);
//! # Ok::<(), radsynth_rs::RadError>(())
//! ```

pub mod constants;
pub mod types;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod materials;
pub mod transport;
pub mod detector;
pub mod optimizer;
pub mod config;
pub mod telemetry;
pub mod simulator;

// Re-exports
pub use constants::*;
pub use types::*;
pub use error::{RadError, Result};
pub use geometry::{Hit, Hits, Surface};
pub use mesh::{CaseLayout, Cell, FaceId, Grid, HydroSeries, Mesh, NextFace, Zone};
pub use materials::{Database, Element, Table, ZoneMaterial};
pub use transport::{Backlighter, Crossing, MeshOptics, Ray, RayState};
pub use detector::{Detector, Image, Projection};
pub use optimizer::{FitMetric, Goal, Objective, ScaleSearch, SearchResult, Series};
pub use config::{AnalysisConfig, CaseScale, RunConfig, TraceConfig, Tolerance};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-line description for banners and logs
pub fn info() -> String {
    format!(
        "RADSYNTH-RS v{}\n\
         Synthetic radiography and goal fitting on hydrodynamic meshes",
        VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        let info = info();
        assert!(info.contains("RADSYNTH-RS"));
        assert!(info.contains(VERSION));
    }
}
