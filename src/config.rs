//! # Configuration
//!
//! Tracing parameters are passed by value into every tracing call; nothing
//! is read from global state. `RunConfig` describes one run of the
//! `radsynth` binary and is read from JSON with every field optional.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_GEOMETRIC_TOLERANCE, DEFAULT_MAX_CROSSINGS, DEFAULT_MAX_OPTICAL_DEPTH,
    DEFAULT_PARALLEL_TOLERANCE,
};
use crate::error::{RadError, Result};
use crate::mesh::{CaseLayout, SearchAxis};
use crate::optimizer::ScaleSearch;

// ============================================================================
// TRACE CONFIGURATION
// ============================================================================

/// Geometric tolerances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Containment and intersection slack (cm)
    pub geometric: f64,
    /// Below this |u| a direction is treated as degenerate
    pub parallel: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            geometric: DEFAULT_GEOMETRIC_TOLERANCE,
            parallel: DEFAULT_PARALLEL_TOLERANCE,
        }
    }
}

/// Ray tracing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub tolerance: Tolerance,
    /// Accumulated optical depth at which a ray is declared absorbed
    pub max_optical_depth: f64,
    /// Hard cap on zone crossings per ray
    pub max_crossings: usize,
    /// Keep the intensity spectrum after every crossing
    pub record_spectra: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            max_optical_depth: DEFAULT_MAX_OPTICAL_DEPTH,
            max_crossings: DEFAULT_MAX_CROSSINGS,
            record_spectra: false,
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        let t = &self.tolerance;
        if !(t.geometric > 0.0 && t.geometric.is_finite()) {
            return Err(RadError::config(format!("geometric tolerance must be positive, got {}", t.geometric)));
        }
        if !(t.parallel > 0.0 && t.parallel.is_finite()) {
            return Err(RadError::config(format!("parallel tolerance must be positive, got {}", t.parallel)));
        }
        if !(self.max_optical_depth > 0.0) {
            return Err(RadError::config(format!(
                "max_optical_depth must be positive, got {}",
                self.max_optical_depth
            )));
        }
        if self.max_crossings == 0 {
            return Err(RadError::config("max_crossings must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// CASE ANALYSIS
// ============================================================================

/// Scale each analysis case is scored at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseScale {
    Fixed(f64),
    /// Closed-form least-squares scale of the case
    ClosedForm,
}

/// Sweep over the analysis cases of every zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub layout: CaseLayout,
    /// Electron temperature grid (eV); the run temperature when unset
    pub temperature: Option<SearchAxis>,
    /// Particle density grid; half to twice the run density when unset
    pub density: Option<SearchAxis>,
    pub scale: CaseScale,
    /// Refuse sweeps with more cases than this
    pub max_cases: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            layout: CaseLayout::PerZone,
            temperature: None,
            density: None,
            scale: CaseScale::ClosedForm,
            max_cases: 4096,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_cases == 0 {
            return Err(RadError::config("max_cases must be at least 1"));
        }
        if let CaseScale::Fixed(s) = self.scale {
            if !(s > 0.0 && s.is_finite()) {
                return Err(RadError::config(format!("fixed case scale must be positive, got {}", s)));
            }
        }
        for axis in self.temperature.iter().chain(&self.density) {
            if axis.count == 0 {
                return Err(RadError::config("analysis axis needs at least one point"));
            }
            axis.values()?;
        }
        Ok(())
    }
}

// ============================================================================
// RUN CONFIGURATION
// ============================================================================

/// Parameters of one demonstration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Zones per axis of the brick target
    pub zones: [usize; 3],
    /// Target extent (cm)
    pub size: [f64; 3],
    /// Target element symbol
    pub element: String,
    /// Atomic number and mass of `element`
    pub z: u32,
    pub a: f64,
    /// Target temperature (eV)
    pub temperature: f64,
    /// Target particle density (particles/cm³)
    pub density: f64,
    /// Absorption cross-section per particle (cm²)
    pub cross_section: f64,
    /// Photon energy grid (eV)
    pub photon_energies: Vec<f64>,
    /// Backlighter color temperature (eV)
    pub backlighter_temperature: f64,
    /// Detector patches per axis
    pub pixels: [usize; 2],
    /// Distance from the detector plane back to the source plane (cm)
    pub standoff: f64,
    /// Instrument spectral resolution (eV), none for ideal
    pub fwhm: Option<f64>,
    /// Calibration factor applied to the synthetic goal
    pub goal_scale: f64,
    pub search: ScaleSearch,
    pub trace: TraceConfig,
    /// Worker threads, 0 for the rayon default
    pub threads: usize,
    /// Optional sweep over per-zone analysis cases
    pub analysis: Option<AnalysisConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            zones: [8, 8, 4],
            size: [0.1, 0.1, 0.05],
            element: "Al".to_string(),
            z: 13,
            a: 26.98,
            temperature: 100.0,
            density: 6.0e22,
            cross_section: 1.0e-22,
            photon_energies: vec![1000.0, 1500.0, 2000.0, 2500.0, 3000.0],
            backlighter_temperature: 500.0,
            pixels: [32, 32],
            standoff: 1.0,
            fwhm: None,
            goal_scale: 2.0,
            search: ScaleSearch::default(),
            trace: TraceConfig::default(),
            threads: 0,
            analysis: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let config: RunConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.zones.iter().any(|&n| n == 0) {
            return Err(RadError::config("every axis needs at least one zone"));
        }
        if self.size.iter().any(|&s| !(s > 0.0)) {
            return Err(RadError::config("target size must be positive"));
        }
        if self.pixels.iter().any(|&n| n == 0) {
            return Err(RadError::config("detector needs at least one patch per axis"));
        }
        if self.photon_energies.is_empty() {
            return Err(RadError::config("photon energy grid is empty"));
        }
        if !(self.standoff > 0.0) {
            return Err(RadError::config("standoff must be positive"));
        }
        if !(self.goal_scale > 0.0) {
            return Err(RadError::config("goal_scale must be positive"));
        }
        if let Some(w) = self.fwhm {
            if !(w > 0.0) {
                return Err(RadError::config(format!("fwhm must be positive, got {}", w)));
            }
        }
        if let Some(analysis) = &self.analysis {
            analysis.validate()?;
        }
        self.search.validate()?;
        self.trace.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TraceConfig::default().validate().is_ok());
        assert!(RunConfig::default().validate().is_ok());
        assert_eq!(TraceConfig::default().tolerance.geometric, 1e-9);
        assert_eq!(TraceConfig::default().tolerance.parallel, 1e-12);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "pixels": [4, 2], "trace": { "max_optical_depth": 20.0 } }"#;
        let cfg = RunConfig::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(cfg.pixels, [4, 2]);
        assert_eq!(cfg.trace.max_optical_depth, 20.0);
        assert_eq!(cfg.trace.max_crossings, DEFAULT_MAX_CROSSINGS);
        assert_eq!(cfg.element, "Al");
        assert!(cfg.analysis.is_none());
    }

    #[test]
    fn test_analysis_section() {
        let json = r#"{ "analysis": { "layout": "product", "scale": { "fixed": 1.0 } } }"#;
        let cfg = RunConfig::from_json_reader(json.as_bytes()).unwrap();
        let analysis = cfg.analysis.unwrap();
        assert_eq!(analysis.layout, CaseLayout::Product);
        assert_eq!(analysis.scale, CaseScale::Fixed(1.0));
        assert_eq!(analysis.max_cases, 4096);

        let json = r#"{ "analysis": { "scale": { "fixed": -2.0 } } }"#;
        assert!(matches!(
            RunConfig::from_json_reader(json.as_bytes()),
            Err(RadError::Config { .. })
        ));
        let json = r#"{ "analysis": { "max_cases": 0 } }"#;
        assert!(RunConfig::from_json_reader(json.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let json = r#"{ "trace": { "tolerance": { "geometric": -1.0 } } }"#;
        assert!(matches!(
            RunConfig::from_json_reader(json.as_bytes()),
            Err(RadError::Config { .. })
        ));
        let json = r#"{ "zones": [0, 1, 1] }"#;
        assert!(RunConfig::from_json_reader(json.as_bytes()).is_err());
        assert!(matches!(
            RunConfig::from_json_reader("{ not json".as_bytes()),
            Err(RadError::Json(_))
        ));
    }
}
