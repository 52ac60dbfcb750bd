//! # Numerical and Physical Constants
//!
//! Units follow the radiation-hydrodynamics convention used throughout the
//! crate: lengths in cm, temperatures and photon energies in eV, number
//! densities in particles/cm³, specific intensities in W/cm²/sr/eV.

use std::f64::consts::PI;

// ============================================================================
// NUMERICAL SENTINELS
// ============================================================================

/// Magnitudes below this are treated as zero
pub const SMALL: f64 = 1.0e-100;

/// Returned by angle queries that have no answer (zero-length input)
pub const BIG: f64 = 1.0e100;

/// Returned by `Vec3::cos_angle` for zero-length input; outside [-1, 1]
pub const COS_UNDEFINED: f64 = -4.0;

/// Fitness reported when a fit cannot be evaluated (empty or mismatched series)
pub const UNDEFINED_FITNESS: f64 = 1.0e300;

// ============================================================================
// GEOMETRIC TOLERANCES (defaults)
// ============================================================================

/// Default containment / intersection tolerance (cm)
pub const DEFAULT_GEOMETRIC_TOLERANCE: f64 = 1.0e-9;

/// Default threshold on |u·n| below which a ray is parallel to a plane
pub const DEFAULT_PARALLEL_TOLERANCE: f64 = 1.0e-12;

// ============================================================================
// RADIATION TRANSPORT
// ============================================================================

/// Optical depth below which the optically thin emission formula is used
pub const THIN_OPTICAL_DEPTH: f64 = 2.0e-10;

/// Default optical-depth ceiling beyond which a ray is absorbed
pub const DEFAULT_MAX_OPTICAL_DEPTH: f64 = 100.0;

/// Default cap on zone crossings per ray
pub const DEFAULT_MAX_CROSSINGS: usize = 1_000_000;

/// Planck prefactor 2/(h²c²) for hv in eV and intensity in W/cm²/sr/eV
pub const PLANCK_PREFACTOR: f64 = 5040.367;

/// Full solid angle (sr)
pub const FOUR_PI: f64 = 4.0 * PI;

/// Ratio between a Gaussian's FWHM and its standard deviation
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

// ============================================================================
// SEARCH DEFAULTS
// ============================================================================

/// Default number of grid points in a scale sweep
pub const DEFAULT_SCALE_GRID_POINTS: usize = 41;

/// Default number of random refinement rounds after the sweep
pub const DEFAULT_REFINE_ROUNDS: usize = 6;

/// Default random samples per refinement round
pub const DEFAULT_REFINE_SAMPLES: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_ordering() {
        assert!(SMALL < DEFAULT_PARALLEL_TOLERANCE);
        assert!(DEFAULT_PARALLEL_TOLERANCE < DEFAULT_GEOMETRIC_TOLERANCE);
        assert!(BIG < UNDEFINED_FITNESS);
        assert!(COS_UNDEFINED < -1.0);
    }

    #[test]
    fn test_fwhm_ratio() {
        let expected = 2.0 * (2.0 * 2.0_f64.ln()).sqrt();
        assert!((FWHM_PER_SIGMA - expected).abs() < 1e-12);
    }
}
