//! # Materials Module
//!
//! Tabulated opacity and equation-of-state data, and the material state a
//! zone carries into a lookup.
//!
//! ## Layout
//!
//! ```text
//! Database ── hv grid (photon energies, eV)
//!    └── Table per element ── temperature axis (eV)
//!                           ── density axis (particles/cm³)
//!                           ── absorption / emission / scattering spectra
//!                           ── zbar (mean ionization, EOS)
//! ```
//!
//! Lookups between grid points interpolate opacities linearly in log space
//! and EOS quantities linearly. Tables are validated when they are built; a
//! malformed or unsorted grid is a `TableFormat` error.

pub mod database;
pub mod grid_file;
pub mod table;

pub use database::{Database, ZoneOptics};
pub use grid_file::{read_grid_file, GridFile};
pub use table::{AxisGrid, Table};

use serde::{Deserialize, Serialize};

// ============================================================================
// ELEMENTS
// ============================================================================

/// Element identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Chemical symbol, also the table key
    pub symbol: String,
    /// Atomic number Z
    pub z: u32,
    /// Atomic mass A (amu)
    pub a: f64,
}

impl Element {
    pub fn new(symbol: impl Into<String>, z: u32, a: f64) -> Self {
        Self {
            symbol: symbol.into(),
            z,
            a,
        }
    }

    pub fn get_z(&self) -> u32 {
        self.z
    }

    pub fn get_a(&self) -> f64 {
        self.a
    }

    /// Neutron number round(A) - Z
    pub fn get_n(&self) -> i64 {
        self.a.round() as i64 - self.z as i64
    }
}

// ============================================================================
// ZONE MATERIAL STATE
// ============================================================================

/// One component of a zone's mixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialFraction {
    /// Element symbol (table key)
    pub symbol: String,
    /// Number fraction of the total particle density
    pub fraction: f64,
}

/// Thermodynamic state and composition of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMaterial {
    /// Electron temperature (eV)
    pub te: f64,
    /// Radiation temperature (eV)
    pub tr: f64,
    /// Total ion particle density (particles/cm³)
    pub np: f64,
    pub components: Vec<MaterialFraction>,
}

impl ZoneMaterial {
    /// Empty zone; contributes nothing to transport
    pub fn vacuum() -> Self {
        Self {
            te: 0.0,
            tr: 0.0,
            np: 0.0,
            components: Vec::new(),
        }
    }

    /// Pure single-element zone
    pub fn single(symbol: impl Into<String>, te: f64, np: f64) -> Self {
        Self {
            te,
            tr: te,
            np,
            components: vec![MaterialFraction {
                symbol: symbol.into(),
                fraction: 1.0,
            }],
        }
    }

    /// Mixture from (symbol, fraction) pairs
    pub fn mixture(te: f64, tr: f64, np: f64, parts: &[(&str, f64)]) -> Self {
        Self {
            te,
            tr,
            np,
            components: parts
                .iter()
                .map(|(s, f)| MaterialFraction {
                    symbol: (*s).to_string(),
                    fraction: *f,
                })
                .collect(),
        }
    }

    pub fn is_vacuum(&self) -> bool {
        self.components.is_empty() || self.np <= 0.0
    }

    pub fn nmat(&self) -> usize {
        self.components.len()
    }
}

impl Default for ZoneMaterial {
    fn default() -> Self {
        Self::vacuum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_neutrons() {
        let al = Element::new("Al", 13, 26.98);
        assert_eq!(al.get_n(), 14);
        let h = Element::new("H", 1, 1.008);
        assert_eq!(h.get_n(), 0);
    }

    #[test]
    fn test_vacuum() {
        assert!(ZoneMaterial::vacuum().is_vacuum());
        assert!(ZoneMaterial::single("Al", 100.0, 0.0).is_vacuum());
        let m = ZoneMaterial::mixture(50.0, 40.0, 1e21, &[("C", 0.5), ("H", 0.5)]);
        assert!(!m.is_vacuum());
        assert_eq!(m.nmat(), 2);
    }
}
