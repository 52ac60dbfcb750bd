//! Analysis cells: the search space of thermodynamic states a zone may be
//! assigned when fitting.
//!
//! A cell spans a temperature grid, a radiation-temperature grid, and one
//! partial-density grid per material. Every combination of grid points is
//! a "case"; cases are numbered in mixed radix with the temperature index
//! varying fastest, then radiation temperature, then each material density
//! in order.

use serde::{Deserialize, Serialize};

use crate::error::{RadError, Result};
use crate::materials::{MaterialFraction, ZoneMaterial};

/// Grid point spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Spacing {
    #[default]
    Linear,
    Logarithmic,
}

/// `count` points from `low` to `high`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchAxis {
    pub low: f64,
    pub high: f64,
    pub count: usize,
    #[serde(default)]
    pub spacing: Spacing,
}

impl SearchAxis {
    pub fn linear(low: f64, high: f64, count: usize) -> Self {
        Self { low, high, count, spacing: Spacing::Linear }
    }

    pub fn logarithmic(low: f64, high: f64, count: usize) -> Self {
        Self { low, high, count, spacing: Spacing::Logarithmic }
    }

    /// A single fixed value
    pub fn fixed(value: f64) -> Self {
        Self::linear(value, value, 1)
    }

    /// Grid values; a count below 2 yields just `low`
    pub fn values(&self) -> Result<Vec<f64>> {
        if self.count < 2 {
            return Ok(vec![self.low]);
        }
        let n = (self.count - 1) as f64;
        match self.spacing {
            Spacing::Linear => Ok((0..self.count)
                .map(|i| self.low + (self.high - self.low) * i as f64 / n)
                .collect()),
            Spacing::Logarithmic => {
                if self.low <= 0.0 || self.high <= 0.0 {
                    return Err(RadError::config(format!(
                        "logarithmic axis needs positive bounds ({}, {})",
                        self.low, self.high
                    )));
                }
                let ratio = (self.high / self.low).ln();
                Ok((0..self.count)
                    .map(|i| self.low * (ratio * i as f64 / n).exp())
                    .collect())
            }
        }
    }
}

/// How zone cases combine into the analysis cases of a whole mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseLayout {
    /// Every combination of zone cases, zone 0 varying fastest
    #[default]
    Product,
    /// One zone at a time while the others keep their hydro material;
    /// the case count is the sum over zones
    PerZone,
}

/// Per-zone analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Electron temperature grid (eV)
    pub te: Vec<f64>,
    /// Radiation temperature grid (eV)
    pub tr: Vec<f64>,
    /// Material symbols, parallel to `densities`
    pub symbols: Vec<String>,
    /// Partial particle-density grid per material (particles/cm³)
    pub densities: Vec<Vec<f64>>,
}

impl Cell {
    /// Build from search axes; every axis must produce at least one value
    pub fn new(te: &SearchAxis, tr: &SearchAxis, materials: &[(&str, SearchAxis)]) -> Result<Self> {
        let mut symbols = Vec::with_capacity(materials.len());
        let mut densities = Vec::with_capacity(materials.len());
        for (symbol, axis) in materials {
            symbols.push((*symbol).to_string());
            densities.push(axis.values()?);
        }
        Ok(Self {
            te: te.values()?,
            tr: tr.values()?,
            symbols,
            densities,
        })
    }

    /// Number of materials present
    pub fn nmat(&self) -> usize {
        self.symbols.len()
    }

    fn radices(&self) -> impl Iterator<Item = usize> + '_ {
        [self.te.len(), self.tr.len()]
            .into_iter()
            .chain(self.densities.iter().map(Vec::len))
    }

    /// Number of distinct (te, tr, density...) combinations
    pub fn get_ncases(&self) -> usize {
        self.radices().product()
    }

    /// Material state for case number `case`
    pub fn get_cell_eos(&self, case: usize) -> Result<ZoneMaterial> {
        let ncases = self.get_ncases();
        if case >= ncases {
            return Err(RadError::out_of_range("cell case", case, ncases));
        }
        let mut digits = Vec::with_capacity(2 + self.nmat());
        let mut rest = case;
        for radix in self.radices() {
            digits.push(rest % radix);
            rest /= radix;
        }

        let partial: Vec<f64> = self
            .densities
            .iter()
            .zip(&digits[2..])
            .map(|(grid, &i)| grid[i])
            .collect();
        let np: f64 = partial.iter().sum();
        let components = self
            .symbols
            .iter()
            .zip(&partial)
            .map(|(symbol, fp)| MaterialFraction {
                symbol: symbol.clone(),
                fraction: if np > 0.0 { fp / np } else { 0.0 },
            })
            .collect();
        Ok(ZoneMaterial {
            te: self.te[digits[0]],
            tr: self.tr[digits[1]],
            np,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_values() {
        let lin = SearchAxis::linear(0.0, 1.0, 5).values().unwrap();
        assert_eq!(lin.len(), 5);
        assert!((lin[2] - 0.5).abs() < 1e-15);
        let log = SearchAxis::logarithmic(1.0, 100.0, 3).values().unwrap();
        assert!((log[1] - 10.0).abs() < 1e-12);
        assert!((log[2] - 100.0).abs() < 1e-10);
        assert_eq!(SearchAxis::fixed(7.0).values().unwrap(), vec![7.0]);
        assert!(SearchAxis::logarithmic(0.0, 1.0, 3).values().is_err());
    }

    #[test]
    fn test_case_enumeration() {
        let cell = Cell::new(
            &SearchAxis::linear(100.0, 200.0, 2),
            &SearchAxis::fixed(50.0),
            &[
                ("C", SearchAxis::linear(1e20, 3e20, 3)),
                ("H", SearchAxis::fixed(1e20)),
            ],
        )
        .unwrap();
        assert_eq!(cell.get_ncases(), 6);

        // case 3 = te index 1, C density index 1
        let m = cell.get_cell_eos(3).unwrap();
        assert!((m.te - 200.0).abs() < 1e-12);
        assert!((m.tr - 50.0).abs() < 1e-12);
        assert!((m.np - 3e20).abs() / 3e20 < 1e-12);
        assert!((m.components[0].fraction - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.components[1].fraction - 1.0 / 3.0).abs() < 1e-12);

        assert!(matches!(
            cell.get_cell_eos(6),
            Err(RadError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_every_case_distinct() {
        let cell = Cell::new(
            &SearchAxis::linear(1.0, 2.0, 2),
            &SearchAxis::linear(3.0, 4.0, 2),
            &[("Al", SearchAxis::logarithmic(1e18, 1e20, 3))],
        )
        .unwrap();
        let states: Vec<(f64, f64, f64)> = (0..cell.get_ncases())
            .map(|c| {
                let m = cell.get_cell_eos(c).unwrap();
                (m.te, m.tr, m.np)
            })
            .collect();
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                assert_ne!(states[i], states[j]);
            }
        }
    }
}
