//! Per-element opacity/EOS table on a (temperature, density) grid.

use serde::{Deserialize, Serialize};

use super::Element;
use crate::error::{RadError, Result};

// ============================================================================
// AXIS GRID
// ============================================================================

/// Strictly increasing, finite grid of abscissae
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisGrid {
    name: String,
    values: Vec<f64>,
}

impl AxisGrid {
    /// Validate and wrap `values`; `table` names the owner in errors
    pub fn new(table: &str, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(RadError::table(table, format!("{} grid is empty", name)));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(RadError::table(
                table,
                format!("{} grid point {} is not finite", name, i),
            ));
        }
        if let Some(i) = values.windows(2).position(|w| w[1] <= w[0]) {
            return Err(RadError::table(
                table,
                format!(
                    "{} grid not strictly increasing at point {} ({} then {})",
                    name,
                    i + 1,
                    values[i],
                    values[i + 1]
                ),
            ));
        }
        Ok(Self { name, values })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_at(&self, i: usize) -> Result<f64> {
        self.values
            .get(i)
            .copied()
            .ok_or_else(|| RadError::out_of_range("grid", i, self.values.len()))
    }

    fn all_positive(&self) -> bool {
        self.values[0] > 0.0
    }

    /// Lower bracketing index and weight of `x`, clamped to the grid ends
    ///
    /// Weights are taken in log space when every grid point is positive.
    /// NaN maps to the first grid point.
    pub fn bracket(&self, x: f64) -> (usize, f64) {
        let n = self.values.len();
        if n == 1 || x.is_nan() || x <= self.values[0] {
            return (0, 0.0);
        }
        if x >= self.values[n - 1] {
            return (n - 2, 1.0);
        }
        // First index with value > x, then step back
        let hi = self.values.partition_point(|v| *v <= x);
        let i = hi - 1;
        let (a, b) = (self.values[i], self.values[i + 1]);
        let w = if self.all_positive() {
            (x.ln() - a.ln()) / (b.ln() - a.ln())
        } else {
            (x - a) / (b - a)
        };
        (i, w.clamp(0.0, 1.0))
    }

    /// Index of the grid point nearest to `x`
    pub fn nearest(&self, x: f64) -> usize {
        let (i, w) = self.bracket(x);
        if self.values.len() > 1 && w > 0.5 {
            i + 1
        } else {
            i
        }
    }
}

// ============================================================================
// INTERPOLATION
// ============================================================================

/// Linear blend that never multiplies an infinity by zero
fn lerp(a: f64, b: f64, w: f64) -> f64 {
    if w <= 0.0 || a == b {
        a
    } else if w >= 1.0 {
        b
    } else {
        (1.0 - w) * a + w * b
    }
}

/// Blend in log space, falling back to linear for non-positive or infinite values
fn log_lerp(a: f64, b: f64, w: f64) -> f64 {
    if w <= 0.0 || a == b {
        a
    } else if w >= 1.0 {
        b
    } else if a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite() {
        ((1.0 - w) * a.ln() + w * b.ln()).exp()
    } else {
        (1.0 - w) * a + w * b
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Raw table as read from disk, before validation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableRecord {
    pub element: Element,
    pub temperature: Vec<f64>,
    pub density: Vec<f64>,
    pub nhv: usize,
    pub absorption: Vec<f64>,
    pub emission: Vec<f64>,
    #[serde(default)]
    pub scattering: Vec<f64>,
    pub zbar: Vec<f64>,
}

/// Opacity and EOS data of one element
///
/// Spectra are stored point-major: index `(it·nd + id)·nhv + ihv`.
/// Coefficients are per particle (cm² for absorption and scattering,
/// W/sr/eV for emission); the zone density multiplies them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRecord", into = "TableRecord")]
pub struct Table {
    element: Element,
    temperature: AxisGrid,
    density: AxisGrid,
    nhv: usize,
    absorption: Vec<f64>,
    emission: Vec<f64>,
    scattering: Vec<f64>,
    zbar: Vec<f64>,
}

impl TryFrom<TableRecord> for Table {
    type Error = RadError;

    fn try_from(r: TableRecord) -> Result<Self> {
        let name = r.element.symbol.clone();
        let temperature = AxisGrid::new(&name, "temperature", r.temperature)?;
        let density = AxisGrid::new(&name, "density", r.density)?;
        let npoints = temperature.len() * density.len();
        let nspec = npoints * r.nhv;
        let scattering = if r.scattering.is_empty() {
            vec![0.0; nspec]
        } else {
            r.scattering
        };
        for (label, data, expect) in [
            ("absorption", &r.absorption, nspec),
            ("emission", &r.emission, nspec),
            ("scattering", &scattering, nspec),
            ("zbar", &r.zbar, npoints),
        ] {
            if data.len() != expect {
                return Err(RadError::table(
                    &name,
                    format!("{} has {} values, expected {}", label, data.len(), expect),
                ));
            }
            if let Some(i) = data.iter().position(|v| v.is_nan() || *v < 0.0) {
                return Err(RadError::table(
                    &name,
                    format!("{} value {} is negative or NaN", label, i),
                ));
            }
        }
        if r.nhv == 0 {
            return Err(RadError::table(&name, "table has no photon-energy bins"));
        }
        Ok(Self {
            element: r.element,
            temperature,
            density,
            nhv: r.nhv,
            absorption: r.absorption,
            emission: r.emission,
            scattering,
            zbar: r.zbar,
        })
    }
}

impl From<Table> for TableRecord {
    fn from(t: Table) -> Self {
        Self {
            element: t.element,
            temperature: t.temperature.values,
            density: t.density.values,
            nhv: t.nhv,
            absorption: t.absorption,
            emission: t.emission,
            scattering: t.scattering,
            zbar: t.zbar,
        }
    }
}

impl Table {
    /// Build and validate a table
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        element: Element,
        temperature: Vec<f64>,
        density: Vec<f64>,
        nhv: usize,
        absorption: Vec<f64>,
        emission: Vec<f64>,
        scattering: Vec<f64>,
        zbar: Vec<f64>,
    ) -> Result<Self> {
        TableRecord {
            element,
            temperature,
            density,
            nhv,
            absorption,
            emission,
            scattering,
            zbar,
        }
        .try_into()
    }

    /// Single-point table with flat spectra, useful for synthetic problems
    pub fn constant(element: Element, nhv: usize, absorption: f64, emission: f64, zbar: f64) -> Result<Self> {
        Self::new(
            element,
            vec![1.0],
            vec![1.0],
            nhv,
            vec![absorption; nhv],
            vec![emission; nhv],
            vec![0.0; nhv],
            vec![zbar],
        )
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn symbol(&self) -> &str {
        &self.element.symbol
    }

    pub fn temperature(&self) -> &AxisGrid {
        &self.temperature
    }

    pub fn density(&self) -> &AxisGrid {
        &self.density
    }

    pub fn get_nhv(&self) -> usize {
        self.nhv
    }

    fn point(&self, it: usize, id: usize) -> Result<usize> {
        if it >= self.temperature.len() {
            return Err(RadError::out_of_range("temperature", it, self.temperature.len()));
        }
        if id >= self.density.len() {
            return Err(RadError::out_of_range("density", id, self.density.len()));
        }
        Ok(it * self.density.len() + id)
    }

    fn spectrum_at<'a>(&self, data: &'a [f64], it: usize, id: usize) -> Result<&'a [f64]> {
        let p = self.point(it, id)?;
        Ok(&data[p * self.nhv..(p + 1) * self.nhv])
    }

    /// Absorption spectrum at grid point (it, id)
    pub fn get_absorption_at(&self, it: usize, id: usize) -> Result<&[f64]> {
        self.spectrum_at(&self.absorption, it, id)
    }

    pub fn get_emission_at(&self, it: usize, id: usize) -> Result<&[f64]> {
        self.spectrum_at(&self.emission, it, id)
    }

    pub fn get_scattering_at(&self, it: usize, id: usize) -> Result<&[f64]> {
        self.spectrum_at(&self.scattering, it, id)
    }

    /// Mean ionization at grid point (it, id)
    pub fn get_zbar_at(&self, it: usize, id: usize) -> Result<f64> {
        Ok(self.zbar[self.point(it, id)?])
    }

    /// Log-space bilinear interpolation of a spectral quantity
    fn interpolate_spectrum(&self, data: &[f64], te: f64, np: f64) -> Vec<f64> {
        let (it, wt) = self.temperature.bracket(te);
        let (id, wd) = self.density.bracket(np);
        let it1 = (it + 1).min(self.temperature.len() - 1);
        let id1 = (id + 1).min(self.density.len() - 1);
        let nd = self.density.len();
        let base = |i: usize, j: usize| (i * nd + j) * self.nhv;
        let (p00, p10, p01, p11) = (base(it, id), base(it1, id), base(it, id1), base(it1, id1));
        (0..self.nhv)
            .map(|k| {
                let lo = log_lerp(data[p00 + k], data[p10 + k], wt);
                let hi = log_lerp(data[p01 + k], data[p11 + k], wt);
                log_lerp(lo, hi, wd)
            })
            .collect()
    }

    /// Absorption cross-section spectrum at (te, np)
    pub fn absorption(&self, te: f64, np: f64) -> Vec<f64> {
        self.interpolate_spectrum(&self.absorption, te, np)
    }

    pub fn emission(&self, te: f64, np: f64) -> Vec<f64> {
        self.interpolate_spectrum(&self.emission, te, np)
    }

    pub fn scattering(&self, te: f64, np: f64) -> Vec<f64> {
        self.interpolate_spectrum(&self.scattering, te, np)
    }

    /// Mean ionization at (te, np), linear bilinear interpolation
    pub fn zbar(&self, te: f64, np: f64) -> f64 {
        let (it, wt) = self.temperature.bracket(te);
        let (id, wd) = self.density.bracket(np);
        let it1 = (it + 1).min(self.temperature.len() - 1);
        let id1 = (id + 1).min(self.density.len() - 1);
        let nd = self.density.len();
        let z = |i: usize, j: usize| self.zbar[i * nd + j];
        lerp(lerp(z(it, id), z(it1, id), wt), lerp(z(it, id1), z(it1, id1), wt), wd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Table {
        // T = {10, 100}, n = {1e20, 1e22}, 2 photon bins
        Table::new(
            Element::new("Al", 13, 26.98),
            vec![10.0, 100.0],
            vec![1e20, 1e22],
            2,
            vec![
                1e-18, 2e-18, // (T0, n0)
                1e-16, 2e-16, // (T0, n1)
                1e-20, 2e-20, // (T1, n0)
                1e-18, 2e-18, // (T1, n1)
            ],
            vec![0.0; 8],
            Vec::new(),
            vec![3.0, 4.0, 11.0, 12.0],
        )
        .unwrap()
    }

    #[test]
    fn test_grid_points_are_exact() {
        let t = two_by_two();
        assert_eq!(t.get_absorption_at(1, 0).unwrap(), &[1e-20, 2e-20]);
        assert_eq!(t.absorption(100.0, 1e20), vec![1e-20, 2e-20]);
        assert_eq!(t.get_zbar_at(0, 1).unwrap(), 4.0);
        assert!(t.get_absorption_at(2, 0).is_err());
    }

    #[test]
    fn test_log_interpolation_midpoint() {
        let t = two_by_two();
        // Geometric midpoint in T at n0: sqrt(1e-18 · 1e-20) = 1e-19
        let k = t.absorption(10f64.powf(1.5), 1e20);
        assert!((k[0] / 1e-19 - 1.0).abs() < 1e-9);
        assert!((k[1] / 2e-19 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_eos_linear_and_clamped() {
        let t = two_by_two();
        // Halfway in log T is weight 0.5, so zbar is the linear midpoint
        let z = t.zbar(10f64.powf(1.5), 1e20);
        assert!((z - 7.0).abs() < 1e-9);
        // Outside the grid clamps to the edge
        assert_eq!(t.zbar(1.0, 1e10), 3.0);
        assert_eq!(t.zbar(1e6, 1e30), 12.0);
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let err = Table::new(
            Element::new("Fe", 26, 55.85),
            vec![10.0, 5.0],
            vec![1.0],
            1,
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            Vec::new(),
            vec![1.0, 1.0],
        )
        .unwrap_err();
        match err {
            RadError::TableFormat { table, message } => {
                assert_eq!(table, "Fe");
                assert!(message.contains("temperature"));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = Table::new(
            Element::new("C", 6, 12.0),
            vec![1.0],
            vec![1.0],
            3,
            vec![1.0; 2],
            vec![1.0; 3],
            Vec::new(),
            vec![1.0],
        );
        assert!(matches!(err, Err(RadError::TableFormat { .. })));
    }

    #[test]
    fn test_infinite_opacity_survives_interpolation() {
        let t = Table::constant(Element::new("W", 74, 183.84), 3, f64::INFINITY, 0.0, 10.0).unwrap();
        assert!(t.absorption(123.0, 4e21).iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_bracket_and_nearest() {
        let g = AxisGrid::new("t", "x", vec![1.0, 10.0, 100.0]).unwrap();
        assert_eq!(g.bracket(0.5), (0, 0.0));
        assert_eq!(g.bracket(1000.0), (1, 1.0));
        assert_eq!(g.bracket(f64::NAN), (0, 0.0));
        let (i, w) = g.bracket(10f64.sqrt());
        assert_eq!(i, 0);
        assert!((w - 0.5).abs() < 1e-12);
        assert_eq!(g.nearest(60.0), 2);
        assert_eq!(g.nearest(2.0), 0);
    }

    #[test]
    fn test_json_round_trip_validates() {
        let t = two_by_two();
        let json = serde_json::to_string(&t).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        let bad = json.replace("[10.0,100.0]", "[100.0,10.0]");
        assert!(serde_json::from_str::<Table>(&bad).is_err());
    }
}
