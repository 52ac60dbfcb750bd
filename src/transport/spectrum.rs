//! Spectral helpers: backlighter sources, instrument broadening and
//! band integration.

use serde::{Deserialize, Serialize};

use crate::constants::{FWHM_PER_SIGMA, PLANCK_PREFACTOR};

/// Blackbody specific intensity (W/cm²/sr/eV) at photon energy `hv` for
/// temperature `tev`, both in eV; zero for a non-positive temperature
pub fn planckian(hv: f64, tev: f64) -> f64 {
    if tev <= 0.0 || hv <= 0.0 {
        return 0.0;
    }
    let x = hv / tev;
    // exp_m1 overflows to inf, which correctly drives the result to zero
    PLANCK_PREFACTOR * hv.powi(3) / x.exp_m1()
}

/// Radiation entering the mesh along every ray
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backlighter {
    /// Uniform specific intensity in every bin
    Flat { intensity: f64 },
    /// Planckian at the given temperature (eV)
    Blackbody { temperature: f64 },
}

impl Default for Backlighter {
    fn default() -> Self {
        Backlighter::Flat { intensity: 0.0 }
    }
}

impl Backlighter {
    /// Specific intensity on the photon-energy grid `hv`
    pub fn spectrum(&self, hv: &[f64]) -> Vec<f64> {
        match *self {
            Backlighter::Flat { intensity } => vec![intensity; hv.len()],
            Backlighter::Blackbody { temperature } => {
                hv.iter().map(|&e| planckian(e, temperature)).collect()
            }
        }
    }
}

/// Convolve `y(hv)` with a unit-area Gaussian of full width `fwhm`
///
/// The grid may be non-uniform; each output point renormalizes the kernel
/// over the grid so a flat spectrum stays flat at the edges.
pub fn broaden_fwhm(hv: &[f64], y: &[f64], fwhm: f64) -> Vec<f64> {
    if fwhm <= 0.0 || hv.len() < 2 || hv.len() != y.len() {
        return y.to_vec();
    }
    let sigma = fwhm / FWHM_PER_SIGMA;
    let n = hv.len();
    let width = |j: usize| {
        let lo = if j == 0 { hv[0] } else { 0.5 * (hv[j - 1] + hv[j]) };
        let hi = if j + 1 == n { hv[n - 1] } else { 0.5 * (hv[j] + hv[j + 1]) };
        hi - lo
    };
    (0..n)
        .map(|i| {
            let mut sum = 0.0;
            let mut norm = 0.0;
            for j in 0..n {
                let d = (hv[j] - hv[i]) / sigma;
                if d.abs() > 8.0 {
                    continue;
                }
                let w = (-0.5 * d * d).exp() * width(j);
                sum += w * y[j];
                norm += w;
            }
            if norm > 0.0 {
                sum / norm
            } else {
                y[i]
            }
        })
        .collect()
}

/// Trapezoidal integral of `y` over `x`
pub fn integrate(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planckian_reference() {
        // 0.5 keV blackbody at 1 keV
        let b = planckian(1000.0, 500.0);
        assert!((b / 788_906_361_433.204 - 1.0).abs() < 1e-9);
        assert_eq!(planckian(1000.0, -1.0), 0.0);
        assert_eq!(planckian(1.0e6, 1.0), 0.0);
    }

    #[test]
    fn test_backlighter_spectra() {
        let hv = [1000.0, 2000.0];
        assert_eq!(Backlighter::Flat { intensity: 500.0 }.spectrum(&hv), vec![500.0, 500.0]);
        let bb = Backlighter::Blackbody { temperature: 500.0 }.spectrum(&hv);
        assert!(bb[0] > bb[1]);
    }

    #[test]
    fn test_broadening_keeps_flat_and_spreads_lines() {
        let hv: Vec<f64> = (0..101).map(|i| 1000.0 + i as f64).collect();
        let flat = broaden_fwhm(&hv, &vec![2.0; 101], 10.0);
        assert!(flat.iter().all(|v| (v - 2.0).abs() < 1e-12));

        let mut line = vec![0.0; 101];
        line[50] = 1.0;
        let wide = broaden_fwhm(&hv, &line, 10.0);
        assert!(wide[50] < 1.0);
        assert!(wide[45] > 0.0);
        assert!((wide[45] - wide[55]).abs() < 1e-12);
        // Area is kept away from the edges
        assert!((integrate(&hv, &wide) - integrate(&hv, &line)).abs() < 1e-3);
    }

    #[test]
    fn test_integrate() {
        let x = [0.0, 1.0, 3.0];
        let y = [1.0, 1.0, 3.0];
        assert!((integrate(&x, &y) - 5.0).abs() < 1e-12);
    }
}
