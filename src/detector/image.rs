//! Assembled detector image and its export forms.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{RadError, Result};
use crate::optimizer::Series;
use crate::transport::integrate;

/// Bin edges of one image axis, in detector-plane coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAxis {
    pub label: String,
    /// `n + 1` increasing edges
    pub edges: Vec<f64>,
}

impl ImageAxis {
    /// `n` bins of width `step` centered on zero
    pub fn centered(label: impl Into<String>, n: usize, step: f64) -> Self {
        let lo = -0.5 * n as f64 * step;
        Self {
            label: label.into(),
            edges: (0..=n).map(|i| lo + step * i as f64).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}

/// Synthetic detector image for one time step
///
/// `data` holds one spectrum per patch, patch (ix, iy) starting at
/// `(iy·nx + ix)·nhv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    /// Simulation time of the traced mesh (s)
    pub time: f64,
    pub nx: usize,
    pub ny: usize,
    /// Photon energy grid (eV)
    pub hv: Vec<f64>,
    /// Specific intensity (W/cm²/sr/eV)
    pub data: Vec<f64>,
    /// False for patches whose ray failed to traverse the mesh
    pub valid: Vec<bool>,
    pub x_axis: ImageAxis,
    pub y_axis: ImageAxis,
}

impl Image {
    pub fn nhv(&self) -> usize {
        self.hv.len()
    }

    fn index(&self, ix: usize, iy: usize) -> Result<usize> {
        if ix >= self.nx {
            return Err(RadError::out_of_range("image column", ix, self.nx));
        }
        if iy >= self.ny {
            return Err(RadError::out_of_range("image row", iy, self.ny));
        }
        Ok(iy * self.nx + ix)
    }

    /// Spectrum of patch (ix, iy)
    pub fn at(&self, ix: usize, iy: usize) -> Result<&[f64]> {
        let k = self.index(ix, iy)? * self.nhv();
        Ok(&self.data[k..k + self.nhv()])
    }

    pub fn is_valid(&self, ix: usize, iy: usize) -> Result<bool> {
        Ok(self.valid[self.index(ix, iy)?])
    }

    pub fn invalid_count(&self) -> usize {
        self.valid.iter().filter(|v| !**v).count()
    }

    /// Energy-integrated intensity of every patch (W/cm²/sr), row-major
    pub fn integrated(&self) -> Vec<f64> {
        let nhv = self.nhv().max(1);
        self.data
            .chunks(nhv)
            .map(|s| if self.nhv() > 1 { integrate(&self.hv, s) } else { s[0] })
            .collect()
    }

    /// Energy-integrated intensity along row `iy`, valid patches only
    pub fn lineout_x(&self, iy: usize) -> Result<Series> {
        self.index(0, iy)?;
        let totals = self.integrated();
        let (x, y): (Vec<f64>, Vec<f64>) = self
            .x_axis
            .centers()
            .into_iter()
            .enumerate()
            .filter(|(ix, _)| self.valid[iy * self.nx + ix])
            .map(|(ix, x)| (x, totals[iy * self.nx + ix]))
            .unzip();
        Series::new(x, y)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text table: a header, then one line per patch with its
    /// centers and spectrum; invalid patches are written as `nan`
    pub fn write_text<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "# {} t = {:e} s", self.name, self.time)?;
        writeln!(out, "# nx {} ny {} nhv {}", self.nx, self.ny, self.nhv())?;
        write!(out, "# {} {} |", self.x_axis.label, self.y_axis.label)?;
        for hv in &self.hv {
            write!(out, " {:e}", hv)?;
        }
        writeln!(out)?;
        let (xc, yc) = (self.x_axis.centers(), self.y_axis.centers());
        for iy in 0..self.ny {
            for ix in 0..self.nx {
                write!(out, "{:e} {:e}", xc[ix], yc[iy])?;
                let valid = self.valid[iy * self.nx + ix];
                for v in self.at(ix, iy)? {
                    if valid {
                        write!(out, " {:e}", v)?;
                    } else {
                        write!(out, " nan")?;
                    }
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Image {
        let (nx, ny) = (3, 2);
        let hv = vec![1.0, 2.0];
        let data: Vec<f64> = (0..nx * ny).flat_map(|k| [k as f64, k as f64]).collect();
        let mut valid = vec![true; nx * ny];
        valid[4] = false;
        Image {
            name: "test".into(),
            time: 1.0e-9,
            nx,
            ny,
            hv,
            data,
            valid,
            x_axis: ImageAxis::centered("x (cm)", nx, 0.1),
            y_axis: ImageAxis::centered("y (cm)", ny, 0.1),
        }
    }

    #[test]
    fn test_axis_centers() {
        let a = ImageAxis::centered("x", 4, 0.5);
        assert_eq!(a.len(), 4);
        assert!((a.edges[0] + 1.0).abs() < 1e-12);
        assert!((a.centers()[3] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_access_and_lineout() {
        let img = image();
        assert_eq!(img.at(2, 1).unwrap(), &[5.0, 5.0]);
        assert!(img.at(3, 0).is_err());
        assert!(!img.is_valid(1, 1).unwrap());
        assert_eq!(img.invalid_count(), 1);
        let line = img.lineout_x(1).unwrap();
        // Patch (1, 1) is skipped
        assert_eq!(line.len(), 2);
        assert!((line.y[1] - 5.0).abs() < 1e-12);
        assert!((line.x[0] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_text_export() {
        let img = image();
        let mut buf = Vec::new();
        img.write_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3 + 6);
        assert!(text.contains("nan"));
        let json = img.to_json().unwrap();
        let back: Image = serde_json::from_str(&json).unwrap();
        assert_eq!(back, img);
    }
}
