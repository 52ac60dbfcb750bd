//! # Objectives
//!
//! One `Objective` scores a synthetic series against one goal series under
//! a multiplicative scale. Scoring is pure; best-so-far tracking happens
//! only through `consider_candidate`, which accepts strict improvements.

use std::borrow::Cow;
use std::io::BufRead;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{SMALL, UNDEFINED_FITNESS};
use crate::error::{RadError, Result};

// ============================================================================
// SERIES
// ============================================================================

/// Ordered (x, y) samples with strictly increasing x
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(RadError::config(format!(
                "series has {} abscissas but {} values",
                x.len(),
                y.len()
            )));
        }
        if let Some(i) = x.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(RadError::config(format!(
                "series abscissas not increasing at index {}",
                i + 1
            )));
        }
        Ok(Self { x, y })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let (x, y) = pairs.iter().copied().unzip();
        Self::new(x, y)
    }

    /// Values sampled at x = 0, 1, 2, ...
    pub fn from_values(y: Vec<f64>) -> Self {
        Self {
            x: (0..y.len()).map(|i| i as f64).collect(),
            y,
        }
    }

    /// Read whitespace-separated `x y [w]` rows; blank lines and `#`
    /// comments are skipped. Missing weights default to 1.
    pub fn read_text<R: BufRead>(reader: R) -> Result<(Series, Vec<f64>)> {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut w = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let body = line.split('#').next().unwrap_or("").trim();
            if body.is_empty() {
                continue;
            }
            let values = body
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .map_err(|_| RadError::parse(i + 1, format!("bad number '{}'", tok)))
                })
                .collect::<Result<Vec<f64>>>()?;
            match values.as_slice() {
                [a, b] => {
                    x.push(*a);
                    y.push(*b);
                    w.push(1.0);
                }
                [a, b, c] => {
                    x.push(*a);
                    y.push(*b);
                    w.push(*c);
                }
                _ => {
                    return Err(RadError::parse(
                        i + 1,
                        format!("expected 2 or 3 columns, found {}", values.len()),
                    ))
                }
            }
        }
        Ok((Series::new(x, y)?, w))
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Linear interpolation; `None` outside the sampled range
    pub fn interpolate(&self, at: f64) -> Option<f64> {
        let n = self.len();
        if n == 0 || !(at >= self.x[0] && at <= self.x[n - 1]) {
            return None;
        }
        let k = self.x.partition_point(|&v| v < at);
        if self.x[k] == at {
            return Some(self.y[k]);
        }
        let (x0, x1) = (self.x[k - 1], self.x[k]);
        let f = (at - x0) / (x1 - x0);
        Some(self.y[k - 1] + f * (self.y[k] - self.y[k - 1]))
    }

    /// This series sampled at `xs`; `None` if any point lies outside it
    pub fn resample(&self, xs: &[f64]) -> Option<Series> {
        let y = xs
            .iter()
            .map(|&v| self.interpolate(v))
            .collect::<Option<Vec<f64>>>()?;
        Some(Series { x: xs.to_vec(), y })
    }

    pub fn scaled(&self, factor: f64) -> Series {
        Series {
            x: self.x.clone(),
            y: self.y.iter().map(|v| v * factor).collect(),
        }
    }
}

// ============================================================================
// FITNESS RECORDS
// ============================================================================

/// Distance between goal and scaled synthetic values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMetric {
    /// Σ w·((g - s·y)/g)², with g replaced by 1 where it vanishes
    #[default]
    RelativeSquared,
    /// Σ w·(g - s·y)²
    Squared,
    /// Σ w·|g - s·y|
    Absolute,
}

impl FitMetric {
    fn term(self, g: f64, r: f64) -> f64 {
        match self {
            FitMetric::RelativeSquared => (r / denominator(g)).powi(2),
            FitMetric::Squared => r * r,
            FitMetric::Absolute => r.abs(),
        }
    }

    /// Weight of a point in the least-squares normal equation
    fn lsq_weight(self, g: f64) -> f64 {
        match self {
            FitMetric::RelativeSquared => denominator(g).powi(-2),
            FitMetric::Squared | FitMetric::Absolute => 1.0,
        }
    }
}

fn denominator(g: f64) -> f64 {
    if g.abs() > SMALL {
        g.abs()
    } else {
        1.0
    }
}

/// One evaluated candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub fitness: f64,
    pub scale: f64,
    /// Sequence number of the trial that produced it
    pub trial: usize,
    /// Analysis case, when the trial came from a case sweep
    pub case: Option<usize>,
}

impl FitRecord {
    pub fn new(fitness: f64, scale: f64, trial: usize) -> Self {
        Self {
            fitness,
            scale,
            trial,
            case: None,
        }
    }

    pub fn with_case(mut self, case: usize) -> Self {
        self.case = Some(case);
        self
    }

    /// Strictly better than the current best, if any
    pub fn improves_on(&self, best: Option<&FitRecord>) -> bool {
        if self.fitness.is_nan() {
            return false;
        }
        best.map_or(true, |b| self.fitness < b.fitness)
    }
}

/// Per-point comparison at one scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    pub x: f64,
    pub goal: f64,
    /// Scaled synthetic value
    pub synthetic: f64,
    /// goal - synthetic
    pub residual: f64,
}

// ============================================================================
// OBJECTIVE
// ============================================================================

/// A goal series, the synthetic series compared against it and the best
/// scale found so far
#[derive(Debug, Clone)]
pub struct Objective {
    name: String,
    goal: Arc<Series>,
    synthetic: Arc<Series>,
    weight: f64,
    metric: FitMetric,
    point_weights: Option<Vec<f64>>,
    calibration: f64,
    best: Option<FitRecord>,
    /// Synthetic series in effect when `best` was recorded
    best_data: Option<Arc<Series>>,
    trials: usize,
}

impl Objective {
    pub fn new(name: impl Into<String>, goal: Arc<Series>, synthetic: Arc<Series>) -> Self {
        Self {
            name: name.into(),
            goal,
            synthetic,
            weight: 1.0,
            metric: FitMetric::default(),
            point_weights: None,
            calibration: 1.0,
            best: None,
            best_data: None,
            trials: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metric(mut self, metric: FitMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Per-point weights, one per goal sample
    pub fn with_point_weights(mut self, weights: Vec<f64>) -> Self {
        self.point_weights = Some(weights);
        self
    }

    /// Fixed calibration factor applied to the synthetic series before
    /// every comparison, on top of the trial scale
    pub fn rescale(&mut self, factor: f64) {
        self.calibration *= factor;
    }

    pub fn calibration(&self) -> f64 {
        self.calibration
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn metric(&self) -> FitMetric {
        self.metric
    }

    pub fn goal(&self) -> &Series {
        &self.goal
    }

    pub fn synthetic(&self) -> &Series {
        &self.synthetic
    }

    /// Swap in a new synthetic series; the best record is kept
    pub fn set_synthetic(&mut self, synthetic: Arc<Series>) {
        self.synthetic = synthetic;
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Synthetic values on the goal abscissas with their point weights
    fn aligned(&self) -> Option<(Cow<'_, [f64]>, Cow<'_, [f64]>)> {
        if self.goal.is_empty() || self.synthetic.is_empty() {
            warn!(objective = %self.name, "empty series, fitness undefined");
            return None;
        }
        let weights: Cow<'_, [f64]> = match &self.point_weights {
            Some(w) if w.len() != self.goal.len() => {
                warn!(
                    objective = %self.name,
                    weights = w.len(),
                    points = self.goal.len(),
                    "point weights do not match goal, fitness undefined"
                );
                return None;
            }
            Some(w) => Cow::Borrowed(w.as_slice()),
            None => Cow::Owned(vec![1.0; self.goal.len()]),
        };
        if self.synthetic.x == self.goal.x {
            return Some((Cow::Borrowed(self.synthetic.y.as_slice()), weights));
        }
        match self.synthetic.resample(&self.goal.x) {
            Some(s) => Some((Cow::Owned(s.y), weights)),
            None => {
                warn!(
                    objective = %self.name,
                    "goal extends past synthetic series, fitness undefined"
                );
                None
            }
        }
    }

    /// Fitness at `scale` (lower is better); `UNDEFINED_FITNESS` when the
    /// series cannot be compared
    pub fn get_fitness(&self, scale: f64) -> f64 {
        if !scale.is_finite() {
            warn!(objective = %self.name, scale, "non-finite scale, fitness undefined");
            return UNDEFINED_FITNESS;
        }
        let Some((syn, w)) = self.aligned() else {
            return UNDEFINED_FITNESS;
        };
        let s = scale * self.calibration;
        let f: f64 = self
            .goal
            .y
            .iter()
            .zip(syn.iter())
            .zip(w.iter())
            .map(|((&g, &y), &wi)| wi * self.metric.term(g, g - s * y))
            .sum();
        if f.is_finite() {
            f
        } else {
            UNDEFINED_FITNESS
        }
    }

    /// Score `scale` and keep it if it improves the best record
    pub fn evaluate(&mut self, scale: f64) -> f64 {
        let f = self.get_fitness(scale);
        let record = FitRecord::new(f, scale, self.trials);
        self.consider_candidate(record);
        f
    }

    /// Replace the best record only on strict improvement
    pub fn consider_candidate(&mut self, record: FitRecord) -> bool {
        self.trials += 1;
        let better = record.improves_on(self.best.as_ref());
        if better {
            self.best = Some(record);
            self.best_data = Some(Arc::clone(&self.synthetic));
        }
        better
    }

    pub fn best(&self) -> Option<&FitRecord> {
        self.best.as_ref()
    }

    pub fn get_best_fitness(&self) -> f64 {
        self.best.map_or(UNDEFINED_FITNESS, |b| b.fitness)
    }

    pub fn get_best_scale(&self) -> f64 {
        self.best.map_or(1.0, |b| b.scale)
    }

    pub fn get_best_case(&self) -> Option<usize> {
        self.best.and_then(|b| b.case)
    }

    /// Synthetic series of the best record, scaled as it was scored
    pub fn best_synthetic(&self) -> Series {
        let data = self.best_data.as_deref().unwrap_or(self.synthetic.as_ref());
        data.scaled(self.calibration * self.get_best_scale())
    }

    /// Per-point residuals at `scale`, empty when undefined
    pub fn residuals(&self, scale: f64) -> Vec<Residual> {
        let Some((syn, _)) = self.aligned() else {
            return Vec::new();
        };
        let s = scale * self.calibration;
        self.goal
            .x
            .iter()
            .zip(&self.goal.y)
            .zip(syn.iter())
            .map(|((&x, &g), &y)| Residual {
                x,
                goal: g,
                synthetic: s * y,
                residual: g - s * y,
            })
            .collect()
    }

    /// Σ w'·g·y and Σ w'·y² over the aligned points
    pub(crate) fn normal_terms(&self) -> Option<(f64, f64)> {
        let (syn, w) = self.aligned()?;
        let c = self.calibration;
        Some(self.goal.y.iter().zip(syn.iter()).zip(w.iter()).fold(
            (0.0, 0.0),
            |(num, den), ((&g, &y), &wi)| {
                let wl = wi * self.metric.lsq_weight(g);
                (num + wl * g * c * y, den + wl * (c * y).powi(2))
            },
        ))
    }

    /// Closed-form least-squares scale; exact for the squared metrics
    pub fn optimal_scale(&self) -> Option<f64> {
        let (num, den) = self.normal_terms()?;
        if den > SMALL {
            Some(num / den)
        } else {
            None
        }
    }

    /// Sum of |Δy| over common points plus the length difference
    pub fn abs_diff(&self, other: &Objective) -> f64 {
        let (a, b) = (&self.synthetic.y, &other.synthetic.y);
        let d = (a.len() as f64 - b.len() as f64).abs();
        d + a.iter().zip(b).map(|(p, q)| (p - q).abs()).sum::<f64>()
    }
}
