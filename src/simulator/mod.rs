//! # Simulator Module
//!
//! End-to-end synthetic radiography run: builds a brick target, traces a
//! detector through it, and fits a goal lineout by rescaling.
//!
//! ```text
//! RunConfig ─▶ Grid::brick ─▶ HydroSeries ─▶ Mesh::load ─┐
//!          └─▶ Database (one LTE table) ──────────────────┼─▶ Detector::trace ─▶ Image
//!                                                          │
//! Image::lineout_x ─▶ Objective ─▶ Goal ─▶ ScaleSearch ─▶ RunReport
//! ```
//!
//! With an `analysis` section every zone also carries an analysis cell.
//! `analyze_cases` then re-traces the detector once per case and records
//! which case fits the goal best.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{AnalysisConfig, CaseScale, RunConfig, TraceConfig};
use crate::detector::{Detector, Image, Projection};
use crate::error::{RadError, Result};
use crate::materials::{Database, Element, Table, ZoneMaterial};
use crate::mesh::{CaseLayout, Cell, Grid, HydroSeries, Mesh, MeshSnapshot, SearchAxis, ZoneRecord};
use crate::optimizer::{Goal, GoalReport, Objective, SearchResult, Series};
use crate::transport::{planckian, Backlighter, MeshOptics};
use crate::types::Vec3;

/// Plate margin around the target on each side, as a fraction of its size
const PLATE_MARGIN: f64 = 0.125;

/// Everything a run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub image: Image,
    /// Row of the image used as the synthetic series
    pub lineout_row: usize,
    pub search: SearchResult,
    /// Goal analysis at the best scale
    pub fit: GoalReport,
    /// Case sweep, when an analysis section is configured
    pub cases: Option<CaseSweep>,
}

/// Score of one analysis case
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case: usize,
    pub scale: f64,
    pub fitness: f64,
}

/// Outcome of a sweep over analysis cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSweep {
    pub layout: CaseLayout,
    pub ncases: usize,
    pub best_case: Option<usize>,
    pub best_fitness: f64,
    pub best_scale: f64,
    pub cases: Vec<CaseRecord>,
}

/// Analysis cell shared by every zone of the brick
fn analysis_cell(cfg: &RunConfig, analysis: &AnalysisConfig) -> Result<Cell> {
    let te = analysis.temperature.unwrap_or_else(|| SearchAxis::fixed(cfg.temperature));
    let np = analysis
        .density
        .unwrap_or_else(|| SearchAxis::logarithmic(0.5 * cfg.density, 2.0 * cfg.density, 3));
    Cell::new(&te, &SearchAxis::fixed(cfg.temperature), &[(cfg.element.as_str(), np)])
}

/// Brick target whose particle density rises linearly along x
pub fn build_mesh(cfg: &RunConfig) -> Result<Mesh> {
    let [nx, ny, nz] = cfg.zones;
    let size = Vec3::new(cfg.size[0], cfg.size[1], cfg.size[2]);
    let grid = Grid::brick(cfg.zones, Vec3::zero(), size)?;
    let cells = match &cfg.analysis {
        Some(analysis) => vec![analysis_cell(cfg, analysis)?],
        None => Vec::new(),
    };
    let zones = (0..nx * ny * nz)
        .map(|id| {
            let i = id % nx;
            let np = cfg.density * (1.0 + i as f64 / nx as f64);
            ZoneRecord::new(ZoneMaterial::single(cfg.element.as_str(), cfg.temperature, np))
                .with_cells(cells.clone())
        })
        .collect();
    let hydro = HydroSeries::for_grid(&grid).with_snapshot(MeshSnapshot::at_rest(&grid, 0.0, zones))?;
    Mesh::load(&grid, &hydro, 0)
}

/// One-element database in LTE: emission σ·B(hv, T)
pub fn build_database(cfg: &RunConfig) -> Result<Database> {
    let hv = cfg.photon_energies.clone();
    let nhv = hv.len();
    let emission = hv
        .iter()
        .map(|&e| cfg.cross_section * planckian(e, cfg.temperature))
        .collect();
    let zbar = (cfg.temperature / 10.0).min(cfg.z as f64);
    let table = Table::new(
        Element::new(cfg.element.as_str(), cfg.z, cfg.a),
        vec![cfg.temperature],
        vec![cfg.density],
        nhv,
        vec![cfg.cross_section; nhv],
        emission,
        vec![0.0; nhv],
        vec![zbar],
    )?;
    Database::new("synthetic", hv)?.with_table(table)
}

/// Face-on plate above the target, backlit by a blackbody
pub fn build_detector(cfg: &RunConfig) -> Result<Detector> {
    let [sx, sy, sz] = cfg.size;
    let [px, py] = cfg.pixels;
    let (hx, hy) = (0.5 * sx * (1.0 + 2.0 * PLATE_MARGIN), 0.5 * sy * (1.0 + 2.0 * PLATE_MARGIN));
    let detector = Detector::new(
        "face-on",
        Vec3::new(0.5 * sx, 0.5 * sy, sz + 0.5 * cfg.standoff),
        Vec3::new(hx, 0.0, 0.0),
        Vec3::new(0.0, hy, 0.0),
        2.0 * hx / px as f64,
        2.0 * hy / py as f64,
        Projection::Parallel { standoff: cfg.standoff + sz },
        Backlighter::Blackbody { temperature: cfg.backlighter_temperature },
    )?;
    Ok(match cfg.fwhm {
        Some(w) => detector.with_fwhm(w),
        None => detector,
    })
}

/// Trace the detector once per analysis case of `mesh` and score each
/// case against `goal`
///
/// `synthesize` turns the image of a case into one synthetic series per
/// objective. The best record of `goal` should be fresh, since the sweep
/// reports whatever record is best when it ends.
#[instrument(skip_all, fields(layout = ?analysis.layout))]
pub fn analyze_cases<F>(
    mesh: &Mesh,
    db: &Database,
    detector: &mut Detector,
    goal: &mut Goal,
    analysis: &AnalysisConfig,
    trace: &TraceConfig,
    mut synthesize: F,
) -> Result<CaseSweep>
where
    F: FnMut(&Image) -> Result<Vec<Series>>,
{
    analysis.validate()?;
    let ncases = mesh.get_ncases(analysis.layout)?;
    if ncases == 0 {
        return Err(RadError::config("mesh has no analysis cases"));
    }
    if ncases > analysis.max_cases {
        return Err(RadError::config(format!(
            "{} analysis cases exceed the limit of {}",
            ncases, analysis.max_cases
        )));
    }

    let mut cases = Vec::with_capacity(ncases);
    for case in 0..ncases {
        let optics = MeshOptics::for_case(mesh, db, analysis.layout, case)?;
        let image = detector.trace_with(mesh, &optics, trace)?;
        let series = synthesize(&image)?;
        if series.len() != goal.len() {
            return Err(RadError::config(format!(
                "{} synthetic series for {} objectives",
                series.len(),
                goal.len()
            )));
        }
        for (i, s) in series.into_iter().enumerate() {
            goal.set_synthetic(i, Arc::new(s))?;
        }
        let scale = match analysis.scale {
            CaseScale::Fixed(s) => s,
            CaseScale::ClosedForm => goal.optimal_scale().unwrap_or(1.0),
        };
        let fitness = goal.consider_case(case, scale);
        debug!(case, scale, fitness, "case scored");
        cases.push(CaseRecord { case, scale, fitness });
    }

    let sweep = CaseSweep {
        layout: analysis.layout,
        ncases,
        best_case: goal.get_best_case(),
        best_fitness: goal.get_best_fitness(),
        best_scale: goal.get_best_scale(),
        cases,
    };
    info!(ncases, best_case = ?sweep.best_case, best_fitness = sweep.best_fitness, "case sweep done");
    Ok(sweep)
}

/// Trace the target, then fit a goal equal to the center lineout times
/// `goal_scale`
#[instrument(skip_all, fields(zones = ?cfg.zones, pixels = ?cfg.pixels))]
pub fn run(cfg: &RunConfig) -> Result<RunReport> {
    cfg.validate()?;
    let mesh = build_mesh(cfg)?;
    let db = build_database(cfg)?;
    let mut detector = build_detector(cfg)?;
    let image = detector.trace(&mesh, &db, &cfg.trace)?;

    let lineout_row = image.ny / 2;
    let synthetic = Arc::new(image.lineout_x(lineout_row)?);
    let target = Arc::new(synthetic.scaled(cfg.goal_scale));
    let lineout = || Objective::new("center-lineout", Arc::clone(&target), Arc::clone(&synthetic));
    let mut goal = Goal::new().with_objective(lineout());
    let search = cfg.search.run(&mut goal)?;
    let fit = goal.analyze(search.best_scale);
    info!(scale = search.best_scale, expected = cfg.goal_scale, "fit done");

    let cases = match &cfg.analysis {
        Some(analysis) => {
            let mut case_goal = Goal::new().with_objective(lineout());
            let sweep = analyze_cases(&mesh, &db, &mut detector, &mut case_goal, analysis, &cfg.trace, |img| {
                Ok(vec![img.lineout_x(lineout_row)?])
            })?;
            Some(sweep)
        }
        None => None,
    };

    Ok(RunReport {
        image,
        lineout_row,
        search,
        fit,
        cases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> RunConfig {
        RunConfig {
            zones: [3, 2, 2],
            pixels: [6, 4],
            ..Default::default()
        }
    }

    #[test]
    fn test_mesh_density_ramp() {
        let cfg = small();
        let mesh = build_mesh(&cfg).unwrap();
        assert_eq!(mesh.len(), 12);
        let np0 = mesh.zone(0).unwrap().material.np;
        let np2 = mesh.zone(2).unwrap().material.np;
        assert!((np0 - cfg.density).abs() < 1e-6 * cfg.density);
        assert!((np2 / np0 - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_run_recovers_goal_scale() {
        let cfg = small();
        let report = run(&cfg).unwrap();
        assert_eq!((report.image.nx, report.image.ny), (6, 4));
        assert_eq!(report.image.invalid_count(), 0);
        assert_eq!(report.lineout_row, 2);
        assert!((report.search.best_scale - cfg.goal_scale).abs() < 1e-6);
        assert!(report.fit.total < 1e-12);
        assert_eq!(report.fit.objectives[0].residuals.len(), 6);
    }

    #[test]
    fn test_case_sweep_finds_the_generating_case() {
        let cfg = RunConfig {
            zones: [2, 1, 1],
            pixels: [4, 2],
            analysis: Some(AnalysisConfig {
                layout: CaseLayout::Product,
                scale: CaseScale::Fixed(1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let analysis = cfg.analysis.clone().unwrap();
        let mesh = build_mesh(&cfg).unwrap();
        let db = build_database(&cfg).unwrap();
        let mut detector = build_detector(&cfg).unwrap();
        assert_eq!(mesh.get_ncases(CaseLayout::Product).unwrap(), 9);

        // Case 5: zone 0 at twice the run density, zone 1 at the run density
        let optics = MeshOptics::for_case(&mesh, &db, CaseLayout::Product, 5).unwrap();
        let truth = detector
            .trace_with(&mesh, &optics, &cfg.trace)
            .unwrap()
            .lineout_x(1)
            .unwrap();
        let truth = Arc::new(truth);
        let mut goal = Goal::new().with_objective(Objective::new("lineout", Arc::clone(&truth), truth));
        let sweep = analyze_cases(&mesh, &db, &mut detector, &mut goal, &analysis, &cfg.trace, |img| {
            Ok(vec![img.lineout_x(1)?])
        })
        .unwrap();

        assert_eq!(sweep.ncases, 9);
        assert_eq!(sweep.cases.len(), 9);
        assert_eq!(sweep.best_case, Some(5));
        assert_eq!(sweep.best_fitness, 0.0);
        assert!(sweep.cases.iter().filter(|c| c.case != 5).all(|c| c.fitness > 0.0));
        assert_eq!(goal.objective(0).unwrap().get_best_case(), Some(5));
    }

    #[test]
    fn test_case_sweep_limits() {
        let cfg = RunConfig {
            zones: [2, 1, 1],
            pixels: [2, 2],
            analysis: Some(AnalysisConfig {
                max_cases: 4,
                ..Default::default()
            }),
            ..Default::default()
        };
        let analysis = cfg.analysis.clone().unwrap();
        let mesh = build_mesh(&cfg).unwrap();
        let db = build_database(&cfg).unwrap();
        let mut detector = build_detector(&cfg).unwrap();
        let flat = Arc::new(Series::from_values(vec![1.0, 1.0]));
        let mut goal = Goal::new().with_objective(Objective::new("flat", Arc::clone(&flat), flat));

        // Per-zone layout: 2 zones × 3 densities
        let err = analyze_cases(&mesh, &db, &mut detector, &mut goal, &analysis, &cfg.trace, |img| {
            Ok(vec![img.lineout_x(0)?])
        })
        .unwrap_err();
        assert!(matches!(err, RadError::Config { .. }));

        let roomy = AnalysisConfig { max_cases: 6, ..analysis };
        let err = analyze_cases(&mesh, &db, &mut detector, &mut goal, &roomy, &cfg.trace, |_| Ok(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, RadError::Config { .. }));
    }

    #[test]
    fn test_run_with_analysis() {
        let cfg = RunConfig {
            analysis: Some(AnalysisConfig::default()),
            ..small()
        };
        let report = run(&cfg).unwrap();
        let sweep = report.cases.unwrap();
        assert_eq!(sweep.layout, CaseLayout::PerZone);
        assert_eq!(sweep.ncases, 36);
        assert_eq!(sweep.cases.len(), 36);
        // Zones at x index 0 already sit at the middle density point
        assert!(sweep.best_case.is_some());
        assert!(sweep.best_fitness < 1e-12);
        assert!((report.search.best_scale - cfg.goal_scale).abs() < 1e-6);
    }

    #[test]
    fn test_target_darkens_the_plate() {
        let cfg = small();
        let report = run(&cfg).unwrap();
        let line = report.image.lineout_x(report.lineout_row).unwrap();
        // Edge patches see the bare backlighter; the densest column the least
        let edge = line.y[0];
        assert!((line.y[5] - edge).abs() < 1e-9 * edge);
        assert!(line.y[4] < line.y[1]);
        assert!(line.y[1] < edge);
    }
}
