//! # Fitting Layer
//!
//! Scores synthetic detector output against goal data.
//!
//! ```text
//! Series (goal) ──┐
//!                 ├─ Objective ─┐
//! Series (synth) ─┘             ├─ Goal ── ScaleSearch ── SearchResult
//!          ...    ─ Objective ──┘
//! ```
//!
//! Lower fitness is better. Evaluations that cannot be carried out return
//! `UNDEFINED_FITNESS` instead of an error so a search can rank them last.

pub mod algorithms;
pub mod goal;
pub mod objectives;

pub use algorithms::{ScaleSearch, SearchResult};
pub use goal::{Goal, GoalReport, ObjectiveReport};
pub use objectives::{FitMetric, FitRecord, Objective, Residual, Series};
