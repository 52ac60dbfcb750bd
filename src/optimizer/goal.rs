//! # Goal
//!
//! Weighted sum of objectives, minimized by varying a single scale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{SMALL, UNDEFINED_FITNESS};
use crate::error::{RadError, Result};
use crate::optimizer::objectives::{FitRecord, Objective, Residual, Series};

/// Detailed comparison of one objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveReport {
    pub name: String,
    pub weight: f64,
    pub fitness: f64,
    pub residuals: Vec<Residual>,
}

/// Per-objective breakdown of a goal at one scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalReport {
    pub scale: f64,
    pub total: f64,
    pub objectives: Vec<ObjectiveReport>,
}

/// Ordered collection of weighted objectives
#[derive(Debug, Clone, Default)]
pub struct Goal {
    objectives: Vec<Objective>,
    best: Option<FitRecord>,
    trials: usize,
}

impl Goal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, objective: Objective) {
        self.objectives.push(objective);
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.add(objective);
        self
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn objective(&self, i: usize) -> Result<&Objective> {
        self.objectives
            .get(i)
            .ok_or_else(|| RadError::out_of_range("objective", i, self.len()))
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Replace the synthetic series of objective `i`
    pub fn set_synthetic(&mut self, i: usize, synthetic: Arc<Series>) -> Result<()> {
        let n = self.len();
        let objective = self
            .objectives
            .get_mut(i)
            .ok_or_else(|| RadError::out_of_range("objective", i, n))?;
        objective.set_synthetic(synthetic);
        Ok(())
    }

    /// Σ weightᵢ·fitnessᵢ at `scale`, together with the unweighted terms
    pub fn fitness_breakdown(&self, scale: f64) -> (f64, Vec<f64>) {
        let per: Vec<f64> = self.objectives.iter().map(|o| o.get_fitness(scale)).collect();
        if per.is_empty() {
            warn!("goal has no objectives, fitness undefined");
            return (UNDEFINED_FITNESS, per);
        }
        if per.iter().any(|&f| f >= UNDEFINED_FITNESS) {
            return (UNDEFINED_FITNESS, per);
        }
        let total = self
            .objectives
            .iter()
            .zip(&per)
            .map(|(o, f)| o.weight() * f)
            .sum();
        (total, per)
    }

    pub fn get_fitness(&self, scale: f64) -> f64 {
        self.fitness_breakdown(scale).0
    }

    /// Unweighted fitness of objective `i` at `scale`
    pub fn get_fitness_at(&self, i: usize, scale: f64) -> Result<f64> {
        Ok(self.objective(i)?.get_fitness(scale))
    }

    /// Score `scale` and update every best record
    pub fn evaluate(&mut self, scale: f64) -> f64 {
        let (total, per) = self.fitness_breakdown(scale);
        self.consider_trial(scale, total, &per);
        total
    }

    /// Record a trial scored elsewhere; returns true if it became the best
    pub fn consider_trial(&mut self, scale: f64, total: f64, per_objective: &[f64]) -> bool {
        self.record(scale, total, per_objective, None)
    }

    /// Score analysis case `case` at `scale` against the current synthetic
    /// series and update every best record
    pub fn consider_case(&mut self, case: usize, scale: f64) -> f64 {
        let (total, per) = self.fitness_breakdown(scale);
        self.record(scale, total, &per, Some(case));
        total
    }

    fn record(&mut self, scale: f64, total: f64, per_objective: &[f64], case: Option<usize>) -> bool {
        let trial = self.trials;
        let tag = |r: FitRecord| match case {
            Some(c) => r.with_case(c),
            None => r,
        };
        for (o, &f) in self.objectives.iter_mut().zip(per_objective) {
            o.consider_candidate(tag(FitRecord::new(f, scale, trial)));
        }
        self.consider_candidate(tag(FitRecord::new(total, scale, trial)))
    }

    /// Replace the aggregate best only on strict improvement
    pub fn consider_candidate(&mut self, record: FitRecord) -> bool {
        self.trials += 1;
        let better = record.improves_on(self.best.as_ref());
        if better {
            self.best = Some(record);
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

    /// Analysis case of the best record, if it came from a case sweep
    pub fn get_best_case(&self) -> Option<usize> {
        self.best.and_then(|b| b.case)
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.objectives.iter().position(|o| o.name() == name)
    }

    /// Best scale of the named objective, 1 if there is none
    pub fn get_best_scale_of(&self, name: &str) -> f64 {
        self.get_index(name)
            .map_or(1.0, |i| self.objectives[i].get_best_scale())
    }

    /// Closed-form scale minimizing the weighted squared residuals of all
    /// objectives together
    pub fn optimal_scale(&self) -> Option<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        for o in &self.objectives {
            let (n, d) = o.normal_terms()?;
            num += o.weight() * n;
            den += o.weight() * d;
        }
        if den > SMALL {
            Some(num / den)
        } else {
            None
        }
    }

    pub fn analyze(&self, scale: f64) -> GoalReport {
        let (total, per) = self.fitness_breakdown(scale);
        GoalReport {
            scale,
            total,
            objectives: self
                .objectives
                .iter()
                .zip(per)
                .map(|(o, fitness)| ObjectiveReport {
                    name: o.name().to_string(),
                    weight: o.weight(),
                    fitness,
                    residuals: o.residuals(scale),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::objectives::{FitMetric, Series};
    use std::sync::Arc;

    fn objective(name: &str, goal: &[f64], syn: &[f64], weight: f64) -> Objective {
        Objective::new(
            name,
            Arc::new(Series::from_values(goal.to_vec())),
            Arc::new(Series::from_values(syn.to_vec())),
        )
        .with_weight(weight)
        .with_metric(FitMetric::Squared)
    }

    #[test]
    fn test_weighted_sum() {
        let goal = Goal::new()
            .with_objective(objective("a", &[0.0, 0.0], &[1.0, 1.0], 0.5))
            .with_objective(objective("b", &[0.0], &[2.0], 1.5));
        assert!((goal.get_fitness_at(0, 1.0).unwrap() - 2.0).abs() < 1e-12);
        assert!((goal.get_fitness_at(1, 1.0).unwrap() - 4.0).abs() < 1e-12);
        assert!((goal.get_fitness(1.0) - 7.0).abs() < 1e-12);
        assert!(goal.get_fitness_at(2, 1.0).is_err());

        // Order does not change the result
        let swapped = Goal::new()
            .with_objective(objective("b", &[0.0], &[2.0], 1.5))
            .with_objective(objective("a", &[0.0, 0.0], &[1.0, 1.0], 0.5));
        assert!((swapped.get_fitness(1.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_propagates() {
        let mut goal = Goal::new();
        assert_eq!(goal.get_fitness(1.0), UNDEFINED_FITNESS);
        goal.add(objective("ok", &[1.0], &[1.0], 1.0));
        goal.add(objective("empty", &[], &[], 1.0));
        assert_eq!(goal.get_fitness(1.0), UNDEFINED_FITNESS);
        assert_eq!(goal.get_fitness_at(0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_best_tracking_and_lookup() {
        let mut goal = Goal::new()
            .with_objective(objective("a", &[2.0, 4.0], &[1.0, 2.0], 1.0))
            .with_objective(objective("b", &[3.0], &[1.0], 1.0));
        for scale in [1.0, 3.0, 2.5, 2.0] {
            goal.evaluate(scale);
        }
        // a prefers 2, b prefers 3; of the trials the sum is smallest at 2
        assert_eq!(goal.get_best_scale(), 2.0);
        assert_eq!(goal.get_best_scale_of("a"), 2.0);
        assert_eq!(goal.get_best_scale_of("b"), 3.0);
        assert_eq!(goal.get_best_scale_of("missing"), 1.0);
        assert_eq!(goal.get_index("b"), Some(1));
        assert_eq!(goal.trials(), 4);
        assert_eq!(goal.best().map(|b| b.trial), Some(3));
    }

    #[test]
    fn test_case_tracking() {
        let mut goal = Goal::new().with_objective(objective("a", &[2.0, 4.0], &[0.0, 0.0], 1.0));
        assert_eq!(goal.get_best_case(), None);
        for (case, syn) in [[1.0, 1.0], [1.0, 2.0], [3.0, 3.0]].into_iter().enumerate() {
            goal.set_synthetic(0, Arc::new(Series::from_values(syn.to_vec()))).unwrap();
            goal.consider_case(case, 2.0);
        }
        assert_eq!(goal.get_best_case(), Some(1));
        assert_eq!(goal.get_best_fitness(), 0.0);
        assert_eq!(goal.objective(0).unwrap().get_best_case(), Some(1));
        assert_eq!(goal.trials(), 3);
        assert!(goal.set_synthetic(1, Arc::new(Series::default())).is_err());
    }

    #[test]
    fn test_optimal_scale_and_analysis() {
        let goal = Goal::new()
            .with_objective(objective("a", &[2.0, 4.0], &[1.0, 2.0], 1.0))
            .with_objective(objective("b", &[2.0], &[1.0], 3.0));
        assert!((goal.optimal_scale().unwrap() - 2.0).abs() < 1e-12);

        let report = goal.analyze(1.0);
        assert_eq!(report.objectives.len(), 2);
        assert!((report.total - (5.0 + 3.0)).abs() < 1e-12);
        assert!((report.objectives[0].residuals[1].residual - 2.0).abs() < 1e-12);
        let json = serde_json::to_string(&report).unwrap();
        let back: GoalReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
