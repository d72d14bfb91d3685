//! Power-iteration ranking over a link matrix
//!
//! Both algorithms start from the all-ones vector, apply a pure step
//! function until every entry moves by less than `epsilon`, and normalize
//! each fresh vector by its largest entry (skipped when that entry is zero).
//! No teleportation or dangling-node correction is applied.

pub mod hits;
pub mod pagerank;

use crate::config::RankConfig;
use crate::events::{Event, EventSink, LogSink};
use crate::graph::matrix::LinkMatrix;
use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use hits::{hits_step, HitsState};
pub use pagerank::page_rank_step;

/// Scores from a single-vector ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankResult {
    /// Score per matrix index
    pub scores: Array1<f64>,
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the convergence test passed
    pub converged: bool,
}

impl RankResult {
    /// Indices of the `n` highest scores, best first
    pub fn top_n(&self, n: usize) -> Vec<(usize, f64)> {
        top_n(&self.scores, n)
    }
}

/// Hub and authority scores from HITS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsResult {
    pub hubs: Array1<f64>,
    pub auths: Array1<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl HitsResult {
    pub fn top_hubs(&self, n: usize) -> Vec<(usize, f64)> {
        top_n(&self.hubs, n)
    }

    pub fn top_auths(&self, n: usize) -> Vec<(usize, f64)> {
        top_n(&self.auths, n)
    }
}

/// `(index, score)` pairs of the `n` largest entries; ties keep index order
pub fn top_n(scores: &Array1<f64>, n: usize) -> Vec<(usize, f64)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        .take(n)
        .collect()
}

/// Divide by the largest entry unless it is exactly zero
pub fn normalize_by_max(v: &mut Array1<f64>) {
    if v.is_empty() {
        return;
    }
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max != 0.0 {
        v.mapv_inplace(|x| x / max);
    }
}

/// Whether every entry moved by less than `epsilon`
pub fn within_tolerance(new: &Array1<f64>, old: &Array1<f64>, epsilon: f64) -> bool {
    new.iter().zip(old.iter()).all(|(a, b)| (a - b).abs() < epsilon)
}

/// Largest absolute entry change, for progress reporting
pub fn max_delta(new: &Array1<f64>, old: &Array1<f64>) -> f64 {
    new.iter()
        .zip(old.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// Drives the power-iteration loop and reports progress
pub struct RankEngine<S = LogSink> {
    config: RankConfig,
    sink: S,
}

impl RankEngine<LogSink> {
    pub fn new(config: RankConfig) -> Self {
        Self {
            config,
            sink: LogSink,
        }
    }
}

impl<S: EventSink> RankEngine<S> {
    pub fn with_sink<T: EventSink>(self, sink: T) -> RankEngine<T> {
        RankEngine {
            config: self.config,
            sink,
        }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// PageRank-style ranking: `rank = damping * (M · rank)`, normalized
    pub fn page_rank<M: LinkMatrix>(&self, matrix: &M) -> RankResult {
        let damping = self.config.damping;
        let (scores, iterations, converged) = self.iterate(
            "pagerank",
            Array1::ones(matrix.dim()),
            |previous| page_rank_step(matrix, damping, previous),
            |new, old| (new, old),
        );

        RankResult {
            scores,
            iterations,
            converged,
        }
    }

    /// HITS hub and authority scores.
    ///
    /// Convergence is judged on the hub vector.
    pub fn hits<M: LinkMatrix>(&self, matrix: &M) -> HitsResult {
        let transpose = matrix.transpose();
        let (state, iterations, converged) = self.iterate(
            "hits",
            HitsState::ones(matrix.dim()),
            |previous| hits_step(matrix, &transpose, previous),
            |new, old| (&new.hubs, &old.hubs),
        );

        HitsResult {
            hubs: state.hubs,
            auths: state.auths,
            iterations,
            converged,
        }
    }

    /// Apply `step` until the vectors picked by `tracked` stop moving, or
    /// the iteration cap (if any) is hit
    fn iterate<T, F, P>(
        &self,
        algorithm: &'static str,
        initial: T,
        mut step: F,
        tracked: P,
    ) -> (T, usize, bool)
    where
        F: FnMut(&T) -> T,
        P: for<'a> Fn(&'a T, &'a T) -> (&'a Array1<f64>, &'a Array1<f64>),
    {
        let mut current = initial;
        let mut iterations = 0;

        let converged = loop {
            if let Some(cap) = self.config.max_iterations {
                if iterations >= cap {
                    break false;
                }
            }

            let next = step(&current);
            iterations += 1;

            let (new, old) = tracked(&next, &current);
            let done = within_tolerance(new, old, self.config.epsilon);
            self.sink.emit(Event::RankIteration {
                algorithm,
                iteration: iterations,
                max_delta: max_delta(new, old),
            });

            current = next;
            if done {
                break true;
            }
        };

        self.sink.emit(Event::RankFinished {
            algorithm,
            iterations,
            converged,
        });
        (current, iterations, converged)
    }
}
