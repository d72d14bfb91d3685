//! Hub and authority scores (HITS)

use super::normalize_by_max;
use crate::graph::matrix::LinkMatrix;
use ndarray::Array1;

/// Hub and authority vectors carried between iterations
#[derive(Debug, Clone, PartialEq)]
pub struct HitsState {
    pub hubs: Array1<f64>,
    pub auths: Array1<f64>,
}

impl HitsState {
    pub fn ones(n: usize) -> Self {
        Self {
            hubs: Array1::ones(n),
            auths: Array1::ones(n),
        }
    }
}

/// One HITS round.
///
/// Authorities are refreshed from the previous hubs (`Mᵀ · hubs`), then hubs
/// from the fresh authorities (`M · auths`). Each vector is normalized by its
/// maximum. `transpose` must be `matrix.transpose()`.
pub fn hits_step<M: LinkMatrix>(matrix: &M, transpose: &M, previous: &HitsState) -> HitsState {
    let mut auths = transpose.mul_vec(&previous.hubs);
    normalize_by_max(&mut auths);

    let mut hubs = matrix.mul_vec(&auths);
    normalize_by_max(&mut hubs);

    HitsState { hubs, auths }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankConfig;
    use crate::events::RecordingSink;
    use crate::graph::matrix::{DenseMatrix, SparseMatrix};
    use crate::rank::RankEngine;
    use ndarray::arr2;

    fn five_nodes() -> DenseMatrix {
        DenseMatrix::from_array(arr2(&[
            [0.0, 1.0, 1.0, 1.0, 0.0],
            [1.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
        ]))
        .unwrap()
    }

    #[test]
    fn test_first_step() {
        let matrix = five_nodes();
        let state = hits_step(&matrix, &matrix.transpose(), &HitsState::ones(5));

        // In-degrees are [1, 2, 2, 2, 1]
        assert_eq!(state.auths.to_vec(), vec![0.5, 1.0, 1.0, 1.0, 0.5]);
        assert_eq!(state.hubs[0], 1.0);
        assert_eq!(state.hubs[4], 0.0);
    }

    #[test]
    fn test_five_node_graph() {
        let engine = RankEngine::new(RankConfig::default()).with_sink(RecordingSink::new());
        let result = engine.hits(&five_nodes());

        assert!(result.converged);
        assert!(result.iterations < 100);

        let hubs = [1.0, 0.35896, 1.37e-5, 0.71617, 0.0];
        let auths = [0.20979, 1.0, 1.0, 0.79265, 3.8e-5];
        for (got, want) in result.hubs.iter().zip(hubs) {
            assert!((got - want).abs() < 1e-3, "hub {got} vs {want}");
        }
        for (got, want) in result.auths.iter().zip(auths) {
            assert!((got - want).abs() < 1e-3, "auth {got} vs {want}");
        }

        let top_hubs: Vec<usize> = result.top_hubs(2).into_iter().map(|(i, _)| i).collect();
        assert_eq!(top_hubs, vec![0, 3]);
        let best = result.auths[1];
        assert!(result.auths.iter().all(|&a| best >= a));

        assert!(!engine.sink().events().is_empty());
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let dense = five_nodes();
        let sparse: SparseMatrix = dense.convert().unwrap();
        let engine = RankEngine::new(RankConfig::default());

        let a = engine.hits(&dense);
        let b = engine.hits(&sparse);
        assert_eq!(a.iterations, b.iterations);
        for (x, y) in a.hubs.iter().zip(b.hubs.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
        for (x, y) in a.auths.iter().zip(b.auths.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_matrix() {
        let result = RankEngine::new(RankConfig::default()).hits(&SparseMatrix::empty(3));

        assert!(result.converged);
        assert!(result.iterations <= 2);
        assert!(result.hubs.iter().all(|&h| h == 0.0));
        assert!(result.auths.iter().all(|&a| a == 0.0));
    }
}
