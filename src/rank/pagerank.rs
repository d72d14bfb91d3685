//! PageRank-style power iteration without teleportation

use super::normalize_by_max;
use crate::graph::matrix::LinkMatrix;
use ndarray::Array1;

/// One iteration: `damping * (M · previous)`, normalized by its maximum.
///
/// Dangling rows simply contribute nothing; no probability mass is
/// redistributed.
pub fn page_rank_step<M: LinkMatrix>(matrix: &M, damping: f64, previous: &Array1<f64>) -> Array1<f64> {
    let mut next = matrix.mul_vec(previous);
    next.mapv_inplace(|x| damping * x);
    normalize_by_max(&mut next);
    next
}
