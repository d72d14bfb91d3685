//! Structural analysis of a link matrix

use crate::graph::matrix::LinkMatrix;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Shape of a crawled graph, as reported by `inspect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub link_count: usize,

    /// Pairs of users following each other, counted once
    pub mutual_links: usize,

    /// Users with no outgoing links (their rows are all zero)
    pub dangling_nodes: usize,

    pub max_out_degree: usize,
    pub max_in_degree: usize,
    pub component_count: usize,
    pub largest_component: usize,
}

/// Copy a link matrix into a petgraph graph whose node weights are matrix
/// indices
pub fn to_digraph<M: LinkMatrix>(matrix: &M) -> DiGraph<usize, f64> {
    let mut graph = DiGraph::with_capacity(matrix.dim(), matrix.nnz());
    let nodes: Vec<NodeIndex> = (0..matrix.dim()).map(|i| graph.add_node(i)).collect();
    for (row, col, value) in matrix.cells() {
        graph.add_edge(nodes[row], nodes[col], value);
    }
    graph
}

/// Strongly connected components as lists of matrix indices, largest first
pub fn strongly_connected_components<M: LinkMatrix>(matrix: &M) -> Vec<Vec<usize>> {
    let graph = to_digraph(matrix);
    let mut components: Vec<Vec<usize>> = kosaraju_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut members: Vec<usize> = component.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();

    // Ties broken by smallest member so the order is reproducible
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
    components
}

/// Count reciprocal follows; self links are skipped
pub fn count_mutual_links<M: LinkMatrix>(matrix: &M) -> usize {
    let mut mutual = 0;
    for (src, dst, _) in matrix.cells() {
        // Only count in one direction to avoid duplicates
        if src < dst && matrix.get(dst, src) != 0.0 {
            mutual += 1;
        }
    }
    mutual
}

pub fn summarize<M: LinkMatrix>(matrix: &M) -> GraphSummary {
    let n = matrix.dim();
    log::info!("Summarizing {}x{} link matrix", n, n);

    let mut in_degree = vec![0usize; n];
    let mut out_degree = vec![0usize; n];
    for (row, col, _) in matrix.cells() {
        out_degree[row] += 1;
        in_degree[col] += 1;
    }

    let components = strongly_connected_components(matrix);

    GraphSummary {
        node_count: n,
        link_count: matrix.nnz(),
        mutual_links: count_mutual_links(matrix),
        dangling_nodes: out_degree.iter().filter(|&&d| d == 0).count(),
        max_out_degree: out_degree.iter().copied().max().unwrap_or(0),
        max_in_degree: in_degree.iter().copied().max().unwrap_or(0),
        component_count: components.len(),
        largest_component: components.first().map_or(0, |c| c.len()),
    }
}
