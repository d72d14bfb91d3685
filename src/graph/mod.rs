//! Crawl data, link matrices and their construction

pub mod algorithms;
pub mod builder;
pub mod dataset;
pub mod matrix;
pub mod ordered;

pub use algorithms::GraphSummary;
pub use builder::{IndexMap, MatrixBuilder};
pub use dataset::{Adjacency, AdjacencyEntry, Dataset, Visited, VisitState};
pub use matrix::{Cell, DenseMatrix, LinkMatrix, SparseMatrix};
pub use ordered::OrderedMap;
