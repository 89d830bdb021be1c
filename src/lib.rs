//! Crate root: module orchestration and public re-exports.
//!
//! Split decomposition turns a distance matrix into a weighted system of
//! splits (bipartitions of the taxa), which is then classified and scored.
//!
//! Modules:
//! - `bitset`: compact bitset representation for split sides.
//! - `split`, `split_system`: the data model.
//! - `decomposer`: split decomposition of a distance matrix.
//! - `trivial`: completion of missing single-taxon splits.
//! - `compatibility`: compatible / cyclic / weakly compatible classification.
//! - `ordering`: circular ordering search by simulated annealing.
//! - `fit`: split metric and goodness of fit.
//! - `newick`: text interchange format for split systems.
//! - `tree`: split systems of phylogenetic trees.
//! - `pipeline`: the full analysis in one call.
//! - `io`: TSV matrix reading/writing and split-system output.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod compatibility;
pub mod decomposer;
pub mod error;
pub mod fit;
pub mod io;
pub mod matrix;
pub mod newick;
pub mod ordering;
pub mod pipeline;
pub mod progress;
pub mod split;
pub mod split_system;
pub mod tree;
pub mod trivial;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use compatibility::{
    ClassifierOptions, Classification, annotate, annotate_with_progress, classify, classify_with, classify_with_progress,
};
pub use decomposer::{DecompositionOptions, decompose, decompose_with};
pub use error::{DecompositionError, ParseError, Result};
pub use fit::{compute_fit, induced_distances};
pub use io::{read_matrix_tsv, write_matrix_tsv, write_splits_file};
pub use matrix::SymmetricMatrix;
pub use newick::{parse_splits, write_splits};
pub use ordering::{CycleSearch, SearchBudget, find_cycle};
pub use pipeline::{AnalysisOptions, analyze, analyze_matrix};
pub use progress::{CallbackProgress, CancellationToken, NoProgress, Progress};
pub use split::{Split, TaxonId};
pub use split_system::{CompatibilityClass, SplitSystem};
pub use tree::{splits_from_newick_tree, splits_from_tree};
pub use trivial::complete_trivial;
