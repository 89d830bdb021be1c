//! End-to-end analysis: distances in, annotated split system out.
//!
//! ```text
//! rows ─► SymmetricMatrix ─► decompose ─► classify ─► fit ─► SplitSystem
//! ```

use log::debug;

use crate::compatibility::{ClassifierOptions, annotate_with_progress};
use crate::decomposer::{DecompositionOptions, decompose_with};
use crate::error::Result;
use crate::fit::compute_fit;
use crate::matrix::SymmetricMatrix;
use crate::progress::Progress;
use crate::split_system::SplitSystem;

/// Options for every stage of [`analyze`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    pub decomposition: DecompositionOptions,
    pub classifier: ClassifierOptions,
}

/// Decomposes a square distance matrix and annotates the result with its
/// compatibility class, circular ordering and fit.
///
/// The fit is left unset below four taxa.
///
/// `progress` is polled once per taxon during decomposition and every
/// [`crate::ordering::POLL_INTERVAL`] moves of the ordering search.
///
/// # Errors
/// Matrix validation errors from [`SymmetricMatrix::from_rows`], anything
/// [`decompose_with`] returns, and [`crate::DecompositionError::Cancelled`]
/// if cancellation is requested at any stage.
pub fn analyze(
    rows: &[Vec<f64>],
    options: &AnalysisOptions,
    progress: &mut (dyn Progress + Sync),
) -> Result<SplitSystem> {
    let distances = SymmetricMatrix::from_rows(rows)?;
    analyze_matrix(&distances, options, progress)
}

/// [`analyze`] for an already validated matrix.
pub fn analyze_matrix(
    distances: &SymmetricMatrix,
    options: &AnalysisOptions,
    progress: &mut (dyn Progress + Sync),
) -> Result<SplitSystem> {
    let n = distances.ntax();
    let mut system = decompose_with(distances, n, &options.decomposition, progress)?;
    debug!("decomposition of {n} taxa produced {} splits", system.len());

    progress.check_cancelled()?;
    let class = annotate_with_progress(&mut system, &options.classifier, &*progress)?;
    debug!("split system is {class}");

    if n >= 4 {
        system.set_fit(compute_fit(system.splits(), distances, n));
    }
    Ok(system)
}
