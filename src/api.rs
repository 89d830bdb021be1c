//! Python binding layer for split decomposition.
//!
//! Split systems cross the boundary in the extended Newick text format of
//! [`crate::newick`], so they can be stored or passed back in unchanged.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::compatibility::{ClassifierOptions, classify_with};
use crate::fit::compute_fit;
use crate::io::read_matrix_tsv;
use crate::matrix::SymmetricMatrix;
use crate::newick::{parse_splits, write_splits};
use crate::pipeline::{AnalysisOptions, analyze};
use crate::progress::NoProgress;
use crate::tree::splits_from_newick_tree;

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Compute the split decomposition of a square distance matrix.
///
/// Args:
///     distances: Square matrix as a list of rows
///     labels: Optional taxon names used in the output (default: 1..n)
///     seed: Seed for the circular ordering search (default: 42)
///     iterations: Annealing moves per chain (default: 20000)
///     chains: Parallel annealing chains (default: 4)
///     tolerance: Isolation indices at or below this count as zero (default: 1e-7)
///
/// Returns:
///     A tuple of (splits, compatibility, fit, cycle) where:
///     - splits is the split system in extended Newick form
///     - compatibility is one of "compatible", "cyclic", "weakly compatible", "incompatible"
///     - fit is a percentage, or None below four taxa
///     - cycle is the circular ordering of taxon ids (1-based)
///
/// Raises:
///     ValueError: If the matrix is not square, has negative or non-finite
///     entries, or the number of labels does not match
#[pyfunction]
#[pyo3(signature = (distances, labels=None, seed=42, iterations=20_000, chains=4, tolerance=1e-7))]
fn split_decomposition(
    distances: Vec<Vec<f64>>,
    labels: Option<Vec<String>>,
    seed: u64,
    iterations: usize,
    chains: usize,
    tolerance: f64,
) -> PyResult<(String, String, Option<f64>, Option<Vec<usize>>)> {
    if let Some(l) = &labels {
        if l.len() != distances.len() {
            return Err(PyValueError::new_err(format!(
                "{} labels for a matrix of {} taxa",
                l.len(),
                distances.len()
            )));
        }
    }

    let mut options = AnalysisOptions::default();
    options.decomposition.isolation_tolerance = tolerance;
    options.classifier.budget = options
        .classifier
        .budget
        .with_seed(seed)
        .with_iterations(iterations)
        .with_chains(chains);

    let system = analyze(&distances, &options, &mut NoProgress).map_err(value_error)?;
    Ok((
        write_splits(&system, labels.as_deref()),
        system.compatibility().to_string(),
        system.fit(),
        system.cycle().map(<[usize]>::to_vec),
    ))
}

/// Split decomposition of a labeled TSV distance matrix file.
///
/// Args:
///     path: Path to the TSV matrix (`.gz` accepted)
///
/// Returns:
///     Same tuple as `split_decomposition`, with the file's labels in the splits.
///
/// Raises:
///     IOError: If the file cannot be read or parsed
///     ValueError: If the matrix is invalid
#[pyfunction]
fn split_decomposition_file(path: String) -> PyResult<(String, String, Option<f64>, Option<Vec<usize>>)> {
    let (labels, rows) = read_matrix_tsv(&path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read '{path}': {e}")))?;
    split_decomposition(rows, Some(labels), 42, 20_000, 4, 1e-7)
}

/// Classify a split system given in extended Newick form.
///
/// Returns:
///     A tuple of (compatibility, cycle)
#[pyfunction]
fn classify_splits(splits: &str) -> PyResult<(String, Option<Vec<usize>>)> {
    let (_labels, system) = parse_splits(splits).map_err(value_error)?;
    let result = classify_with(system.splits(), system.ntax(), None, &ClassifierOptions::default());
    Ok((result.class.to_string(), result.cycle))
}

/// Fit (percentage) of a split system against a distance matrix.
///
/// Returns None when fewer than two taxon pairs exist or the sizes differ.
#[pyfunction]
fn split_fit(splits: &str, distances: Vec<Vec<f64>>) -> PyResult<Option<f64>> {
    let (_labels, system) = parse_splits(splits).map_err(value_error)?;
    let d = SymmetricMatrix::from_rows(&distances).map_err(value_error)?;
    Ok(compute_fit(system.splits(), &d, system.ntax()))
}

/// Convert a Newick tree into its split system in extended Newick form.
///
/// Leaves are numbered in alphabetical order of their names.
#[pyfunction]
fn tree_splits(newick: &str) -> PyResult<String> {
    let (labels, system) = splits_from_newick_tree(newick).map_err(value_error)?;
    Ok(write_splits(&system, Some(&labels)))
}

/// Python module definition
#[pymodule]
fn rust_python_split_systems(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(split_decomposition, m)?)?;
    m.add_function(wrap_pyfunction!(split_decomposition_file, m)?)?;
    m.add_function(wrap_pyfunction!(classify_splits, m)?)?;
    m.add_function(wrap_pyfunction!(split_fit, m)?)?;
    m.add_function(wrap_pyfunction!(tree_splits, m)?)?;
    Ok(())
}
