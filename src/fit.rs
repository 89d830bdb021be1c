//! Goodness of fit of a split system against the input distances.
//!
//! A split system induces a distance: `p(i,j)` is the total weight of the
//! splits separating `i` and `j`. The fit compares `p` with the input `d`:
//!
//! ```text
//! fit = 100 · (1 − Σ (d(i,j) − p(i,j))² / Σ d(i,j)²)      over pairs i < j
//! ```
//!
//! clamped to `[0, 100]`.

use rayon::prelude::*;

use crate::matrix::SymmetricMatrix;
use crate::split::{Split, TaxonId};

/// The split metric: `p(i,j) = Σ weight` over splits separating `i` and `j`.
pub fn induced_distances(splits: &[Split], n: usize) -> SymmetricMatrix {
    // One row per taxon, filled in parallel, then folded into the matrix.
    let rows: Vec<Vec<f64>> = (1..=n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..=n)
                .map(|j| {
                    splits
                        .iter()
                        .filter(|s| s.separates(i, j))
                        .map(Split::weight)
                        .sum()
                })
                .collect()
        })
        .collect();

    let mut induced = SymmetricMatrix::new(n);
    for (i, row) in (1..=n).zip(rows) {
        for (j, value) in ((i + 1)..=n).zip(row) {
            induced.set(i, j, value);
        }
    }
    induced
}

/// Percentage of the input distances reproduced by the split metric.
///
/// Returns `None` when there are fewer than two taxon pairs, or when the
/// matrix does not have `n` taxa. An all-zero matrix is fitted perfectly by
/// zero-weight splits and not at all otherwise.
pub fn compute_fit(splits: &[Split], distances: &SymmetricMatrix, n: usize) -> Option<f64> {
    if distances.ntax() != n || n * n.saturating_sub(1) / 2 < 2 {
        return None;
    }

    let induced = induced_distances(splits, n);
    let (mut sse, mut sst) = (0.0, 0.0);
    for (i, j, d) in distances.pairs() {
        let residual = d - induced.get(i, j);
        sse += residual * residual;
        sst += d * d;
    }

    if sst == 0.0 {
        return Some(if sse == 0.0 { 100.0 } else { 0.0 });
    }
    Some((100.0 * (1.0 - sse / sst)).clamp(0.0, 100.0))
}

/// Largest absolute residual `|d(i,j) − p(i,j)|` and the pair where it occurs.
pub fn max_residual(splits: &[Split], distances: &SymmetricMatrix) -> Option<(TaxonId, TaxonId, f64)> {
    let induced = induced_distances(splits, distances.ntax());
    distances
        .pairs()
        .map(|(i, j, d)| (i, j, (d - induced.get(i, j)).abs()))
        .max_by(|a, b| a.2.total_cmp(&b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quartet_tree() -> (Vec<Split>, SymmetricMatrix) {
        let splits = vec![
            Split::new([3, 4], 4, 1.0).unwrap(),
            Split::trivial(1, 4, 1.0).unwrap(),
            Split::trivial(2, 4, 1.0).unwrap(),
            Split::trivial(3, 4, 1.0).unwrap(),
            Split::trivial(4, 4, 1.0).unwrap(),
        ];
        let d = SymmetricMatrix::from_rows(&[
            vec![0.0, 2.0, 3.0, 3.0],
            vec![2.0, 0.0, 3.0, 3.0],
            vec![3.0, 3.0, 0.0, 2.0],
            vec![3.0, 3.0, 2.0, 0.0],
        ])
        .unwrap();
        (splits, d)
    }

    #[test]
    fn test_induced_distances() {
        let (splits, _) = quartet_tree();
        let p = induced_distances(&splits, 4);
        assert_eq!(p.get(1, 2), 2.0);
        assert_eq!(p.get(1, 3), 3.0);
        assert_eq!(p.get(3, 4), 2.0);
    }

    #[test]
    fn test_perfect_fit() {
        let (splits, d) = quartet_tree();
        assert_eq!(compute_fit(&splits, &d, 4), Some(100.0));
        let (_, _, residual) = max_residual(&splits, &d).unwrap();
        assert_eq!(residual, 0.0);
    }

    #[test]
    fn test_star_misses_internal_edge() {
        let (splits, d) = quartet_tree();
        let star: Vec<Split> = splits.into_iter().filter(Split::is_trivial).collect();
        let fit = compute_fit(&star, &d, 4).unwrap();
        // Residuals: 0 on {1,2} and {3,4}, 1 on the four crossing pairs.
        let expected = 100.0 * (1.0 - 4.0 / (4.0 + 4.0 + 4.0 * 9.0));
        assert!((fit - expected).abs() < 1e-12);
        assert!(fit < 100.0);
    }

    #[test]
    fn test_fit_is_clamped_and_optional() {
        let (_, d) = quartet_tree();
        let heavy = vec![Split::new([2], 4, 100.0).unwrap()];
        assert_eq!(compute_fit(&heavy, &d, 4), Some(0.0));

        assert_eq!(compute_fit(&[], &SymmetricMatrix::new(2), 2), None);
        assert_eq!(compute_fit(&[], &d, 5), None);
        assert_eq!(compute_fit(&[], &SymmetricMatrix::new(3), 3), Some(100.0));
    }
}
