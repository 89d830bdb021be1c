//! Symmetric distance matrices indexed by taxon.
//!
//! Taxa are addressed 1-based (`1..=n`), matching [`crate::split::TaxonId`].
//! Only the strict upper triangle is stored; the diagonal is implicitly zero.

use log::warn;

use crate::error::{DecompositionError, Result};
use crate::split::TaxonId;

/// Differences below this between `d(i,j)` and `d(j,i)` are not reported.
pub const ASYMMETRY_TOLERANCE: f64 = 1e-9;

/// A symmetric, zero-diagonal matrix of pairwise taxon distances.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricMatrix {
    ntax: usize,
    // Row-major strict upper triangle: (1,2), (1,3), ..., (1,n), (2,3), ...
    values: Vec<f64>,
}

impl SymmetricMatrix {
    /// An `n × n` matrix of zeros.
    pub fn new(ntax: usize) -> Self {
        Self {
            ntax,
            values: vec![0.0; ntax * ntax.saturating_sub(1) / 2],
        }
    }

    /// Builds a matrix from full rows (row `i` holds distances of taxon `i + 1`).
    ///
    /// This is the symmetrization pre-pass: off-diagonal pairs are averaged,
    /// and detected asymmetry or a non-zero diagonal is logged as a warning
    /// rather than rejected.
    ///
    /// # Errors
    /// - [`DecompositionError::Shape`] if the rows do not form a square matrix.
    /// - [`DecompositionError::SaturatedInput`] for negative or non-finite entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(DecompositionError::shape(format!(
                "distance matrix is not square: row {} has {} entries, expected {n}",
                i + 1,
                row.len()
            )));
        }

        for (i, row) in rows.iter().enumerate() {
            for (j, &d) in row.iter().enumerate() {
                if !d.is_finite() || d < 0.0 {
                    return Err(DecompositionError::saturated_input(format!(
                        "distance d({},{}) = {d} is not a finite non-negative value",
                        i + 1,
                        j + 1
                    )));
                }
            }
        }

        let asymmetry = asymmetry(rows);
        if asymmetry > ASYMMETRY_TOLERANCE {
            warn!("distance matrix is not symmetric (max |d(i,j) - d(j,i)| = {asymmetry}); averaging");
        }
        if rows.iter().enumerate().any(|(i, r)| r[i] != 0.0) {
            warn!("distance matrix has a non-zero diagonal; treating it as zero");
        }

        let mut matrix = Self::new(n);
        for i in 1..=n {
            for j in (i + 1)..=n {
                matrix.set(i, j, 0.5 * (rows[i - 1][j - 1] + rows[j - 1][i - 1]));
            }
        }
        Ok(matrix)
    }

    /// Number of taxa.
    pub fn ntax(&self) -> usize {
        self.ntax
    }

    #[inline]
    fn index(&self, a: TaxonId, b: TaxonId) -> usize {
        let (i, j) = if a < b { (a - 1, b - 1) } else { (b - 1, a - 1) };
        // Offset of row i in the condensed layout plus column within the row.
        i * (2 * self.ntax - i - 1) / 2 + (j - i - 1)
    }

    /// Distance between taxa `a` and `b` (1-based).
    #[inline]
    pub fn get(&self, a: TaxonId, b: TaxonId) -> f64 {
        if a == b {
            0.0
        } else {
            self.values[self.index(a, b)]
        }
    }

    /// Sets `d(a,b) = d(b,a) = value`. Writes to the diagonal are ignored.
    pub fn set(&mut self, a: TaxonId, b: TaxonId, value: f64) {
        if a != b {
            let idx = self.index(a, b);
            self.values[idx] = value;
        }
    }

    /// Expands back into full rows, 0-based.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (1..=self.ntax)
            .map(|i| (1..=self.ntax).map(|j| self.get(i, j)).collect())
            .collect()
    }

    /// Iterates `(i, j, d(i,j))` over all pairs `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (TaxonId, TaxonId, f64)> + '_ {
        (1..=self.ntax).flat_map(move |i| ((i + 1)..=self.ntax).map(move |j| (i, j, self.get(i, j))))
    }
}

/// Largest `|d(i,j) - d(j,i)|` over a square matrix given as rows.
pub fn asymmetry(rows: &[Vec<f64>]) -> f64 {
    let mut max = 0.0f64;
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            let (a, b) = (rows[i].get(j), rows[j].get(i));
            if let (Some(a), Some(b)) = (a, b) {
                max = max.max((a - b).abs());
            }
        }
    }
    max
}
