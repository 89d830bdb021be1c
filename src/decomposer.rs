//! Split decomposition of a distance matrix (Bandelt & Dress 1992).
//!
//! # Algorithm
//! Taxa are added one at a time. After taxon `t - 1` we hold every split of
//! the taxa `{1..t-1}` with a positive isolation index. Adding `t`:
//!
//! 1. `{t} | {1..t-1}` is a candidate, weighted by its isolation index.
//! 2. Every previous split `A | B` yields two candidates, `A ∪ {t} | B` and
//!    `A | B ∪ {t}`, weighted by `min(previous weight, isolation index)`.
//! 3. Candidates with a positive weight form the next generation.
//!
//! Each generation is a fresh `Vec`; generation `t` reads only the frozen
//! generation `t - 1`, so its candidates are computed in parallel.
//!
//! # Isolation index
//! For taxa `t, i` on one side and `j, k` on the other:
//! ```text
//! β(t,i | j,k) = ½ (max(d(t,j) + d(i,k), d(t,k) + d(i,j)) − d(t,i) − d(j,k))
//! ```
//! The index of a candidate is the minimum of β over all quadruples that
//! involve `t`; as soon as one β drops to the tolerance the candidate is
//! rejected.

use log::debug;
use rayon::prelude::*;

use crate::bitset::Bitset;
use crate::error::{DecompositionError, Result};
use crate::matrix::SymmetricMatrix;
use crate::progress::Progress;
use crate::split::{Split, TaxonId, bit};
use crate::split_system::SplitSystem;
use crate::trivial::complete_trivial;

/// Isolation indices at or below this are treated as zero.
pub const DEFAULT_ISOLATION_TOLERANCE: f64 = 1e-7;

/// Tunables for [`decompose_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecompositionOptions {
    pub isolation_tolerance: f64,
}

impl Default for DecompositionOptions {
    fn default() -> Self {
        Self {
            isolation_tolerance: DEFAULT_ISOLATION_TOLERANCE,
        }
    }
}

/// A split of the taxa seen so far. `side` never contains taxon 1.
#[derive(Debug, Clone)]
struct Candidate {
    side: Bitset,
    weight: f64,
}

/// Computes the split decomposition of `distances` with default options.
///
/// See [`decompose_with`].
pub fn decompose(
    distances: &SymmetricMatrix,
    n: usize,
    progress: &mut dyn Progress,
) -> Result<SplitSystem> {
    decompose_with(distances, n, &DecompositionOptions::default(), progress)
}

/// Computes the split decomposition of `distances`.
///
/// Every taxon ends up with its trivial split (weight 0 when the distances
/// do not support it). The returned system is unclassified.
///
/// For fewer than four taxa only trivial splits exist; their weights are the
/// pendant lengths of the unique tree on those taxa.
///
/// # Errors
/// - [`DecompositionError::DegenerateInput`] when `n == 0`.
/// - [`DecompositionError::Shape`] when the matrix is not `n × n`.
/// - [`DecompositionError::Cancelled`] when `progress` reports cancellation,
///   polled once per taxon.
pub fn decompose_with(
    distances: &SymmetricMatrix,
    n: usize,
    options: &DecompositionOptions,
    progress: &mut dyn Progress,
) -> Result<SplitSystem> {
    if n == 0 {
        return Err(DecompositionError::degenerate_input(
            "split decomposition needs at least one taxon",
        ));
    }
    if distances.ntax() != n {
        return Err(DecompositionError::shape(format!(
            "distance matrix covers {} taxa, expected {n}",
            distances.ntax()
        )));
    }
    if n < 4 {
        return SplitSystem::from_splits(n, small_splits(distances, n, options.isolation_tolerance));
    }

    let tolerance = options.isolation_tolerance;
    let mut previous: Vec<Candidate> = Vec::new();
    let mut previous_taxa = Bitset::from_indices(n, [bit(1)]);
    progress.report(1, n);

    for t in 2..=n {
        progress.check_cancelled()?;

        let next = next_generation(distances, t, &previous, &previous_taxa, tolerance);
        debug!("taxon {t}: {} splits (previous generation {})", next.len(), previous.len());

        previous = next;
        previous_taxa.set(bit(t));
        progress.report(t, n);
    }

    let mut splits: Vec<Split> = previous
        .into_iter()
        .map(|c| Split::from_canonical_unchecked(c.side, n, c.weight))
        .collect();
    let added = complete_trivial(&mut splits, n, 0.0);
    if added > 0 {
        debug!("added {added} unsupported trivial splits with weight 0");
    }
    SplitSystem::from_splits(n, splits)
}

/// Builds the generation of splits over `{1..t}` from the one over `{1..t-1}`.
fn next_generation(
    d: &SymmetricMatrix,
    t: TaxonId,
    previous: &[Candidate],
    previous_taxa: &Bitset,
    tolerance: f64,
) -> Vec<Candidate> {
    let n = d.ntax();
    let members: Vec<TaxonId> = taxa_of(previous_taxa);

    let mut next = Vec::with_capacity(2 * previous.len() + 1);
    let weight = isolation_index(d, t, &[t], &members, tolerance);
    if weight > 0.0 {
        next.push(Candidate {
            side: Bitset::from_indices(n, [bit(t)]),
            weight,
        });
    }

    // Ordered collect: the generation keeps the order of its parents.
    let refined: Vec<Candidate> = previous
        .par_iter()
        .flat_map_iter(|split| refine(d, t, split, previous_taxa, tolerance))
        .collect();
    next.extend(refined);
    next
}

/// Tries `A ∪ {t} | B` and `A | B ∪ {t}` for a previous split `A | B`.
fn refine(
    d: &SymmetricMatrix,
    t: TaxonId,
    split: &Candidate,
    previous_taxa: &Bitset,
    tolerance: f64,
) -> Vec<Candidate> {
    let a = taxa_of(&split.side);
    let b: Vec<TaxonId> = previous_taxa
        .iter_ones()
        .filter(|&x| !split.side.contains(x))
        .map(|x| x + 1)
        .collect();

    let mut out = Vec::with_capacity(2);

    let joined_a = split.weight.min(isolation_index(d, t, &a, &b, tolerance));
    if joined_a > 0.0 {
        let mut side = split.side.clone();
        side.set(bit(t));
        out.push(Candidate { side, weight: joined_a });
    }

    let joined_b = split.weight.min(isolation_index(d, t, &b, &a, tolerance));
    if joined_b > 0.0 {
        out.push(Candidate {
            side: split.side.clone(),
            weight: joined_b,
        });
    }
    out
}

/// Isolation index of `{t} ∪ same | other`, restricted to quadruples with `t`.
///
/// Returns 0 as soon as any quadruple is at or below `tolerance`.
pub fn isolation_index(
    d: &SymmetricMatrix,
    t: TaxonId,
    same: &[TaxonId],
    other: &[TaxonId],
    tolerance: f64,
) -> f64 {
    let mut min = f64::INFINITY;
    for &i in same {
        for (jx, &j) in other.iter().enumerate() {
            // β is symmetric in (j, k).
            for &k in &other[jx..] {
                let value = quartet_index(d, t, i, j, k);
                if value < min {
                    if value <= tolerance {
                        return 0.0;
                    }
                    min = value;
                }
            }
        }
    }
    if min.is_finite() { min } else { 0.0 }
}

/// β(t,i | j,k) for a single quadruple (taxa may repeat across sides' pairs).
#[inline]
pub fn quartet_index(d: &SymmetricMatrix, t: TaxonId, i: TaxonId, j: TaxonId, k: TaxonId) -> f64 {
    let cross = (d.get(t, j) + d.get(i, k)).max(d.get(t, k) + d.get(i, j));
    0.5 * (cross - d.get(t, i) - d.get(j, k))
}

/// Trivial splits for `n < 4` with their pendant lengths.
fn small_splits(d: &SymmetricMatrix, n: usize, tolerance: f64) -> Vec<Split> {
    let clamp = |w: f64| if w <= tolerance { 0.0 } else { w };
    match n {
        2 => vec![Split::from_canonical_unchecked(
            Bitset::from_indices(2, [bit(2)]),
            2,
            clamp(d.get(1, 2)),
        )],
        3 => (1..=3)
            .map(|x| {
                let (y, z) = match x {
                    1 => (2, 3),
                    2 => (1, 3),
                    _ => (1, 2),
                };
                let weight = clamp(0.5 * (d.get(x, y) + d.get(x, z) - d.get(y, z)));
                let side = if x == 1 {
                    Bitset::from_indices(3, [bit(2), bit(3)])
                } else {
                    Bitset::from_indices(3, [bit(x)])
                };
                Split::from_canonical_unchecked(side, 3, weight)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn taxa_of(set: &Bitset) -> Vec<TaxonId> {
    set.iter_ones().map(|b| b + 1).collect()
}
