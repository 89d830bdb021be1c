//! Completion of missing trivial splits.

use crate::bitset::{Bitset, words_for};
use crate::split::{Split, TaxonId, bit};

/// Appends a trivial split with `default_weight` for every taxon not yet
/// isolated by one, in ascending taxon order.
///
/// Idempotent: a second call finds every taxon covered and adds nothing.
/// Returns the number of splits appended.
///
/// # Example
/// ```
/// # use rust_python_split_systems::split::Split;
/// # use rust_python_split_systems::trivial::complete_trivial;
/// let mut splits = vec![Split::new([2], 4, 1.0).unwrap()];
/// assert_eq!(complete_trivial(&mut splits, 4, 0.0), 3);
/// assert_eq!(complete_trivial(&mut splits, 4, 0.0), 0);
/// ```
pub fn complete_trivial(splits: &mut Vec<Split>, n: usize, default_weight: f64) -> usize {
    if n < 2 {
        return 0;
    }

    let mut covered = Bitset::zeros(words_for(n));
    for split in splits.iter() {
        mark_isolated(&mut covered, split, n);
    }

    let before = splits.len();
    for taxon in 1..=n {
        if covered.contains(bit(taxon)) {
            continue;
        }
        let split = Split::from_canonical_unchecked(trivial_side(taxon, n), n, default_weight);
        mark_isolated(&mut covered, &split, n);
        splits.push(split);
    }
    splits.len() - before
}

/// Marks the taxa isolated by `split`. With two taxa the one split isolates both.
fn mark_isolated(covered: &mut Bitset, split: &Split, n: usize) {
    if n == 2 {
        covered.set(bit(1));
        covered.set(bit(2));
    } else if let Some(taxon) = split.trivial_taxon() {
        covered.set(bit(taxon));
    }
}

/// Canonical side of the trivial split of `taxon`.
fn trivial_side(taxon: TaxonId, n: usize) -> Bitset {
    let single = Bitset::from_indices(n, [bit(taxon)]);
    if taxon == 1 { single.complement(n) } else { single }
}
