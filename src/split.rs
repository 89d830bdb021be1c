//! Splits: weighted bipartitions of the taxon set `{1..n}`.
//!
//! # Canonicalization
//! A split {A}|{B} can be written two ways. We always store the side that does
//! NOT contain taxon 1, so `{1,2}|{3,4}` and `{3,4}|{1,2}` both become the side
//! `{3,4}`. Equality and hashing look only at this canonical side and `n`;
//! weight and confidence do not take part.
//!
//! ```text
//! taxa:      1 2 3 4
//! {1,2}|{3,4} → side {3,4} → bits 0b1100
//! {3,4}|{1,2} → side {3,4} → bits 0b1100
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::bitset::{Bitset, words_for};
use crate::error::{DecompositionError, Result};

/// 1-based taxon identifier.
pub type TaxonId = usize;

#[inline]
pub(crate) fn bit(taxon: TaxonId) -> usize {
    taxon - 1
}

/// A weighted bipartition of `{1..ntax}`.
#[derive(Debug, Clone)]
pub struct Split {
    side: Bitset,
    ntax: usize,
    weight: f64,
    confidence: Option<f64>,
}

impl Split {
    /// Creates a split from the taxa of either side.
    ///
    /// # Errors
    /// Returns [`DecompositionError::Shape`] if a taxon is outside `1..=ntax`,
    /// or if the given side is empty or covers every taxon.
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::split::Split;
    /// let a = Split::new([1, 2], 4, 1.5).unwrap();
    /// let b = Split::new([3, 4], 4, 0.5).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.side_taxa(), vec![3, 4]);
    /// ```
    pub fn new<I: IntoIterator<Item = TaxonId>>(taxa: I, ntax: usize, weight: f64) -> Result<Self> {
        let mut side = Bitset::zeros(words_for(ntax));
        for t in taxa {
            if t == 0 || t > ntax {
                return Err(DecompositionError::shape(format!(
                    "taxon {t} is outside 1..={ntax}"
                )));
            }
            side.set(bit(t));
        }
        Self::from_bitset(side, ntax, weight)
    }

    /// Creates a split from a bitset over bits `0..ntax` (bit `i` is taxon `i + 1`).
    pub fn from_bitset(side: Bitset, ntax: usize, weight: f64) -> Result<Self> {
        if side.0.len() != words_for(ntax) || side.iter_ones().any(|b| b >= ntax) {
            return Err(DecompositionError::shape(format!(
                "split side does not fit a universe of {ntax} taxa"
            )));
        }
        let size = side.count_ones();
        if size == 0 || size == ntax {
            return Err(DecompositionError::shape(
                "both sides of a split must be non-empty",
            ));
        }
        Ok(Self::from_canonical_unchecked(canonicalize(side, ntax), ntax, weight))
    }

    /// Builds a split whose side is already canonical and valid.
    pub(crate) fn from_canonical_unchecked(side: Bitset, ntax: usize, weight: f64) -> Self {
        debug_assert!(!side.contains(0));
        Self {
            side,
            ntax,
            weight,
            confidence: None,
        }
    }

    /// The split separating `taxon` from everything else.
    pub fn trivial(taxon: TaxonId, ntax: usize, weight: f64) -> Result<Self> {
        Self::new([taxon], ntax, weight)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Number of taxa in the universe.
    pub fn ntax(&self) -> usize {
        self.ntax
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn set_confidence(&mut self, confidence: Option<f64>) {
        self.confidence = confidence;
    }

    /// Canonical side (never contains taxon 1), as a bitset.
    pub fn side(&self) -> &Bitset {
        &self.side
    }

    /// The side containing taxon 1, as a bitset.
    pub fn complement(&self) -> Bitset {
        self.side.complement(self.ntax)
    }

    /// Taxa on the canonical side, ascending.
    pub fn side_taxa(&self) -> Vec<TaxonId> {
        self.side.iter_ones().map(|b| b + 1).collect()
    }

    /// Taxa on the side containing taxon 1, ascending.
    pub fn complement_taxa(&self) -> Vec<TaxonId> {
        self.complement().iter_ones().map(|b| b + 1).collect()
    }

    /// True if `taxon` lies on the canonical side.
    pub fn contains(&self, taxon: TaxonId) -> bool {
        self.side.contains(bit(taxon))
    }

    /// The side containing `taxon`, as a bitset.
    pub fn part_containing(&self, taxon: TaxonId) -> Bitset {
        if self.contains(taxon) {
            self.side.clone()
        } else {
            self.complement()
        }
    }

    /// Size of the smaller side.
    pub fn size(&self) -> usize {
        let k = self.side.count_ones();
        k.min(self.ntax - k)
    }

    /// True if one side holds exactly one taxon.
    pub fn is_trivial(&self) -> bool {
        self.size() == 1
    }

    /// The taxon isolated by a trivial split.
    pub fn trivial_taxon(&self) -> Option<TaxonId> {
        let k = self.side.count_ones();
        if k == 1 {
            self.side.iter_ones().next().map(|b| b + 1)
        } else if k + 1 == self.ntax {
            Some(1)
        } else {
            None
        }
    }

    /// True if `a` and `b` are on different sides.
    pub fn separates(&self, a: TaxonId, b: TaxonId) -> bool {
        self.contains(a) != self.contains(b)
    }

    /// True if both splits describe the same bipartition.
    pub fn same_partition(&self, other: &Split) -> bool {
        self.ntax == other.ntax && self.side == other.side
    }
}

/// Flips `side` to its complement when it contains taxon 1 (bit 0).
pub fn canonicalize(side: Bitset, ntax: usize) -> Bitset {
    if side.contains(0) {
        side.complement(ntax)
    } else {
        side
    }
}

impl PartialEq for Split {
    fn eq(&self, other: &Self) -> bool {
        self.same_partition(other)
    }
}

impl Eq for Split {}

impl Hash for Split {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ntax.hash(state);
        self.side.hash(state);
    }
}

impl fmt::Display for Split {
    /// `{2, 3} | {1, 4}: 0.5` with the canonical side first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |taxa: Vec<TaxonId>| {
            taxa.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
        };
        write!(
            f,
            "{{{}}} | {{{}}}: {}",
            join(self.side_taxa()),
            join(self.complement_taxa()),
            self.weight
        )
    }
}
