//! Compact bitset representation for taxon sets.
//!
//! # Overview
//! A bitset is an efficient way to represent which taxa lie on one side of a split.
//! Bit position `i` corresponds to taxon `i + 1` (taxa are 1-based, bits are 0-based).
//!
//! # Example
//! For four taxa [1, 2, 3, 4] mapped to bits [0, 1, 2, 3]:
//! - Side {1, 3} → bitset `0b0101` (bits 0 and 2 set)
//! - Side {2, 3, 4} → bitset `0b1110` (bits 1, 2, 3 set)

/// A compact bitset for representing which taxa belong to a split side.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily many taxa.
/// Each u64 word holds 64 taxon indices.
///
/// Two bitsets are only comparable when they were created with the same number
/// of words; every set built for one split system uses `words_for(n)`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

/// Number of u64 words needed to hold `bits` bits.
#[inline]
pub fn words_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate as `words_for(num_taxa)`
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// // For 100 taxa, need 2 words (128 bits)
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Creates a bitset sized for `bits` bits with the given indices set.
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// let bs = Bitset::from_indices(5, [0, 3]);
    /// assert_eq!(bs.0[0], 0b1001);
    /// ```
    pub fn from_indices<I: IntoIterator<Item = usize>>(bits: usize, indices: I) -> Self {
        let mut bs = Bitset::zeros(words_for(bits));
        for idx in indices {
            bs.set(idx);
        }
        bs
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Clears the bit at the given index.
    #[inline]
    pub fn unset(&mut self, idx: usize) {
        self.0[idx >> 6] &= !(1u64 << (idx & 63));
    }

    /// Returns true if the bit at `idx` is set. Out-of-range indices are unset.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| w & (1u64 << (idx & 63)) != 0)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two taxon sets: `self` becomes `self ∪ other`
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);   // {0}
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);  // {1}
    ///
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Counts the number of set bits (population count).
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(2);
    /// bs.set(5);
    /// assert_eq!(bs.count_ones(), 3);
    /// ```
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// True when `self ∩ other` is non-empty.
    #[inline]
    pub fn intersects(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).any(|(a, b)| a & b != 0)
    }

    /// True when `self ∩ b ∩ c` is non-empty.
    #[inline]
    pub fn intersects_both(&self, b: &Bitset, c: &Bitset) -> bool {
        self.0
            .iter()
            .zip(&b.0)
            .zip(&c.0)
            .any(|((x, y), z)| x & y & z != 0)
    }

    /// True when every bit of `self` is also set in `other`.
    #[inline]
    pub fn is_subset(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & !b == 0)
    }

    /// Compute the complement within the first `bits` bits.
    ///
    /// Flips all bits below `bits`, keeping the remaining padding bits at 0.
    ///
    /// # Example
    /// ```
    /// # use rust_python_split_systems::bitset::Bitset;
    /// let bs = Bitset::from_indices(4, [0, 1]);
    /// assert_eq!(bs.complement(4).0[0], 0b1100);
    /// ```
    pub fn complement(&self, bits: usize) -> Bitset {
        let mut complement = Bitset(self.0.iter().map(|w| !w).collect());
        let tail = bits & 63;
        if tail != 0 {
            if let Some(last) = complement.0.get_mut(bits >> 6) {
                *last &= (1u64 << tail) - 1;
            }
        }
        // Words entirely beyond `bits` carry no members.
        for word in complement.0.iter_mut().skip(words_for(bits)) {
            *word = 0;
        }
        complement
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(w, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((w << 6) + tz)
            })
        })
    }
}
