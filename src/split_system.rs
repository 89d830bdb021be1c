//! The split system: an ordered collection of splits plus derived annotations.
//!
//! Splits are added only while decomposing (or when importing a finished
//! system); the classification stages afterwards write just their own
//! annotation fields (`cycle`, `compatibility`, `fit`).

use std::collections::HashSet;
use std::fmt;

use crate::error::{DecompositionError, Result};
use crate::split::{Split, TaxonId};

/// Strongest compatibility property established for a split system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompatibilityClass {
    /// Every pair of splits is compatible (the system is a tree).
    Compatible,
    /// Every split is an arc of one circular ordering.
    Cyclic,
    /// Every triple of splits is weakly compatible.
    WeaklyCompatible,
    /// None of the above could be established.
    Incompatible,
    /// Not classified yet.
    #[default]
    Unknown,
}

impl fmt::Display for CompatibilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Compatible => "compatible",
            Self::Cyclic => "cyclic",
            Self::WeaklyCompatible => "weakly compatible",
            Self::Incompatible => "incompatible",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Splits over `{1..ntax}` in insertion order, with annotations.
#[derive(Debug, Clone, Default)]
pub struct SplitSystem {
    ntax: usize,
    splits: Vec<Split>,
    cycle: Option<Vec<TaxonId>>,
    compatibility: CompatibilityClass,
    fit: Option<f64>,
}

impl SplitSystem {
    /// An empty, unclassified system over `ntax` taxa.
    pub fn new(ntax: usize) -> Self {
        Self {
            ntax,
            ..Self::default()
        }
    }

    /// Wraps existing splits, checking that they all share `ntax`.
    pub fn from_splits(ntax: usize, splits: Vec<Split>) -> Result<Self> {
        if let Some(bad) = splits.iter().find(|s| s.ntax() != ntax) {
            return Err(DecompositionError::shape(format!(
                "split over {} taxa cannot join a system over {ntax} taxa",
                bad.ntax()
            )));
        }
        Ok(Self {
            ntax,
            splits,
            ..Self::default()
        })
    }

    pub fn ntax(&self) -> usize {
        self.ntax
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Split> {
        self.splits.iter()
    }

    /// Circular ordering (1-based taxa), if one has been computed.
    pub fn cycle(&self) -> Option<&[TaxonId]> {
        self.cycle.as_deref()
    }

    pub fn set_cycle(&mut self, cycle: Option<Vec<TaxonId>>) {
        debug_assert!(cycle.as_ref().is_none_or(|c| c.len() == self.ntax));
        self.cycle = cycle;
    }

    pub fn compatibility(&self) -> CompatibilityClass {
        self.compatibility
    }

    pub fn set_compatibility(&mut self, class: CompatibilityClass) {
        self.compatibility = class;
    }

    /// Fit percentage in `0..=100`, if computed.
    pub fn fit(&self) -> Option<f64> {
        self.fit
    }

    pub fn set_fit(&mut self, fit: Option<f64>) {
        self.fit = fit;
    }

    /// Sum of all split weights.
    pub fn total_weight(&self) -> f64 {
        self.splits.iter().map(Split::weight).sum()
    }

    /// Turns the list into a set: keeps the first split of each bipartition.
    ///
    /// Returns the number of splits removed. Annotations are left untouched,
    /// since removing duplicates changes neither compatibility nor the cycle.
    pub fn dedup_by_partition(&mut self) -> usize {
        let before = self.splits.len();
        let mut seen = HashSet::with_capacity(before);
        self.splits.retain(|s| seen.insert(s.side().clone()));
        before - self.splits.len()
    }
}

impl<'a> IntoIterator for &'a SplitSystem {
    type Item = &'a Split;
    type IntoIter = std::slice::Iter<'a, Split>;

    fn into_iter(self) -> Self::IntoIter {
        self.splits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_system_is_unclassified() {
        let sys = SplitSystem::new(5);
        assert_eq!(sys.ntax(), 5);
        assert!(sys.is_empty());
        assert_eq!(sys.compatibility(), CompatibilityClass::Unknown);
        assert!(sys.cycle().is_none());
        assert!(sys.fit().is_none());
    }

    #[test]
    fn test_from_splits_checks_taxon_count() {
        let ok = vec![Split::new([2], 4, 1.0).unwrap()];
        assert!(SplitSystem::from_splits(4, ok).is_ok());

        let mixed = vec![Split::new([2], 4, 1.0).unwrap(), Split::new([2], 5, 1.0).unwrap()];
        assert!(matches!(
            SplitSystem::from_splits(4, mixed),
            Err(DecompositionError::Shape { .. })
        ));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let splits = vec![
            Split::new([3, 4], 4, 1.0).unwrap(),
            Split::new([2], 4, 0.5).unwrap(),
            Split::new([1, 2], 4, 9.0).unwrap(),
        ];
        let mut sys = SplitSystem::from_splits(4, splits).unwrap();
        assert_eq!(sys.dedup_by_partition(), 1);
        assert_eq!(sys.len(), 2);
        assert_eq!(sys.splits()[0].weight(), 1.0);
        assert_eq!(sys.total_weight(), 1.5);
    }

    #[test]
    fn test_class_display() {
        assert_eq!(CompatibilityClass::WeaklyCompatible.to_string(), "weakly compatible");
        assert_eq!(CompatibilityClass::default(), CompatibilityClass::Unknown);
    }
}
