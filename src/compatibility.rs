//! Compatibility classes of split systems.
//!
//! Checks run from strongest to weakest and the first that holds is reported:
//!
//! | Class | Condition | Cost |
//! |-------|-----------|------|
//! | Compatible | every pair: one of `A∩C, A∩D, B∩C, B∩D` is empty | O(s² · n/64) |
//! | Cyclic | every split is an arc of one circular ordering | search, see [`crate::ordering`] |
//! | Weakly compatible | no triple realises all four mixed intersections | O(s³ · n/64), only for `n < 100` |
//!
//! Everything here is read-only on the splits.

use itertools::Itertools;

use crate::bitset::Bitset;
use crate::error::Result;
use crate::ordering::{SearchBudget, find_cycle, find_cycle_with_progress};
use crate::progress::Progress;
use crate::split::{Split, TaxonId, bit};
use crate::split_system::{CompatibilityClass, SplitSystem};

/// Weak compatibility is only tested below this many taxa.
pub const DEFAULT_WEAK_COMPATIBILITY_MAX_TAXA: usize = 100;

/// Tunables for [`classify_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOptions {
    pub weak_compatibility_max_taxa: usize,
    /// Used when no cycle hint is given.
    pub budget: SearchBudget,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            weak_compatibility_max_taxa: DEFAULT_WEAK_COMPATIBILITY_MAX_TAXA,
            budget: SearchBudget::default(),
        }
    }
}

/// Class of a split system plus the ordering used to decide it.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: CompatibilityClass,
    /// For compatible systems an exact ordering; otherwise the hint or the
    /// best ordering the search found.
    pub cycle: Option<Vec<TaxonId>>,
}

/// Strongest class that holds for `splits` over `{1..n}`, with default options.
pub fn classify(splits: &[Split], n: usize, cycle_hint: Option<&[TaxonId]>) -> CompatibilityClass {
    classify_with(splits, n, cycle_hint, &ClassifierOptions::default()).class
}

/// Strongest class that holds for `splits`.
///
/// A valid `cycle_hint` (a permutation of `1..=n`) decides cyclicity on its
/// own. Without one, a circular ordering is searched for; since that search
/// is heuristic a cyclic system may be reported in a weaker class.
pub fn classify_with(
    splits: &[Split],
    n: usize,
    cycle_hint: Option<&[TaxonId]>,
    options: &ClassifierOptions,
) -> Classification {
    let sides = both_sides(splits);
    if is_compatible_sides(&sides) {
        return compatible_classification(splits, n);
    }

    let cycle = valid_hint(cycle_hint, n).unwrap_or_else(|| find_cycle(splits, n, &options.budget).cycle);
    classify_under(splits, &sides, n, cycle, options)
}

/// Like [`classify_with`], with the ordering search polling `progress`.
///
/// # Errors
/// [`crate::DecompositionError::Cancelled`] if `progress` reports
/// cancellation during the search.
pub fn classify_with_progress<P: Progress + Sync + ?Sized>(
    splits: &[Split],
    n: usize,
    cycle_hint: Option<&[TaxonId]>,
    options: &ClassifierOptions,
    progress: &P,
) -> Result<Classification> {
    let sides = both_sides(splits);
    if is_compatible_sides(&sides) {
        return Ok(compatible_classification(splits, n));
    }

    let cycle = match valid_hint(cycle_hint, n) {
        Some(hint) => hint,
        None => find_cycle_with_progress(splits, n, &options.budget, progress)?.cycle,
    };
    Ok(classify_under(splits, &sides, n, cycle, options))
}

fn compatible_classification(splits: &[Split], n: usize) -> Classification {
    Classification {
        class: CompatibilityClass::Compatible,
        cycle: Some(compatible_cycle(splits, n)),
    }
}

fn valid_hint(cycle_hint: Option<&[TaxonId]>, n: usize) -> Option<Vec<TaxonId>> {
    cycle_hint.filter(|h| is_permutation(h, n)).map(<[TaxonId]>::to_vec)
}

/// Cyclic, weakly compatible or incompatible, for a system known not to be
/// compatible.
fn classify_under(
    splits: &[Split],
    sides: &[[Bitset; 2]],
    n: usize,
    cycle: Vec<TaxonId>,
    options: &ClassifierOptions,
) -> Classification {
    let class = if is_cyclic_under(splits, &cycle) {
        CompatibilityClass::Cyclic
    } else if n < options.weak_compatibility_max_taxa && is_weakly_compatible_sides(sides) {
        CompatibilityClass::WeaklyCompatible
    } else {
        CompatibilityClass::Incompatible
    };

    Classification {
        class,
        cycle: Some(cycle),
    }
}

/// Classifies `system` and stores the class and ordering on it.
pub fn annotate(system: &mut SplitSystem, options: &ClassifierOptions) -> CompatibilityClass {
    let hint = system.cycle().map(<[TaxonId]>::to_vec);
    let result = classify_with(system.splits(), system.ntax(), hint.as_deref(), options);
    store(system, result)
}

/// [`annotate`] with a cancellable ordering search. On error `system` is
/// left unchanged.
pub fn annotate_with_progress<P: Progress + Sync + ?Sized>(
    system: &mut SplitSystem,
    options: &ClassifierOptions,
    progress: &P,
) -> Result<CompatibilityClass> {
    let hint = system.cycle().map(<[TaxonId]>::to_vec);
    let result = classify_with_progress(system.splits(), system.ntax(), hint.as_deref(), options, progress)?;
    Ok(store(system, result))
}

fn store(system: &mut SplitSystem, result: Classification) -> CompatibilityClass {
    system.set_compatibility(result.class);
    system.set_cycle(result.cycle);
    result.class
}

/// True if the two splits are compatible.
pub fn are_compatible(a: &Split, b: &Split) -> bool {
    compatible_sides(&[a.side().clone(), a.complement()], &[b.side().clone(), b.complement()])
}

/// True if every pair of splits is compatible.
pub fn is_compatible(splits: &[Split]) -> bool {
    is_compatible_sides(&both_sides(splits))
}

/// True if every triple of splits is weakly compatible.
pub fn is_weakly_compatible(splits: &[Split]) -> bool {
    is_weakly_compatible_sides(&both_sides(splits))
}

/// True if every split is contiguous under `cycle`.
///
/// `cycle` must list each taxon `1..=n` once, where `n` is the taxon count of
/// every split; any other `cycle` gives false.
///
/// For each split the side not containing `cycle[0]` is taken, so no arc
/// wraps around the end of the list; it is contiguous when the span of its
/// positions equals its size.
pub fn is_cyclic_under(splits: &[Split], cycle: &[TaxonId]) -> bool {
    let n = cycle.len();
    if splits.iter().any(|s| s.ntax() != n) || !is_permutation(cycle, n) {
        return false;
    }
    let Some(&first) = cycle.first() else {
        return true;
    };
    let mut position = vec![0usize; cycle.len() + 1];
    for (p, &t) in cycle.iter().enumerate() {
        position[t] = p;
    }

    splits.iter().all(|split| {
        let side = if split.contains(first) {
            split.complement()
        } else {
            split.side().clone()
        };
        let (mut min, mut max, mut count) = (usize::MAX, 0, 0);
        for t in side.iter_ones().map(|b| b + 1) {
            let p = position[t];
            min = min.min(p);
            max = max.max(p);
            count += 1;
        }
        count == 0 || max - min + 1 == count
    })
}

/// Circular ordering under which every split of a compatible system is an arc.
///
/// Canonical sides of compatible splits are nested or disjoint. Sorting taxa
/// by the chain of sides containing them (largest side first) places each
/// side's taxa consecutively. Taxon 1 lies on no canonical side and comes
/// first.
pub fn compatible_cycle(splits: &[Split], n: usize) -> Vec<TaxonId> {
    let mut sides: Vec<&Bitset> = splits.iter().map(Split::side).collect();
    sides.sort_by(|a, b| b.count_ones().cmp(&a.count_ones()).then_with(|| a.cmp(b)));
    sides.dedup();

    let chains: Vec<Vec<usize>> = (1..=n)
        .map(|t| {
            sides
                .iter()
                .enumerate()
                .filter(|(_, s)| s.contains(bit(t)))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let mut order: Vec<TaxonId> = (1..=n).collect();
    order.sort_by(|&x, &y| chains[x - 1].cmp(&chains[y - 1]).then(x.cmp(&y)));
    order
}

/// Keeps splits in order of decreasing weight while they stay pairwise
/// compatible. The survivors are returned in their original order.
pub fn greedy_compatible(splits: &[Split]) -> Vec<Split> {
    let sides = both_sides(splits);
    let mut by_weight: Vec<usize> = (0..splits.len()).collect();
    by_weight.sort_by(|&a, &b| splits[b].weight().total_cmp(&splits[a].weight()));

    let mut kept: Vec<usize> = Vec::new();
    for i in by_weight {
        if kept.iter().all(|&k| compatible_sides(&sides[i], &sides[k])) {
            kept.push(i);
        }
    }
    kept.sort_unstable();
    kept.into_iter().map(|i| splits[i].clone()).collect()
}

/// `[side, complement]` for every split.
fn both_sides(splits: &[Split]) -> Vec<[Bitset; 2]> {
    splits
        .iter()
        .map(|s| [s.side().clone(), s.complement()])
        .collect()
}

fn compatible_sides(x: &[Bitset; 2], y: &[Bitset; 2]) -> bool {
    !x[0].intersects(&y[0]) || !x[0].intersects(&y[1]) || !x[1].intersects(&y[0]) || !x[1].intersects(&y[1])
}

fn is_compatible_sides(sides: &[[Bitset; 2]]) -> bool {
    (0..sides.len())
        .tuple_combinations::<(usize, usize)>()
        .all(|(i, j)| compatible_sides(&sides[i], &sides[j]))
}

fn is_weakly_compatible_sides(sides: &[[Bitset; 2]]) -> bool {
    (0..sides.len())
        .tuple_combinations::<(usize, usize, usize)>()
        .all(|(i, j, k)| weakly_compatible_triple(&sides[i], &sides[j], &sides[k]))
}

/// A triple fails when, for some choice of sides `A1, A2, A3`, all of
/// `A1∩A2∩A3`, `A1∩Ā2∩Ā3`, `Ā1∩A2∩Ā3` and `Ā1∩Ā2∩A3` are non-empty.
fn weakly_compatible_triple(s1: &[Bitset; 2], s2: &[Bitset; 2], s3: &[Bitset; 2]) -> bool {
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                let (a1, n1) = (&s1[x], &s1[1 - x]);
                let (a2, n2) = (&s2[y], &s2[1 - y]);
                let (a3, n3) = (&s3[z], &s3[1 - z]);
                if a1.intersects_both(a2, a3)
                    && a1.intersects_both(n2, n3)
                    && n1.intersects_both(a2, n3)
                    && n1.intersects_both(n2, a3)
                {
                    return false;
                }
            }
        }
    }
    true
}

fn is_permutation(cycle: &[TaxonId], n: usize) -> bool {
    if cycle.len() != n {
        return false;
    }
    let mut seen = vec![false; n + 1];
    cycle
        .iter()
        .all(|&t| t >= 1 && t <= n && !std::mem::replace(&mut seen[t], true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecompositionError;
    use crate::trivial::complete_trivial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports cancellation from the `limit`-th poll on.
    struct CancelAfterPolls {
        polls: AtomicUsize,
        limit: usize,
    }

    impl Progress for CancelAfterPolls {
        fn is_cancelled(&self) -> bool {
            self.polls.fetch_add(1, Ordering::Relaxed) + 1 >= self.limit
        }
    }

    fn splits(sides: &[&[TaxonId]], n: usize) -> Vec<Split> {
        sides
            .iter()
            .map(|s| Split::new(s.iter().copied(), n, 1.0).unwrap())
            .collect()
    }

    #[test]
    fn test_trivial_splits_are_compatible() {
        let s = splits(&[&[1], &[2], &[3], &[4]], 4);
        assert_eq!(classify(&s, 4, None), CompatibilityClass::Compatible);
    }

    #[test]
    fn test_tree_splits_are_compatible_and_cyclic() {
        let mut s = splits(&[&[1, 2], &[1, 2, 3], &[5, 6]], 7);
        complete_trivial(&mut s, 7, 0.0);
        let result = classify_with(&s, 7, None, &ClassifierOptions::default());
        assert_eq!(result.class, CompatibilityClass::Compatible);

        let cycle = result.cycle.unwrap();
        assert_eq!(cycle[0], 1);
        assert!(is_cyclic_under(&s, &cycle));
    }

    #[test]
    fn test_two_incompatible_splits_are_cyclic() {
        let s = splits(&[&[1, 2], &[1, 3]], 5);
        assert!(!are_compatible(&s[0], &s[1]));
        assert_eq!(classify(&s, 5, None), CompatibilityClass::Cyclic);
        // 2 1 3 4 5 keeps both pairs together.
        assert_eq!(
            classify(&s, 5, Some(&[2, 1, 3, 4, 5])),
            CompatibilityClass::Cyclic
        );
    }

    #[test]
    fn test_bad_hint_is_not_trusted_blindly() {
        let s = splits(&[&[1, 2], &[1, 3]], 5);
        // Valid permutation that breaks {1,3}: decided by the hint alone.
        assert_eq!(
            classify(&s, 5, Some(&[1, 2, 4, 3, 5])),
            CompatibilityClass::WeaklyCompatible
        );
        // Not a permutation: ignored, so the search runs.
        assert_eq!(classify(&s, 5, Some(&[1, 1, 2])), CompatibilityClass::Cyclic);
    }

    /// Pairs {1,2}, {3,4}, {5,6} plus {1,3,5}: weakly compatible, but 1, 3
    /// and 5 cannot be consecutive while each keeps its partner adjacent.
    #[test]
    fn test_weakly_compatible_but_not_cyclic() {
        let s = splits(&[&[1, 2], &[3, 4], &[5, 6], &[1, 3, 5]], 6);
        assert!(is_weakly_compatible(&s));
        assert_eq!(classify(&s, 6, None), CompatibilityClass::WeaklyCompatible);
    }

    /// All three splits of a quartet.
    #[test]
    fn test_quartet_splits_are_incompatible() {
        let s = splits(&[&[1, 2], &[1, 3], &[1, 4]], 4);
        assert!(!is_weakly_compatible(&s));
        assert_eq!(classify(&s, 4, None), CompatibilityClass::Incompatible);
    }

    #[test]
    fn test_weak_check_is_skipped_for_many_taxa() {
        let s = splits(&[&[1, 2], &[3, 4], &[5, 6], &[1, 3, 5]], 6);
        let options = ClassifierOptions {
            weak_compatibility_max_taxa: 6,
            ..ClassifierOptions::default()
        };
        assert_eq!(
            classify_with(&s, 6, None, &options).class,
            CompatibilityClass::Incompatible
        );
    }

    #[test]
    fn test_cyclic_under_uses_side_without_first_taxon() {
        // Side {3,4,5} wraps when read from 3 but not from the other side.
        let s = splits(&[&[1, 2]], 5);
        assert!(is_cyclic_under(&s, &[3, 1, 2, 4, 5]));
        assert!(!is_cyclic_under(&s, &[1, 3, 2, 4, 5]));
    }

    #[test]
    fn test_greedy_compatible_prefers_heavy_splits() {
        let mut s = splits(&[&[1, 2], &[1, 3], &[4, 5]], 6);
        s[1].set_weight(5.0);
        let kept = greedy_compatible(&s);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].side_taxa(), s[1].side_taxa());
        assert_eq!(kept[1].side_taxa(), s[2].side_taxa());
        assert!(is_compatible(&kept));
    }

    #[test]
    fn test_annotate_writes_class_and_cycle() {
        let s = splits(&[&[1, 2], &[1, 3]], 5);
        let mut system = SplitSystem::from_splits(5, s).unwrap();
        let class = annotate(&mut system, &ClassifierOptions::default());
        assert_eq!(class, CompatibilityClass::Cyclic);
        assert_eq!(system.compatibility(), CompatibilityClass::Cyclic);
        assert!(is_cyclic_under(system.splits(), system.cycle().unwrap()));
    }

    #[test]
    fn test_search_stops_when_cancelled_midway() {
        let mut s = splits(&[&[1, 2], &[3, 4], &[5, 6], &[1, 3, 5]], 6);
        complete_trivial(&mut s, 6, 1.0);
        let options = ClassifierOptions {
            budget: SearchBudget::default().with_iterations(50_000_000).with_chains(1),
            ..ClassifierOptions::default()
        };
        let progress = CancelAfterPolls {
            polls: AtomicUsize::new(0),
            limit: 3,
        };

        let result = classify_with_progress(&s, 6, None, &options, &progress);
        assert_eq!(result, Err(DecompositionError::Cancelled));
        assert_eq!(progress.polls.load(Ordering::Relaxed), 3);

        let mut system = SplitSystem::from_splits(6, s).unwrap();
        let progress = CancelAfterPolls {
            polls: AtomicUsize::new(0),
            limit: 3,
        };
        assert!(annotate_with_progress(&mut system, &options, &progress).is_err());
        assert_eq!(system.compatibility(), CompatibilityClass::Unknown);
        assert_eq!(system.cycle(), None);
    }

    #[test]
    fn test_progress_classification_matches_plain() {
        let s = splits(&[&[1, 2], &[3, 4], &[5, 6], &[1, 3, 5]], 6);
        let options = ClassifierOptions::default();
        let plain = classify_with(&s, 6, None, &options);
        let polled = classify_with_progress(&s, 6, None, &options, &crate::progress::NoProgress).unwrap();
        assert_eq!(plain, polled);
        assert_eq!(polled.class, CompatibilityClass::WeaklyCompatible);
    }

    #[test]
    fn test_cyclic_under_rejects_malformed_cycles() {
        let s = splits(&[&[1, 2]], 5);
        assert!(!is_cyclic_under(&s, &[1, 2, 3]));
        assert!(!is_cyclic_under(&s, &[1, 2, 3, 4, 9]));
        assert!(!is_cyclic_under(&s, &[1, 2, 2, 4, 5]));
        assert!(!is_cyclic_under(&s, &[]));
        assert!(is_cyclic_under(&[], &[]));
    }
}
