//! Property-based tests using proptest

use proptest::prelude::*;
use rust_python_split_systems::compatibility::{greedy_compatible, is_cyclic_under};
use rust_python_split_systems::split::canonicalize;
use rust_python_split_systems::{
    Bitset, ClassifierOptions, CompatibilityClass, NoProgress, Split, SplitSystem, SymmetricMatrix, TaxonId,
    classify_with, complete_trivial, compute_fit, decompose, induced_distances, parse_splits, write_splits,
};

/// A random symmetric matrix with `1..9` taxa, as rows.
fn distance_rows() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..9).prop_flat_map(|n| {
        prop::collection::vec(0.0f64..10.0, n * (n - 1) / 2).prop_map(move |upper| {
            let mut rows = vec![vec![0.0; n]; n];
            let mut k = 0;
            for i in 0..n {
                for j in (i + 1)..n {
                    rows[i][j] = upper[k];
                    rows[j][i] = upper[k];
                    k += 1;
                }
            }
            rows
        })
    })
}

/// Up to 30 random splits over `2..=20` taxa; empty or full sides are dropped.
fn split_system() -> impl Strategy<Value = SplitSystem> {
    (2usize..=20).prop_flat_map(|n| {
        prop::collection::vec((prop::collection::vec(any::<bool>(), n), 0.0f64..100.0), 0..30)
            .prop_map(move |raw| {
                let splits = raw
                    .into_iter()
                    .filter_map(|(mask, weight)| {
                        let taxa: Vec<TaxonId> = (1..=n).filter(|&t| mask[t - 1]).collect();
                        Split::new(taxa, n, weight).ok()
                    })
                    .collect();
                SplitSystem::from_splits(n, splits).unwrap()
            })
    })
}

fn sorted_parts(system: &SplitSystem) -> Vec<(Bitset, f64)> {
    let mut parts: Vec<(Bitset, f64)> = system.iter().map(|s| (s.side().clone(), s.weight())).collect();
    parts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    parts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn test_decomposition_yields_valid_partitions(rows in distance_rows()) {
        let n = rows.len();
        let d = SymmetricMatrix::from_rows(&rows).unwrap();
        let system = decompose(&d, n, &mut NoProgress).unwrap();

        for split in system.iter() {
            let mut all = split.side_taxa();
            all.extend(split.complement_taxa());
            all.sort_unstable();
            prop_assert_eq!(all, (1..=n).collect::<Vec<_>>());
            prop_assert!(!split.side_taxa().is_empty());
            prop_assert!(!split.complement_taxa().is_empty());
            prop_assert!(split.weight() >= 0.0, "negative weight {}", split.weight());
        }

        // every taxon is isolated by some split
        if n >= 2 {
            for t in 1..=n {
                prop_assert!(system.iter().any(|s| s.trivial_taxon() == Some(t)
                    || (n == 2 && s.is_trivial())));
            }
        }
    }

    #[test]
    fn test_canonicalization_is_idempotent(system in split_system()) {
        let n = system.ntax();
        for split in system.iter() {
            prop_assert!(!split.side_taxa().contains(&1));
            let again = canonicalize(split.side().clone(), n);
            prop_assert_eq!(&again, split.side());

            let flipped = Split::new(split.complement_taxa(), n, split.weight()).unwrap();
            prop_assert_eq!(&flipped, split);
        }
    }

    #[test]
    fn test_trivial_completion_is_idempotent(system in split_system()) {
        let n = system.ntax();
        let mut once = system.splits().to_vec();
        complete_trivial(&mut once, n, 0.0);
        let mut twice = once.clone();
        prop_assert_eq!(complete_trivial(&mut twice, n, 0.0), 0);
        prop_assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_fit_is_bounded(rows in distance_rows()) {
        let n = rows.len();
        let d = SymmetricMatrix::from_rows(&rows).unwrap();
        let system = decompose(&d, n, &mut NoProgress).unwrap();
        if let Some(fit) = compute_fit(system.splits(), &d, n) {
            prop_assert!((0.0..=100.0).contains(&fit), "fit {} out of range", fit);
        }
    }

    #[test]
    fn test_fit_of_random_systems_is_bounded(system in split_system(), scale in 0.0f64..5.0) {
        let n = system.ntax();
        let d = induced_distances(system.splits(), n);
        let mut scaled = SymmetricMatrix::new(n);
        for (i, j, value) in d.pairs() {
            scaled.set(i, j, value * scale);
        }
        if let Some(fit) = compute_fit(system.splits(), &scaled, n) {
            prop_assert!((0.0..=100.0).contains(&fit), "fit {} out of range", fit);
        }
    }

    #[test]
    fn test_serialization_round_trip(system in split_system()) {
        let text = write_splits(&system, None);
        let (labels, parsed) = parse_splits(&text).unwrap();

        prop_assert_eq!(labels.len(), system.ntax());
        prop_assert_eq!(parsed.ntax(), system.ntax());
        let (expected, actual) = (sorted_parts(&system), sorted_parts(&parsed));
        prop_assert_eq!(expected.len(), actual.len());
        for ((side_a, w_a), (side_b, w_b)) in expected.iter().zip(actual.iter()) {
            prop_assert_eq!(side_a, side_b);
            prop_assert!((w_a - w_b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_compatible_systems_are_cyclic(system in split_system()) {
        let n = system.ntax();
        let tree = greedy_compatible(system.splits());
        let result = classify_with(&tree, n, None, &ClassifierOptions::default());

        prop_assert_eq!(result.class, CompatibilityClass::Compatible);
        let cycle = result.cycle.unwrap();
        prop_assert!(is_cyclic_under(&tree, &cycle));
    }
}
