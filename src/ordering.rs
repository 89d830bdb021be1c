//! Circular orderings of taxa that keep as many splits as possible contiguous.
//!
//! Finding an ordering under which every split is an arc is hard in general,
//! so this is a best-effort local search: simulated annealing over circular
//! permutations, moving by segment reversals. **The result is not guaranteed
//! to be optimal.** [`CycleSearch::cost`] and [`CycleSearch::violated`] tell the
//! caller what was achieved; only `violated == 0` certifies a cyclic system.
//!
//! # Cost
//! Walk once around the circle and count how often membership in a split's
//! side changes. A side is an arc exactly when this happens twice. Every
//! split that is not an arc costs `1 + weight`.
//!
//! ```text
//! order 1 2 3 4 5, side {2,3}: 1|2 3|4 5  → 2 changes, arc
//! order 1 2 3 4 5, side {2,4}: 1|2|3|4|5  → 4 changes, not an arc
//! ```
//!
//! Reversing a segment only replaces the two adjacencies at its ends, so the
//! change count of every split is updated in constant time per move.

use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bitset::Bitset;
use crate::error::Result;
use crate::progress::{NoProgress, Progress};
use crate::split::{Split, TaxonId, bit};

/// Default RNG seed, so that repeated runs give the same ordering.
pub const DEFAULT_SEED: u64 = 42;

/// Moves between two cancellation / time-limit checks.
pub const POLL_INTERVAL: usize = 256;

/// Limits and schedule of the annealing search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBudget {
    /// Proposed moves per chain.
    pub iterations: usize,
    /// Independent chains, run in parallel; the best one wins.
    pub chains: usize,
    /// Seed of chain 0; chain `c` uses `seed + c`.
    pub seed: u64,
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Wall-clock cap per chain. Makes results timing dependent.
    pub time_limit: Option<Duration>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            chains: 4,
            seed: DEFAULT_SEED,
            initial_temperature: 1.0,
            final_temperature: 0.01,
            time_limit: None,
        }
    }
}

impl SearchBudget {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }
}

/// Best ordering found by a search, with what it achieves.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSearch {
    /// Circular ordering of `1..=n`, rotated to start at taxon 1.
    pub cycle: Vec<TaxonId>,
    /// Summed `1 + weight` of the splits that are not arcs.
    pub cost: f64,
    /// Number of splits that are not arcs.
    pub violated: usize,
}

impl CycleSearch {
    /// True when every split is an arc of `cycle`.
    pub fn is_exact(&self) -> bool {
        self.violated == 0
    }
}

/// Searches for an ordering of `1..=n` under which the splits are arcs.
///
/// Best effort; see the module docs. Deterministic for a fixed
/// `budget.seed` unless `budget.time_limit` is set.
pub fn find_cycle(splits: &[Split], n: usize, budget: &SearchBudget) -> CycleSearch {
    find_cycle_with_progress(splits, n, budget, &NoProgress)
        .unwrap_or_else(|_| evaluate(splits, (1..=n).collect()))
}

/// Like [`find_cycle`], polling `progress` every [`POLL_INTERVAL`] moves.
///
/// # Errors
/// [`crate::DecompositionError::Cancelled`] once `progress` reports cancellation.
pub fn find_cycle_with_progress<P: Progress + Sync + ?Sized>(
    splits: &[Split],
    n: usize,
    budget: &SearchBudget,
    progress: &P,
) -> Result<CycleSearch> {
    let identity: Vec<TaxonId> = (1..=n).collect();
    // Every subset of a circle of at most three taxa is an arc.
    if n < 4 {
        return Ok(evaluate(splits, identity));
    }

    let problem = Problem::new(splits);
    if problem.sides.is_empty() {
        return Ok(evaluate(splits, identity));
    }

    let chains = budget.chains.max(1);
    let results: Vec<Vec<TaxonId>> = (0..chains)
        .into_par_iter()
        .map(|c| run_chain(&problem, n, budget, c, progress))
        .collect::<Result<Vec<_>>>()?;

    let mut best: Option<CycleSearch> = None;
    for (c, order) in results.into_iter().enumerate() {
        let candidate = evaluate(splits, order);
        debug!("chain {c}: cost {} ({} splits not arcs)", candidate.cost, candidate.violated);
        // Strictly lower cost wins; ties keep the earlier chain.
        if best.as_ref().is_none_or(|b| candidate.cost < b.cost) {
            best = Some(candidate);
        }
    }
    Ok(best.unwrap_or_else(|| evaluate(splits, identity)))
}

/// Scores `cycle` against `splits` and normalizes its rotation.
pub fn evaluate(splits: &[Split], cycle: Vec<TaxonId>) -> CycleSearch {
    let cycle = normalize(cycle);
    let mut cost = 0.0;
    let mut violated = 0;
    for split in splits {
        if !is_arc(split.side(), &cycle) {
            cost += penalty(split);
            violated += 1;
        }
    }
    CycleSearch {
        cycle,
        cost,
        violated,
    }
}

/// True when the taxa of `side` are consecutive on the circle `cycle`.
pub fn is_arc(side: &Bitset, cycle: &[TaxonId]) -> bool {
    transitions(side, cycle) <= 2
}

fn transitions(side: &Bitset, cycle: &[TaxonId]) -> u32 {
    let n = cycle.len();
    (0..n)
        .filter(|&i| side.contains(bit(cycle[i])) != side.contains(bit(cycle[(i + 1) % n])))
        .count() as u32
}

fn penalty(split: &Split) -> f64 {
    1.0 + split.weight()
}

/// Rotates so taxon 1 comes first, then picks the direction in which the
/// second taxon is smaller than the last.
fn normalize(mut cycle: Vec<TaxonId>) -> Vec<TaxonId> {
    if let Some(start) = cycle.iter().position(|&t| t == 1) {
        cycle.rotate_left(start);
    }
    if cycle.len() > 2 && cycle[1] > cycle[cycle.len() - 1] {
        cycle[1..].reverse();
    }
    cycle
}

/// Non-trivial splits as sides plus their penalties. Trivial splits are
/// arcs of every ordering and never change the cost.
struct Problem {
    sides: Vec<Bitset>,
    penalties: Vec<f64>,
}

impl Problem {
    fn new(splits: &[Split]) -> Self {
        let (sides, penalties) = splits
            .iter()
            .filter(|s| s.size() > 1)
            .map(|s| (s.side().clone(), penalty(s)))
            .unzip();
        Self { sides, penalties }
    }
}

/// One annealing chain. Returns the best ordering it visited.
fn run_chain<P: Progress + Sync + ?Sized>(
    problem: &Problem,
    n: usize,
    budget: &SearchBudget,
    chain: usize,
    progress: &P,
) -> Result<Vec<TaxonId>> {
    let mut rng = StdRng::seed_from_u64(budget.seed.wrapping_add(chain as u64));
    let mut order: Vec<TaxonId> = (1..=n).collect();
    if chain > 0 {
        order.shuffle(&mut rng);
    }

    let mut counts: Vec<u32> = problem.sides.iter().map(|s| transitions(s, &order)).collect();
    let mut next_counts = counts.clone();
    let mut cost: f64 = counts
        .iter()
        .zip(&problem.penalties)
        .filter(|(c, _)| **c != 2)
        .map(|(_, p)| p)
        .sum();
    let mut violated = counts.iter().filter(|&&c| c != 2).count();

    let mut best = order.clone();
    let mut best_cost = cost;

    let t0 = budget.initial_temperature.max(f64::MIN_POSITIVE);
    let t1 = budget.final_temperature.clamp(f64::MIN_POSITIVE, t0);
    let cooling = (t1 / t0).powf(1.0 / budget.iterations.max(1) as f64);
    let mut temperature = t0;
    let started = Instant::now();

    for iteration in 0..budget.iterations {
        if violated == 0 {
            break;
        }
        if iteration % POLL_INTERVAL == 0 {
            progress.check_cancelled()?;
            if budget.time_limit.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }
        }

        // Reverse positions i ..= i + len - 1 (circularly), 2 <= len <= n - 2,
        // so the neighbours `a` and `c` outside the segment are distinct.
        let i = rng.random_range(0..n);
        let len = rng.random_range(2..=n - 2);
        let j = (i + len - 1) % n;
        let a = order[(i + n - 1) % n];
        let c = order[(j + 1) % n];
        let (bi, bj) = (order[i], order[j]);

        let mut delta = 0.0;
        let mut delta_violated: isize = 0;
        for (s, side) in problem.sides.iter().enumerate() {
            let m = |t: TaxonId| side.contains(bit(t));
            let removed = (m(a) != m(bi)) as u32 + (m(bj) != m(c)) as u32;
            let added = (m(a) != m(bj)) as u32 + (m(bi) != m(c)) as u32;
            let updated = counts[s] - removed + added;
            next_counts[s] = updated;
            match (counts[s] == 2, updated == 2) {
                (true, false) => {
                    delta += problem.penalties[s];
                    delta_violated += 1;
                }
                (false, true) => {
                    delta -= problem.penalties[s];
                    delta_violated -= 1;
                }
                _ => {}
            }
        }

        let accept = delta <= 0.0 || rng.random::<f64>() < (-delta / temperature).exp();
        if accept {
            for k in 0..len / 2 {
                order.swap((i + k) % n, (i + len - 1 - k) % n);
            }
            std::mem::swap(&mut counts, &mut next_counts);
            cost += delta;
            violated = (violated as isize + delta_violated) as usize;
            if cost < best_cost - 1e-12 {
                best_cost = cost;
                best.copy_from_slice(&order);
            }
        }
        temperature *= cooling;
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;

    fn split(side: &[TaxonId], n: usize) -> Split {
        Split::new(side.iter().copied(), n, 1.0).unwrap()
    }

    #[test]
    fn test_is_arc() {
        let cycle = vec![1, 2, 3, 4, 5];
        assert!(is_arc(split(&[2, 3], 5).side(), &cycle));
        assert!(is_arc(split(&[1, 5], 5).side(), &cycle)); // side {2,3,4}
        assert!(!is_arc(split(&[2, 4], 5).side(), &cycle));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(vec![3, 4, 1, 2]), vec![1, 2, 3, 4]);
        assert_eq!(normalize(vec![4, 3, 2, 1]), vec![1, 2, 3, 4]);
        assert_eq!(normalize(vec![2, 1, 5, 3, 4]), vec![1, 2, 4, 3, 5]);
    }

    #[test]
    fn test_finds_ordering_for_circular_system() {
        // Arcs of the circle 1 3 5 2 4, presented in scrambled form.
        let n = 5;
        let splits = vec![
            split(&[1, 3], n),
            split(&[3, 5], n),
            split(&[5, 2], n),
            split(&[2, 4], n),
            split(&[4, 1], n),
        ];
        let search = find_cycle(&splits, n, &SearchBudget::default());
        assert!(search.is_exact(), "cost {} for {:?}", search.cost, search.cycle);
        assert_eq!(search.cost, 0.0);
        assert_eq!(search.cycle[0], 1);
        for s in &splits {
            assert!(is_arc(s.side(), &search.cycle));
        }
    }

    #[test]
    fn test_reports_violations_when_no_cycle_exists() {
        // {1,2}, {1,3} and {1,4} cannot all be arcs: 1 has only two neighbours.
        let n = 6;
        let splits = vec![split(&[1, 2], n), split(&[1, 3], n), split(&[1, 4], n)];
        let search = find_cycle(&splits, n, &SearchBudget::default());
        assert!(!search.is_exact());
        assert!(search.violated >= 1);
        assert!(search.cost >= 2.0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let n = 7;
        let splits = vec![
            split(&[2, 5], n),
            split(&[2, 5, 7], n),
            split(&[3, 6], n),
            split(&[4, 6], n),
        ];
        let budget = SearchBudget::default().with_seed(7).with_iterations(500);
        assert_eq!(find_cycle(&splits, n, &budget), find_cycle(&splits, n, &budget));
    }

    #[test]
    fn test_small_and_trivial_inputs() {
        let search = find_cycle(&[], 3, &SearchBudget::default());
        assert_eq!(search.cycle, vec![1, 2, 3]);
        assert!(search.is_exact());

        let trivial = vec![split(&[2], 5), split(&[3], 5)];
        assert_eq!(find_cycle(&trivial, 5, &SearchBudget::default()).cycle, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cancellation() {
        let n = 6;
        let splits = vec![split(&[1, 2], n), split(&[1, 3], n), split(&[1, 4], n)];
        let token = CancellationToken::new();
        token.cancel();
        let result = find_cycle_with_progress(&splits, n, &SearchBudget::default(), &token);
        assert_eq!(result.unwrap_err(), crate::DecompositionError::Cancelled);
    }
}
