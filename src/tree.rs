//! Split systems read off phylogenetic trees.
//!
//! # Overview
//! Every edge of a tree divides the leaves in two, so a tree is a compatible
//! split system with edge lengths as weights:
//!
//! ```text
//!        root
//!       /    \
//!   {A,B}    {C,D}   ← both root edges give the split {A,B} | {C,D}
//!   /   \    /   \
//!  A     B  C     D
//! ```
//!
//! Taxon ids follow the leaf names sorted alphabetically, so two trees on the
//! same taxa map each name to the same id regardless of how they were parsed.
//! Edges inducing the same split (the two root edges of a rooted tree, or a
//! chain through unary nodes) are merged and their lengths added.

use std::collections::{HashMap, HashSet};

use phylotree::tree::{Tree as PhyloTree, TreeError};

use crate::bitset::{Bitset, words_for};
use crate::error::{DecompositionError, Result};
use crate::split::{Split, canonicalize};
use crate::split_system::SplitSystem;

/// Converts a tree into its split system.
///
/// Returns the leaf names in taxon-id order (name at index `i` is taxon
/// `i + 1`) together with the splits. Missing edge lengths count as 0.
///
/// # Errors
/// [`DecompositionError::InvalidTree`] for empty or malformed trees, unnamed
/// leaves or duplicate leaf names.
pub fn splits_from_tree(tree: &PhyloTree) -> Result<(Vec<String>, SplitSystem)> {
    let mut leaves: Vec<(usize, String)> = Vec::new();
    for leaf_id in tree.get_leaves() {
        let node = tree.get(&leaf_id).map_err(tree_error)?;
        let name = node
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DecompositionError::invalid_tree(format!("leaf {leaf_id} has no name")))?;
        leaves.push((leaf_id, name));
    }
    leaves.sort_by(|a, b| a.1.cmp(&b.1));

    let mut seen = HashSet::with_capacity(leaves.len());
    if let Some((_, dup)) = leaves.iter().find(|(_, name)| !seen.insert(name.as_str())) {
        return Err(DecompositionError::invalid_tree(format!("duplicate leaf name '{dup}'")));
    }

    let n = leaves.len();
    if n == 0 {
        return Err(DecompositionError::invalid_tree("tree has no leaves"));
    }

    // node id → bit index, in name order
    let leaf_bit: HashMap<usize, usize> = leaves
        .iter()
        .enumerate()
        .map(|(idx, &(node_id, _))| (node_id, idx))
        .collect();

    let root = tree.get_root().map_err(tree_error)?;
    let mut edges: Vec<(Bitset, f64)> = Vec::new();
    collect_edges(root, root, tree, &leaf_bit, words_for(n), &mut edges)?;

    let mut index: HashMap<Bitset, usize> = HashMap::new();
    let mut splits: Vec<Split> = Vec::new();
    for (below, length) in edges {
        let size = below.count_ones();
        if size == 0 || size == n {
            continue;
        }
        let side = canonicalize(below, n);
        match index.get(&side) {
            Some(&i) => {
                let merged = splits[i].weight() + length;
                splits[i].set_weight(merged);
            }
            None => {
                index.insert(side.clone(), splits.len());
                splits.push(Split::from_canonical_unchecked(side, n, length));
            }
        }
    }

    let names = leaves.into_iter().map(|(_, name)| name).collect();
    Ok((names, SplitSystem::from_splits(n, splits)?))
}

/// Parses a Newick string and converts the tree.
pub fn splits_from_newick_tree(newick: &str) -> Result<(Vec<String>, SplitSystem)> {
    let tree = PhyloTree::from_newick(newick)
        .map_err(|e| DecompositionError::invalid_tree(format!("cannot parse tree: {e}")))?;
    splits_from_tree(&tree)
}

/// Post-order DFS: pushes `(leaves below, parent edge length)` for every
/// non-root node and returns the leaf set below `node_id`.
fn collect_edges(
    node_id: usize,
    root: usize,
    tree: &PhyloTree,
    leaf_bit: &HashMap<usize, usize>,
    words: usize,
    edges: &mut Vec<(Bitset, f64)>,
) -> Result<Bitset> {
    let node = tree.get(&node_id).map_err(tree_error)?;

    let mut below = Bitset::zeros(words);
    if node.children.is_empty() {
        if let Some(&b) = leaf_bit.get(&node_id) {
            below.set(b);
        }
    } else {
        for &child_id in &node.children {
            let child = collect_edges(child_id, root, tree, leaf_bit, words, edges)?;
            below.or_assign(&child);
        }
    }

    if node_id != root {
        edges.push((below.clone(), node.parent_edge.unwrap_or(0.0)));
    }
    Ok(below)
}

fn tree_error(e: TreeError) -> DecompositionError {
    DecompositionError::invalid_tree(e.to_string())
}
