//! Scored search for the best position of a relocated top-level node

use crate::top_level::TopLevelNode;
use recast_foundation::TopLevelNodeKind;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering policy for top-level nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionOptions {
    /// Preferred kind order; kinds not listed are unconstrained
    pub kind_order: Vec<TopLevelNodeKind>,
    /// Score added per ordering violation
    pub violation_weight: u32,
}

impl Default for SolutionOptions {
    fn default() -> Self {
        Self {
            kind_order: TopLevelNodeKind::default_order(),
            violation_weight: 1000,
        }
    }
}

impl SolutionOptions {
    fn rank(&self, kind: TopLevelNodeKind) -> Option<usize> {
        self.kind_order.iter().position(|k| *k == kind)
    }
}

/// One candidate placement of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub old_index: usize,
    pub new_index: usize,
    /// `distance + violation_weight * violations`; lower is better
    pub score: u64,
    pub distance: usize,
    pub violations: usize,
}

impl Solution {
    fn cmp_best_first(&self, other: &Solution) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.new_index.cmp(&other.new_index))
    }
}

/// All legal relocations of `nodes[selected]`, best first
///
/// Empty when the node already sits at its best position, including when it
/// ties with another candidate at a higher index.
pub fn calculate_solutions(
    nodes: &[TopLevelNode],
    selected: usize,
    options: &SolutionOptions,
) -> Vec<Solution> {
    if selected >= nodes.len() {
        return Vec::new();
    }

    let mut candidates: Vec<Solution> = (0..nodes.len())
        .filter(|candidate| is_legal(nodes, selected, *candidate))
        .map(|candidate| score(nodes, selected, candidate, options))
        .collect();
    candidates.sort_by(Solution::cmp_best_first);

    match candidates.first() {
        Some(best) if best.new_index != selected => candidates
            .into_iter()
            .filter(|solution| solution.new_index != selected)
            .collect(),
        _ => Vec::new(),
    }
}

/// Order of the other nodes relative to the moved one if it lands at `candidate`:
/// yields `(other_index, other_is_before_moved)`
fn relative_order(
    len: usize,
    selected: usize,
    candidate: usize,
) -> impl Iterator<Item = (usize, bool)> {
    (0..len).filter(move |other| *other != selected).map(move |other| {
        // position of `other` once the moved node is taken out
        let position = if other > selected { other - 1 } else { other };
        (other, position < candidate)
    })
}

fn is_legal(nodes: &[TopLevelNode], selected: usize, candidate: usize) -> bool {
    let moved = &nodes[selected];

    relative_order(nodes.len(), selected, candidate).all(|(other, before)| {
        let other = &nodes[other];
        let (first, second) = if before { (other, moved) } else { (moved, other) };

        // imports stay above everything else
        if second.kind == TopLevelNodeKind::Import && first.kind != TopLevelNodeKind::Import {
            return false;
        }

        // an eager node may not run before a non-hoisted declaration it uses
        !(first.kind.is_eager()
            && !second.kind.is_hoisted()
            && second
                .identifiers
                .iter()
                .any(|name| first.dependencies.contains(name)))
    })
}

fn score(nodes: &[TopLevelNode], selected: usize, candidate: usize, options: &SolutionOptions) -> Solution {
    let moved_rank = options.rank(nodes[selected].kind);

    let violations = match moved_rank {
        None => 0,
        Some(moved_rank) => relative_order(nodes.len(), selected, candidate)
            .filter(|(other, before)| match options.rank(nodes[*other].kind) {
                Some(other_rank) if *before => other_rank > moved_rank,
                Some(other_rank) => other_rank < moved_rank,
                None => false,
            })
            .count(),
    };

    let distance = candidate.abs_diff(selected);
    Solution {
        old_index: selected,
        new_index: candidate,
        score: distance as u64 + u64::from(options.violation_weight) * violations as u64,
        distance,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: TopLevelNodeKind, identifiers: &[&str], dependencies: &[&str]) -> TopLevelNode {
        TopLevelNode {
            kind,
            start: 0,
            end: 0,
            trivia_start: 0,
            trivia_end: 0,
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_misplaced_function_moves_below_class() {
        let nodes = vec![
            node(TopLevelNodeKind::Function, &["f"], &[]),
            node(TopLevelNodeKind::Class, &["C"], &[]),
            node(TopLevelNodeKind::Variable, &["v"], &[]),
        ];

        let solutions = calculate_solutions(&nodes, 0, &SolutionOptions::default());

        assert_eq!(solutions[0].new_index, 1);
        assert_eq!(solutions[0].score, 1);
        assert_eq!(solutions[0].violations, 0);
        assert_eq!(solutions[1].new_index, 2);
        assert_eq!(solutions[1].violations, 1);
    }

    #[test]
    fn test_node_in_best_position_yields_nothing() {
        let nodes = vec![
            node(TopLevelNodeKind::Class, &["C"], &[]),
            node(TopLevelNodeKind::Function, &["f"], &[]),
        ];

        assert!(calculate_solutions(&nodes, 0, &SolutionOptions::default()).is_empty());
        assert!(calculate_solutions(&nodes, 1, &SolutionOptions::default()).is_empty());
        assert!(calculate_solutions(&nodes, 7, &SolutionOptions::default()).is_empty());
    }

    #[test]
    fn test_imports_and_dependencies_bound_the_search() {
        let nodes = vec![
            node(TopLevelNodeKind::Import, &["x"], &[]),
            node(TopLevelNodeKind::Variable, &["v"], &[]),
            node(TopLevelNodeKind::Class, &["C"], &["v"]),
        ];

        // the class wants to go first but may neither pass the import nor its dependency
        assert!(calculate_solutions(&nodes, 2, &SolutionOptions::default()).is_empty());

        let nodes = vec![
            node(TopLevelNodeKind::Import, &["x"], &[]),
            node(TopLevelNodeKind::Variable, &["v"], &[]),
            node(TopLevelNodeKind::Class, &["C"], &[]),
        ];
        let solutions = calculate_solutions(&nodes, 2, &SolutionOptions::default());
        assert_eq!(solutions[0].new_index, 1);
        assert!(solutions.iter().all(|s| s.new_index != 0));
    }

    #[test]
    fn test_unlisted_kinds_are_unconstrained() {
        let options = SolutionOptions {
            kind_order: vec![TopLevelNodeKind::Class],
            violation_weight: 5,
        };
        let nodes = vec![
            node(TopLevelNodeKind::Function, &["f"], &[]),
            node(TopLevelNodeKind::Class, &["C"], &[]),
        ];
        assert!(calculate_solutions(&nodes, 0, &options).is_empty());
    }

    #[test]
    fn test_solutions_are_deterministic() {
        let nodes = vec![
            node(TopLevelNodeKind::Variable, &["v"], &[]),
            node(TopLevelNodeKind::Function, &["f"], &[]),
            node(TopLevelNodeKind::Class, &["C"], &[]),
            node(TopLevelNodeKind::Enum, &["E"], &[]),
        ];
        let options = SolutionOptions::default();
        let first = calculate_solutions(&nodes, 2, &options);
        for _ in 0..10 {
            assert_eq!(calculate_solutions(&nodes, 2, &options), first);
        }
        assert_eq!(first[0].new_index, 0);
    }
}
