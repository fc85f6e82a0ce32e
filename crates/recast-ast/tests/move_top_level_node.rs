//! Relocation proposals over a realistic module

use pretty_assertions::assert_eq;
use recast_ast::{
    build_top_level_nodes, calculate_solutions, move_top_level_node, SolutionOptions,
};
use recast_foundation::{apply_edits, TextEdit, TopLevelNodeKind};
use recast_test_support::fixtures::MISORDERED_MODULE;
use std::path::Path;

const FILE: &str = "src/service.ts";

#[test]
fn function_is_moved_below_the_class() {
    let proposal = move_top_level_node(Path::new(FILE), MISORDERED_MODULE, 2, &SolutionOptions::default())
        .unwrap()
        .expect("helper should move");

    assert_eq!(proposal.solution.old_index, 1);
    assert_eq!(proposal.solution.new_index, 2);
    assert_eq!(proposal.solution.violations, 0);

    let (moved, _) = apply_edits(
        MISORDERED_MODULE,
        &[TextEdit::replace(proposal.start, proposal.end, proposal.replacement)],
    );
    assert_eq!(
        moved,
        "import { x } from './x';\n\n// The main service\nclass Service {\n    run() {\n        return helper();\n    }\n}\n\nfunction helper(): number {\n    return x;\n}\n\nconst instance = new Service();\n"
    );
}

#[test]
fn well_placed_dependent_node_is_left_alone() {
    let proposal =
        move_top_level_node(Path::new(FILE), MISORDERED_MODULE, 13, &SolutionOptions::default())
            .unwrap();
    assert_eq!(proposal, None);
}

#[test]
fn solving_is_deterministic() {
    let nodes = build_top_level_nodes(Path::new(FILE), MISORDERED_MODULE).unwrap();
    let options = SolutionOptions::default();

    let first = calculate_solutions(&nodes, 1, &options);
    for _ in 0..5 {
        assert_eq!(calculate_solutions(&nodes, 1, &options), first);
    }
}

#[test]
fn custom_kind_order_changes_the_outcome() {
    // Functions first: the helper is already where it belongs
    let options = SolutionOptions {
        kind_order: vec![
            TopLevelNodeKind::Function,
            TopLevelNodeKind::Class,
            TopLevelNodeKind::Variable,
        ],
        violation_weight: 50,
    };
    let proposal = move_top_level_node(Path::new(FILE), MISORDERED_MODULE, 2, &options).unwrap();
    assert_eq!(proposal, None);
}
