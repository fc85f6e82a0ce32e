//! Move-top-level-node pipeline: user command, fact, best solution, replacement

use crate::error::AstResult;
use crate::solutions::{Solution, SolutionOptions};
use crate::top_level::{build_move_top_level_node_fact, MoveTopLevelNodeUserCommand, TopLevelNode};
use recast_foundation::EditLocation;
use serde::Serialize;
use std::path::Path;

/// A concrete relocation ready to become a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveProposal {
    pub solution: Solution,
    /// Replaced byte range of the original text
    pub start: usize,
    pub end: usize,
    /// The same range as line/column pairs
    pub location: EditLocation,
    pub replacement: String,
}

/// Propose the best relocation of the node covering `line` (zero-based)
///
/// `None` when no node covers the line or the node is already where it belongs.
pub fn move_top_level_node(
    file_name: &Path,
    file_text: &str,
    line: u32,
    options: &SolutionOptions,
) -> AstResult<Option<MoveProposal>> {
    let command =
        MoveTopLevelNodeUserCommand::for_line(file_name, file_text, line, options.clone());
    let fact = build_move_top_level_node_fact(&command)?;

    let Some(best) = fact
        .solutions
        .first()
        .and_then(|solutions| solutions.first())
        .copied()
    else {
        tracing::debug!(file = %file_name.display(), line, "No relocation proposed");
        return Ok(None);
    };

    let (start, end, replacement) = reorder(file_text, &fact.nodes, &best);
    Ok(Some(MoveProposal {
        solution: best,
        start,
        end,
        location: fact.line_index.location(start, end),
        replacement,
    }))
}

/// Text of the nodes between the old and new index after applying `solution`
///
/// Line breaks separating nodes stay in their slots; comments travel with
/// the node they precede.
pub fn reorder(text: &str, nodes: &[TopLevelNode], solution: &Solution) -> (usize, usize, String) {
    let low = solution.old_index.min(solution.new_index);
    let high = solution.old_index.max(solution.new_index);

    let mut order: Vec<usize> = (low..=high).collect();
    let moved = order.remove(solution.old_index - low);
    order.insert(solution.new_index - low, moved);

    let mut replacement = String::new();
    for (slot, source) in (low..=high).zip(order) {
        let (leading, _) = nodes[slot].split_trivia(text);
        let (_, content) = nodes[source].split_trivia(text);
        replacement.push_str(leading);
        replacement.push_str(content);
    }

    (nodes[low].trivia_start, nodes[high].trivia_end, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recast_foundation::apply_edits;
    use recast_foundation::TextEdit;

    #[test]
    fn test_function_moves_below_class() {
        let text = "// f\nfunction f() {}\n\nclass C {}\n\nconst v = 1;\n";
        let proposal = move_top_level_node(Path::new("a.ts"), text, 1, &SolutionOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(proposal.solution.old_index, 0);
        assert_eq!(proposal.solution.new_index, 1);
        assert_eq!(proposal.replacement, "class C {}\n\n// f\nfunction f() {}");

        let (result, _) = apply_edits(
            text,
            &[TextEdit::replace(proposal.start, proposal.end, proposal.replacement)],
        );
        assert_eq!(result, "class C {}\n\n// f\nfunction f() {}\n\nconst v = 1;\n");
    }

    #[test]
    fn test_well_placed_node_yields_no_proposal() {
        let text = "class C {}\nfunction f() {}\n";
        let proposal =
            move_top_level_node(Path::new("a.ts"), text, 0, &SolutionOptions::default()).unwrap();
        assert_eq!(proposal, None);
    }

    #[test]
    fn test_line_outside_nodes_yields_no_proposal() {
        let text = "class C {}\n\n\n";
        let proposal =
            move_top_level_node(Path::new("a.ts"), text, 3, &SolutionOptions::default()).unwrap();
        assert_eq!(proposal, None);
    }
}
