//! TypeScript rewriting engine for Recast
//!
//! - [`applier`]: turns [`ChangeDescription`]s into reference-consistent edits
//! - [`top_level`], [`solutions`], [`move_node`]: top-level node facts and the
//!   scored search that relocates one node
//! - [`references`]: the syntactic reference index behind [`ReferenceResolver`]

pub mod applier;
pub mod changes;
pub mod error;
pub mod imports;
pub mod move_node;
pub mod parser;
pub mod project;
pub mod references;
pub mod solutions;
pub mod top_level;
pub mod transformer;

pub use applier::{ApplyResult, AstChangeApplier, ChangeOutcome, ChangeReport, SkipReason};
pub use changes::ChangeDescription;
pub use error::{AstError, AstResult};
pub use move_node::{move_top_level_node, MoveProposal};
pub use parser::SourceRange;
pub use project::Project;
pub use references::{DeclarationTarget, Reference, ReferenceIndex, ReferenceNode, ReferenceResolver};
pub use solutions::{calculate_solutions, Solution, SolutionOptions};
pub use top_level::{
    build_move_top_level_node_fact, build_top_level_nodes, MoveTopLevelNodeFact,
    MoveTopLevelNodeUserCommand, TopLevelNode,
};
