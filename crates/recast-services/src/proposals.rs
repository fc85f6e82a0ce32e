//! Turning applier results and move proposals into registered jobs

use crate::jobs::{Case, CaseKind, Job};
use crate::registry::{JobRegistry, Registration};
use recast_ast::{ApplyResult, ChangeOutcome, MoveProposal, Project};
use std::path::Path;

/// Register one whole-file job per file rewritten by the applier
///
/// `before` is the project as it was before the changes were applied.
pub fn register_apply_result(
    registry: &mut JobRegistry,
    before: &Project,
    result: &ApplyResult,
) -> Vec<Registration> {
    let case = Case::new(CaseKind::ApplyAstChanges, "");

    result
        .files
        .iter()
        .map(|(path, new_text)| {
            let mut kinds: Vec<&str> = result
                .reports
                .iter()
                .filter(|report| match &report.outcome {
                    ChangeOutcome::Applied { files, .. } => files.contains(path),
                    ChangeOutcome::Skipped { .. } => false,
                })
                .map(|report| report.kind)
                .collect();
            kinds.dedup();

            let old_text = before.get(path).unwrap_or_default();
            let job = Job::ast_change(path, &kinds.join(", "), old_text, new_text);
            registry.register_job(case.clone(), job)
        })
        .collect()
}

pub fn register_move(registry: &mut JobRegistry, file: &Path, proposal: &MoveProposal) -> Registration {
    let job = Job::move_top_level_node(file, proposal);
    registry.register_job(Case::new(CaseKind::MoveTopLevelBlocks, ""), job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobKind;
    use pretty_assertions::assert_eq;
    use recast_ast::{move_top_level_node, AstChangeApplier, ChangeDescription, SolutionOptions};
    use std::path::PathBuf;

    #[test]
    fn test_apply_result_becomes_one_job_per_file() {
        let mut project = Project::from_files([
            ("/p/a.ts", "export function f(a: number) {}\nf(1, 2);\n"),
            ("/p/b.ts", "import { f } from './a';\nf(3, 4);\n"),
        ]);
        let before = project.clone();
        let result = AstChangeApplier::new(&mut project).apply(&[
            ChangeDescription::FunctionParameterDeleted {
                file_path: PathBuf::from("/p/a.ts"),
                function_name: "f".to_string(),
                parameters: vec!["a".to_string(), "b".to_string()],
                deleted_parameter: "b".to_string(),
            },
        ]);

        let mut registry = JobRegistry::new();
        let registrations = register_apply_result(&mut registry, &before, &result);
        assert_eq!(registrations.len(), 2);
        assert!(registrations.iter().all(Registration::is_created));

        let job = registry.jobs_for_file(Path::new("/p/b.ts"))[0];
        assert_eq!(job.title, "Apply functionParameterDeleted to b.ts");
        assert_eq!(job.replacement().unwrap(), "import { f } from './a';\nf(3);\n");

        // re-running the same analysis yields the same identities
        let again = register_apply_result(&mut registry, &before, &result);
        assert!(again.iter().all(|r| matches!(r, Registration::Existing(_))));
    }

    #[test]
    fn test_move_proposal_becomes_job() {
        let text = "function f() {}\nclass C {}\n";
        let proposal = move_top_level_node(Path::new("/p/a.ts"), text, 0, &SolutionOptions::default())
            .unwrap()
            .unwrap();

        let mut registry = JobRegistry::new();
        let registration = register_move(&mut registry, Path::new("/p/a.ts"), &proposal);
        let job = registry.get(registration.hash()).unwrap();

        assert!(matches!(job.kind, JobKind::MoveTopLevelNode { old_index: 0, new_index: 1, .. }));
        assert_eq!(job.title, "Move top-level node 1 to position 2");
        assert_eq!(
            registry.case_label(&registry.list_cases()[0].hash).unwrap(),
            "Case: Move Top-Level Blocks (1)"
        );
    }
}
