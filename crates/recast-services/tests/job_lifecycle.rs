//! Registry lifecycle across persistence and materialisation

use pretty_assertions::assert_eq;
use recast_ast::{AstChangeApplier, ChangeDescription, Project};
use recast_services::{
    accept_job, register_apply_result, FileSystemHost, JobRegistry, PersistenceWorker,
    Registration, Resolution, StateStore,
};
use recast_test_support::{fixtures, TestWorkspace};
use std::time::Duration;

fn split_strings(workspace: &TestWorkspace) -> (Project, recast_ast::ApplyResult) {
    let mut project = Project::load(workspace.path()).unwrap();
    let before = project.clone();
    let result = AstChangeApplier::new(&mut project).apply(&[ChangeDescription::ClassSplit {
        file_path: workspace.absolute_path("src/strings.ts"),
        class_name: "Strings".to_string(),
    }]);
    (before, result)
}

#[tokio::test]
async fn accepted_jobs_reach_the_disk_and_state_survives_a_restart() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/strings.ts", fixtures::STRINGS_MODULE),
        ("src/app.ts", fixtures::STRINGS_CALLER),
    ]);
    let store = StateStore::new(workspace.absolute_path(".recast/localState.json"));

    let (before, result) = split_strings(&workspace);
    let mut registry = JobRegistry::new();
    let mut events = registry.subscribe();
    let worker = PersistenceWorker::spawn(store.clone(), Duration::from_millis(50));

    let registrations = register_apply_result(&mut registry, &before, &result);
    assert_eq!(registrations.len(), 2);
    while events.try_recv().is_ok() {
        worker.update(registry.to_persisted());
    }
    worker.shutdown().await.unwrap();

    // a fresh process sees the same pending jobs
    let mut restored = JobRegistry::from_persisted(store.load().await.unwrap());
    assert_eq!(restored.len(), 2);

    let app = workspace.absolute_path("src/app.ts");
    let hash = restored.jobs_for_file(&app)[0].hash.clone();
    let resolution = accept_job(&mut restored, &hash, &mut FileSystemHost, true)
        .await
        .unwrap();

    assert!(matches!(resolution, Resolution::Resolved(_)));
    assert_eq!(
        workspace.read_file("src/app.ts"),
        "import { shout } from './strings';\n\nexport const greeting = shout('hello');\n"
    );
    assert_eq!(restored.len(), 1);

    // accepting twice is harmless
    let again = accept_job(&mut restored, &hash, &mut FileSystemHost, true)
        .await
        .unwrap();
    assert_eq!(again, Resolution::NotFound);
}

#[tokio::test]
async fn rejected_proposals_stay_rejected_after_reanalysis() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/strings.ts", fixtures::STRINGS_MODULE),
        ("src/app.ts", fixtures::STRINGS_CALLER),
    ]);

    let (before, result) = split_strings(&workspace);
    let mut registry = JobRegistry::new();
    register_apply_result(&mut registry, &before, &result);

    let hashes: Vec<_> = registry.list_jobs(None).iter().map(|job| job.hash.clone()).collect();
    for hash in &hashes {
        assert!(matches!(registry.reject(hash), Resolution::Resolved(_)));
    }
    assert!(registry.list_jobs(None).is_empty());
    assert!(registry.list_cases().is_empty());

    let (before, result) = split_strings(&workspace);
    let registrations = register_apply_result(&mut registry, &before, &result);
    assert!(registrations
        .iter()
        .all(|r| matches!(r, Registration::PreviouslyRejected(_))));
    assert!(registry.list_jobs(None).is_empty());

    // nothing was written
    assert_eq!(workspace.read_file("src/strings.ts"), fixtures::STRINGS_MODULE);
}
