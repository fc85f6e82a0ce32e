//! Engine line protocol and execution lifecycle

use pretty_assertions::assert_eq;
use recast_services::{
    EngineCommand, EngineError, EngineLineConsumer, ExecutionCoordinator, JobKind, JobRegistry,
    LineOutcome, LogProgress,
};
use recast_config::EngineConfig;
use recast_test_support::TestWorkspace;

#[test]
fn malformed_line_between_valid_lines_is_skipped() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/a.ts", "const a = 1;\n");
    workspace.create_file(".recast/engine-output/1.ts", "const a = 2;\n");

    let input = workspace.absolute_path("src/a.ts");
    let output = workspace.absolute_path(".recast/engine-output/1.ts");
    let lines = [
        r#"{"k":6,"p":0,"t":1}"#.to_string(),
        r#"{"k":3,"i":"/src/a.ts","o":"#.to_string(),
        serde_json::json!({"k": 3, "i": input, "o": output, "c": "rename-const"}).to_string(),
    ];

    let mut registry = JobRegistry::new();
    let mut consumer = EngineLineConsumer::new("set", Box::new(LogProgress));
    let outcomes: Vec<LineOutcome> = lines
        .iter()
        .map(|line| consumer.consume(line, &mut registry))
        .collect();

    assert_eq!(outcomes[0], LineOutcome::Progress { processed: 0, total: 1 });
    assert!(matches!(outcomes[1], LineOutcome::DecodeFailed(_)));
    assert!(matches!(&outcomes[2], LineOutcome::Job(registration) if registration.is_created()));

    assert_eq!(registry.len(), 1);
    assert_eq!(consumer.jobs_created(), 1);
    assert_eq!(consumer.decode_failures(), 1);

    let job = registry.list_jobs(None)[0];
    assert_eq!(job.file_name, input);
    assert!(matches!(job.kind, JobKind::RewriteFile { .. }));
    assert_eq!(job.replacement().unwrap(), "const a = 2;\n");
    assert_eq!(
        registry.case_label(&registry.list_cases()[0].hash).unwrap(),
        "Case: Rewrite Files (rename-const) (1)"
    );
}

#[cfg(unix)]
fn engine_script(workspace: &TestWorkspace, body: &str) -> EngineCommand {
    workspace.create_file("engine.sh", body);
    let config = EngineConfig {
        executable: None,
        file_limit: 10,
        output_directory: workspace.absolute_path(".recast/engine-output"),
    };
    EngineCommand::new("sh", &config)
        .args([workspace.absolute_path("engine.sh").display().to_string()])
        .working_directory(workspace.path())
}

#[cfg(unix)]
#[tokio::test]
async fn execution_registers_jobs_and_releases_the_slot() {
    let workspace = TestWorkspace::new();
    workspace.create_file("src/a.ts", "const a = 1;\n");
    let input = workspace.absolute_path("src/a.ts");
    let output = workspace.absolute_path(".recast/engine-output/1.ts");

    let script = format!(
        "printf '%s\\n' '{{\"k\":6,\"p\":1,\"t\":2}}'\n\
         printf '%s\\n' 'not json'\n\
         printf '%s\\n' '{{\"k\":3,\"i\":\"{}\",\"o\":\"{}\",\"c\":\"m\"}}'\n\
         printf '%s\\n' '{{\"k\":2}}'\n\
         echo 'engine diagnostics' >&2\n",
        input.display(),
        output.display()
    );
    let command = engine_script(&workspace, &script);

    let coordinator = ExecutionCoordinator::new();
    let session = coordinator.start(command.clone(), Box::new(LogProgress)).unwrap();
    assert!(coordinator.is_running());

    let second = coordinator.start(command, Box::new(LogProgress));
    assert!(matches!(second, Err(EngineError::ExecutionInProgress)));

    let mut registry = JobRegistry::new();
    let summary = session.run(&mut registry).await.unwrap();

    assert_eq!(summary.jobs_created, 1);
    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.exit_code, Some(0));
    assert!(!summary.halted);
    assert_eq!(registry.len(), 1);
    assert!(!coordinator.is_running());
    assert!(workspace.file_exists(".recast/engine-output"));
}

#[cfg(unix)]
#[tokio::test]
async fn halted_execution_stops_translating_lines() {
    let workspace = TestWorkspace::new();
    // waits for the shutdown command before emitting anything
    let command = engine_script(
        &workspace,
        "read command\n\
         printf '%s\\n' \"{\\\"k\\\":4,\\\"p\\\":\\\"/p/$command.ts\\\",\\\"o\\\":\\\"/o/1\\\",\\\"c\\\":\\\"m\\\"}\"\n",
    );

    let coordinator = ExecutionCoordinator::new();
    let session = coordinator.start(command, Box::new(LogProgress)).unwrap();
    assert!(coordinator.halt());

    let mut registry = JobRegistry::new();
    let summary = session.run(&mut registry).await.unwrap();

    assert!(summary.halted);
    assert_eq!(summary.jobs_created, 0);
    assert!(registry.is_empty());
    assert!(!coordinator.halt());
}
