//! End-to-end change application against projects loaded from disk

use pretty_assertions::assert_eq;
use recast_ast::{AstChangeApplier, ChangeDescription, ChangeOutcome, Project};
use recast_test_support::fixtures;
use recast_test_support::TestWorkspace;

fn load(workspace: &TestWorkspace) -> Project {
    Project::load(workspace.path()).expect("workspace should load")
}

#[test]
fn parameter_deletion_rewrites_every_positional_call_site() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/math.ts", fixtures::SUM_MODULE),
        ("src/report.ts", fixtures::SUM_CALLER),
    ]);

    let mut project = load(&workspace);
    let change = ChangeDescription::FunctionParameterDeleted {
        file_path: workspace.absolute_path("src/math.ts"),
        function_name: "sum".to_string(),
        parameters: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        deleted_parameter: "b".to_string(),
    };
    let result = AstChangeApplier::new(&mut project).apply(&[change]);

    assert_eq!(result.files.len(), 2);
    assert_eq!(
        result.files[&workspace.absolute_path("src/math.ts")],
        "export function sum(a: number, c: number): number {\n    return a + c;\n}\n\nexport const total = sum(1, 3);\n"
    );
    assert_eq!(
        result.files[&workspace.absolute_path("src/report.ts")],
        "import { sum } from './math';\n\nconst values: [number, number, number] = [4, 5, 6];\nconsole.log(sum(7, 9));\nconsole.log(sum(...values));\n"
    );
    assert_eq!(result.reports[0].skipped_references, 1);

    // Nothing reaches the disk until the caller asks for it
    assert_eq!(workspace.read_file("src/report.ts"), fixtures::SUM_CALLER);
}

#[test]
fn class_split_replaces_class_with_exported_function() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/strings.ts", fixtures::STRINGS_MODULE),
        ("src/app.ts", fixtures::STRINGS_CALLER),
        ("src/feature/view.ts", fixtures::STRINGS_SECOND_CALLER),
    ]);

    let mut project = load(&workspace);
    let change = ChangeDescription::ClassSplit {
        file_path: workspace.absolute_path("src/strings.ts"),
        class_name: "Strings".to_string(),
    };
    let result = AstChangeApplier::new(&mut project).apply(&[change]);

    let strings = &result.files[&workspace.absolute_path("src/strings.ts")];
    assert_eq!(
        strings,
        "export function shout(text: string): string {\n    return text.toUpperCase() + '!';\n}\n"
    );
    assert!(!strings.contains("class Strings"));
    assert_eq!(strings.matches("export function shout").count(), 1);

    assert_eq!(
        result.files[&workspace.absolute_path("src/app.ts")],
        "import { shout } from './strings';\n\nexport const greeting = shout('hello');\n"
    );
    assert_eq!(
        result.files[&workspace.absolute_path("src/feature/view.ts")],
        "import { shout } from '../strings';\nimport { other } from './other';\n\nconsole.log(shout(other));\n"
    );
}

#[test]
fn failed_change_does_not_block_later_changes() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/math.ts", fixtures::SUM_MODULE),
        ("src/report.ts", fixtures::SUM_CALLER),
    ]);

    let mut project = load(&workspace);
    let changes = vec![
        ChangeDescription::ClassSplit {
            file_path: workspace.absolute_path("src/missing.ts"),
            class_name: "Gone".to_string(),
        },
        ChangeDescription::FunctionParameterDeleted {
            file_path: workspace.absolute_path("src/math.ts"),
            function_name: "sum".to_string(),
            parameters: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            deleted_parameter: "b".to_string(),
        },
    ];
    let result = AstChangeApplier::new(&mut project).apply(&changes);

    assert!(matches!(result.reports[0].outcome, ChangeOutcome::Skipped { .. }));
    assert!(matches!(result.reports[1].outcome, ChangeOutcome::Applied { .. }));
    assert_eq!(result.files.len(), 2);
}

#[test]
fn write_changes_persists_rewritten_files() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        ("src/strings.ts", fixtures::STRINGS_MODULE),
        ("src/app.ts", fixtures::STRINGS_CALLER),
    ]);

    let mut project = load(&workspace);
    let result = AstChangeApplier::new(&mut project).apply(&[ChangeDescription::ClassSplit {
        file_path: workspace.absolute_path("src/strings.ts"),
        class_name: "Strings".to_string(),
    }]);
    AstChangeApplier::write_changes(&result).unwrap();

    assert_eq!(
        workspace.read_file("src/app.ts"),
        "import { shout } from './strings';\n\nexport const greeting = shout('hello');\n"
    );
    let reloaded = load(&workspace);
    assert_eq!(
        reloaded.get(&workspace.absolute_path("src/strings.ts")),
        Some(result.files[&workspace.absolute_path("src/strings.ts")].as_str())
    );
}

#[test]
fn change_descriptions_deserialize_from_json() {
    let workspace = TestWorkspace::new();
    let path = workspace.create_json(
        "changes.json",
        &serde_json::json!([
            {
                "kind": "classMethodParameterDeleted",
                "filePath": "src/a.ts",
                "className": "A",
                "methodName": "m",
                "parameters": ["x", "y"],
                "parameter": "y"
            },
            { "kind": "classSplit", "filePath": "src/b.ts", "className": "B" }
        ]),
    );

    let text = std::fs::read_to_string(path).unwrap();
    let changes: Vec<ChangeDescription> = serde_json::from_str(&text).unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].deleted_parameter_index(), Some(1));
    assert_eq!(changes[1].kind_name(), "classSplit");
}

fn split(workspace: &TestWorkspace, file: &str, class_name: &str) -> recast_ast::ApplyResult {
    let mut project = load(workspace);
    AstChangeApplier::new(&mut project).apply(&[ChangeDescription::ClassSplit {
        file_path: workspace.absolute_path(file),
        class_name: class_name.to_string(),
    }])
}

#[test]
fn parameter_deletion_leaves_calls_through_shadowing_bindings_alone() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        (
            "src/a.ts",
            "export function f(a: number, c: number) {}\nfunction g(f: (x: number, y: number) => void) {\n    f(1, 2);\n}\nf(1, 2, 3);\n",
        ),
        (
            "src/b.ts",
            "import { f } from './a';\n\nexport function run(f: (n: number, m: number) => number) {\n    const inner = () => f(7, 8);\n    return f(1, 2) + inner();\n}\nf(4, 5, 6);\n",
        ),
    ]);

    let mut project = load(&workspace);
    let result = AstChangeApplier::new(&mut project).apply(&[ChangeDescription::FunctionParameterDeleted {
        file_path: workspace.absolute_path("src/a.ts"),
        function_name: "f".to_string(),
        parameters: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        deleted_parameter: "b".to_string(),
    }]);

    assert_eq!(
        result.files[&workspace.absolute_path("src/a.ts")],
        "export function f(a: number, c: number) {}\nfunction g(f: (x: number, y: number) => void) {\n    f(1, 2);\n}\nf(1, 3);\n"
    );
    assert_eq!(
        result.files[&workspace.absolute_path("src/b.ts")],
        "import { f } from './a';\n\nexport function run(f: (n: number, m: number) => number) {\n    const inner = () => f(7, 8);\n    return f(1, 2) + inner();\n}\nf(4, 6);\n"
    );
    assert_eq!(result.reports[0].skipped_references, 0);
}

#[test]
fn class_split_reuses_an_import_that_keeps_other_names() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        (
            "src/util.ts",
            "export class Util {\n    static readonly k = 3;\n}\n\nexport const Other = 1;\n",
        ),
        (
            "src/main.ts",
            "import { Util, Other } from './util';\n\nconsole.log(Util.k + Other);\n",
        ),
    ]);

    let result = split(&workspace, "src/util.ts", "Util");

    assert_eq!(
        result.files[&workspace.absolute_path("src/util.ts")],
        "export const k = 3;\n\nexport const Other = 1;\n"
    );
    assert_eq!(
        result.files[&workspace.absolute_path("src/main.ts")],
        "import { k, Other } from './util';\n\nconsole.log(k + Other);\n"
    );
}

#[test]
fn class_split_keeps_a_class_with_instance_members_and_imports_promoted_names() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[
        (
            "src/counter.ts",
            "export class Counter {\n    count = 0;\n    static create(): Counter {\n        return new Counter();\n    }\n}\n",
        ),
        (
            "src/app.ts",
            "import { Counter } from './counter';\n\nexport const counter: Counter = Counter.create();\n",
        ),
    ]);

    let result = split(&workspace, "src/counter.ts", "Counter");

    assert_eq!(
        result.files[&workspace.absolute_path("src/counter.ts")],
        "export function create(): Counter {\n    return new Counter();\n}\n\nexport class Counter {\n    count = 0;\n}\n"
    );
    assert_eq!(
        result.files[&workspace.absolute_path("src/app.ts")],
        "import { create } from './counter';\nimport { Counter } from './counter';\n\nexport const counter: Counter = create();\n"
    );
}

#[test]
fn class_split_inside_a_function_does_not_export_promoted_members() {
    let workspace = TestWorkspace::new();
    workspace.setup_typescript_project(&[(
        "src/outer.ts",
        "export function outer(): number {\n    class Inner {\n        static readonly k = 2;\n        static twice(x: number): number {\n            return x * Inner.k;\n        }\n    }\n    return Inner.twice(3);\n}\n",
    )]);

    let result = split(&workspace, "src/outer.ts", "Inner");

    let outer = &result.files[&workspace.absolute_path("src/outer.ts")];
    assert_eq!(
        outer,
        "export function outer(): number {\n    const k = 2;\n\n    function twice(x: number): number {\n        return x * k;\n    }\n    return twice(3);\n}\n"
    );
    assert_eq!(outer.matches("export").count(), 1);
}
