//! CLI command handling for recast

mod state;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use recast_ast::{
    move_top_level_node, AstChangeApplier, ChangeDescription, ChangeOutcome, Project,
    SolutionOptions,
};
use recast_config::AppConfig;
use recast_services::{
    accept_job, clear_output_files, register_apply_result, register_move, EngineCommand,
    ExecutionCoordinator, FileSystemHost, JobHash, LogProgress, Registration, Resolution,
};
use state::StateSession;
use std::path::{Path, PathBuf};
use std::process;

/// The main CLI struct.
#[derive(Parser)]
#[command(name = "recast")]
#[command(about = "Reference-consistent TypeScript refactoring with reviewable jobs")]
#[command(version)]
pub struct Cli {
    /// The command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply change descriptions to a TypeScript project
    ///
    /// By default every rewritten file becomes a pending job. Use --write to
    /// persist the rewritten files directly instead.
    Apply {
        /// Project root; relative file paths in the changes are resolved against it
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// JSON file holding an array of change descriptions
        changes: PathBuf,
        /// Write rewritten files to disk instead of registering jobs
        #[arg(long)]
        write: bool,
    },
    /// Propose moving the top-level node at a line to its preferred position
    Move {
        /// TypeScript file to reorder
        file: PathBuf,
        /// Line (1-based) inside the node to move
        #[arg(long)]
        line: u32,
    },
    /// Review pending jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
    /// Run an external engine and register the jobs it produces
    ///
    /// Ctrl-C halts the execution; jobs already registered are kept.
    Engine {
        /// Engine executable; defaults to engine.executable from the configuration
        executable: Option<PathBuf>,
        /// Codemod set passed to the engine
        #[arg(long = "set")]
        codemod_set: Option<String>,
        /// Remove previous engine output before starting
        #[arg(long)]
        clear_output: bool,
        /// Extra arguments passed through to the engine, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum JobsCommand {
    /// List pending jobs grouped by case
    List {
        /// Print jobs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a pending job to its file
    Accept { hash: String },
    /// Discard a pending job; the same proposal will not be offered again
    Reject { hash: String },
    /// Drop every pending job and remove engine output
    Clear,
}

/// Main CLI entry point
pub async fn run() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    };
    recast_config::logging::initialize(&config);

    if let Err(e) = execute(cli.command, &config).await {
        eprintln!("❌ Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let mut session = StateSession::open(config).await?;

    let result = match command {
        Commands::Apply {
            root,
            changes,
            write,
        } => handle_apply(&mut session, &root, &changes, write).await,
        Commands::Move { file, line } => handle_move(&mut session, config, &file, line).await,
        Commands::Jobs { command } => handle_jobs(&mut session, config, command).await,
        Commands::Engine {
            executable,
            codemod_set,
            clear_output,
            args,
        } => match engine_command(config, executable, codemod_set, args) {
            Ok(command) => handle_engine(&mut session, config, command, clear_output).await,
            Err(e) => Err(e),
        },
    };

    // State is flushed even when the command failed part-way
    let closed = session.close().await;
    result.and(closed)
}

async fn handle_apply(
    session: &mut StateSession,
    root: &Path,
    changes_file: &Path,
    write: bool,
) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("Project root {} does not exist", root.display()))?;
    let text = tokio::fs::read_to_string(changes_file)
        .await
        .with_context(|| format!("Failed to read {}", changes_file.display()))?;
    let mut changes: Vec<ChangeDescription> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid change descriptions in {}", changes_file.display()))?;
    for change in &mut changes {
        change.resolve_against(&root);
    }

    let mut project = Project::load(&root)?;
    let before = project.clone();
    let result = AstChangeApplier::new(&mut project).apply(&changes);

    for report in &result.reports {
        match &report.outcome {
            ChangeOutcome::Applied { files, edits } => {
                println!(
                    "✅ {} {}: {} edit(s) in {} file(s)",
                    report.kind,
                    report.file.display(),
                    edits,
                    files.len()
                );
                if report.skipped_references > 0 {
                    println!(
                        "   {} reference(s) left untouched",
                        report.skipped_references
                    );
                }
            }
            ChangeOutcome::Skipped { reason } => {
                println!("⚠️  {} {}: skipped, {}", report.kind, report.file.display(), reason);
            }
        }
    }

    if write {
        AstChangeApplier::write_changes(&result)?;
        println!("Wrote {} file(s)", result.files.len());
    } else {
        let registrations = register_apply_result(&mut session.registry, &before, &result);
        print_registrations(&registrations);
    }
    session.sync();
    Ok(())
}

async fn handle_move(
    session: &mut StateSession,
    config: &AppConfig,
    file: &Path,
    line: u32,
) -> anyhow::Result<()> {
    if line == 0 {
        bail!("Lines are numbered from 1");
    }
    let file = std::fs::canonicalize(file)
        .with_context(|| format!("File {} does not exist", file.display()))?;
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let options = SolutionOptions {
        kind_order: config.move_top_level_node.kind_order.clone(),
        violation_weight: config.move_top_level_node.violation_weight,
    };

    match move_top_level_node(&file, &text, line - 1, &options)? {
        Some(proposal) => {
            let registration = register_move(&mut session.registry, &file, &proposal);
            println!(
                "Move node {} to position {} (score {})",
                proposal.solution.old_index + 1,
                proposal.solution.new_index + 1,
                proposal.solution.score
            );
            print_registrations(std::slice::from_ref(&registration));
        }
        None => println!("Nothing to move at {}:{}", file.display(), line),
    }
    session.sync();
    Ok(())
}

async fn handle_jobs(
    session: &mut StateSession,
    config: &AppConfig,
    command: JobsCommand,
) -> anyhow::Result<()> {
    match command {
        JobsCommand::List { json } => {
            if json {
                let jobs = session.registry.list_jobs(None);
                println!("{}", serde_json::to_string_pretty(&jobs)?);
                return Ok(());
            }
            if session.registry.is_empty() {
                println!("No pending jobs");
                return Ok(());
            }
            for case in session.registry.list_cases() {
                let jobs = session.registry.list_jobs(Some(&case.hash));
                println!("{}", case.label(jobs.len()));
                for job in jobs {
                    println!("  {}  {}  {}", job.hash, job.title, job.file_name.display());
                }
            }
        }
        JobsCommand::Accept { hash } => {
            let hash = JobHash::from(hash);
            let mut host = FileSystemHost;
            let resolution = accept_job(
                &mut session.registry,
                &hash,
                &mut host,
                config.jobs.save_document_on_accept,
            )
            .await;
            session.sync();
            match resolution? {
                Resolution::Resolved(job) => {
                    println!("✅ Applied {} to {}", job.title, job.file_name.display())
                }
                Resolution::NotFound => report_missing(&hash),
            }
        }
        JobsCommand::Reject { hash } => {
            let hash = JobHash::from(hash);
            let resolution = session.registry.reject(&hash);
            session.sync();
            match resolution {
                Resolution::Resolved(job) => println!("Rejected {}", job.title),
                Resolution::NotFound => report_missing(&hash),
            }
        }
        JobsCommand::Clear => {
            let count = session.registry.len();
            session.registry.clear();
            session.sync();
            clear_output_files(&config.engine.output_directory).await?;
            println!("Cleared {} job(s)", count);
        }
    }
    Ok(())
}

/// An unknown or already resolved job leaves the registry untouched
fn report_missing(hash: &JobHash) {
    tracing::warn!(job_hash = %hash, "No pending job with this hash");
    println!("No pending job {}", hash);
}

fn engine_command(
    config: &AppConfig,
    executable: Option<PathBuf>,
    codemod_set: Option<String>,
    args: Vec<String>,
) -> anyhow::Result<EngineCommand> {
    let executable = executable
        .or_else(|| config.engine.executable.clone())
        .context("No engine executable given and engine.executable is not configured")?;
    let mut command = EngineCommand::new(executable, &config.engine).args(args);
    if let Some(name) = codemod_set {
        command = command.codemod_set(name);
    }
    Ok(command)
}

async fn handle_engine(
    session: &mut StateSession,
    config: &AppConfig,
    command: EngineCommand,
    clear_output: bool,
) -> anyhow::Result<()> {
    if clear_output {
        clear_output_files(&config.engine.output_directory).await?;
    }

    let coordinator = ExecutionCoordinator::new();
    let execution = coordinator.start(command, Box::new(LogProgress))?;

    let halter = coordinator.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; halting engine execution");
            halter.halt();
        }
    });

    let summary = execution.run(&mut session.registry).await;
    interrupt.abort();
    session.sync();

    let summary = summary?;
    println!(
        "{} {}: {} job(s) from {} file(s), {} undecodable line(s)",
        if summary.halted { "⏹️  Halted" } else { "✅ Finished" },
        summary.execution_id,
        summary.jobs_created,
        summary.file_count,
        summary.decode_failures
    );
    if let Some(code) = summary.exit_code.filter(|code| *code != 0) {
        tracing::warn!(exit_code = code, "Engine exited with a failure status");
    }
    Ok(())
}

fn print_registrations(registrations: &[Registration]) {
    for registration in registrations {
        match registration {
            Registration::Created(hash) => println!("  + job {}", hash),
            Registration::Existing(hash) => println!("  = job {} (already pending)", hash),
            Registration::PreviouslyRejected(hash) => {
                println!("  - job {} (rejected earlier, not offered again)", hash)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recast_services::{JobKind, StateStore};
    use recast_test_support::{fixtures, TestWorkspace};

    fn config_in(workspace: &TestWorkspace) -> AppConfig {
        let mut config = AppConfig::default();
        config.jobs.state_file = workspace.absolute_path(".recast/localState.json");
        config.jobs.persist_debounce_ms = 10;
        config.engine.output_directory = workspace.absolute_path(".recast/engine-output");
        config
    }

    #[test]
    fn test_cli_parses_engine_passthrough_arguments() {
        let cli = Cli::parse_from([
            "recast", "engine", "./engine", "--set", "next-13", "--", "--dry-run", "src",
        ]);
        match cli.command {
            Commands::Engine {
                executable,
                codemod_set,
                args,
                ..
            } => {
                assert_eq!(executable, Some(PathBuf::from("./engine")));
                assert_eq!(codemod_set.as_deref(), Some("next-13"));
                assert_eq!(args, vec!["--dry-run".to_string(), "src".to_string()]);
            }
            _ => panic!("expected engine command"),
        }
    }

    #[tokio::test]
    async fn test_apply_registers_jobs_then_accept_writes_them() {
        let workspace = TestWorkspace::new();
        workspace.setup_typescript_project(&[
            ("src/math.ts", fixtures::SUM_MODULE),
            ("src/report.ts", fixtures::SUM_CALLER),
        ]);
        let changes = workspace.create_json(
            "changes.json",
            &serde_json::json!([{
                "kind": "functionParameterDeleted",
                "filePath": "src/math.ts",
                "functionName": "sum",
                "parameters": ["a", "b", "c"],
                "deletedParameter": "b"
            }]),
        );
        let config = config_in(&workspace);

        execute(
            Commands::Apply {
                root: workspace.path().to_path_buf(),
                changes,
                write: false,
            },
            &config,
        )
        .await
        .unwrap();

        // nothing on disk changes until a job is accepted
        assert_eq!(workspace.read_file("src/report.ts"), fixtures::SUM_CALLER);

        let state = StateStore::new(&config.jobs.state_file).load().await.unwrap();
        assert_eq!(state.jobs.len(), 2);
        let job = state
            .jobs
            .iter()
            .find(|job| job.file_name.ends_with("src/report.ts"))
            .unwrap();
        assert!(matches!(job.kind, JobKind::ApplyAstChange { .. }));

        execute(
            Commands::Jobs {
                command: JobsCommand::Accept {
                    hash: job.hash.to_string(),
                },
            },
            &config,
        )
        .await
        .unwrap();

        assert!(workspace.read_file("src/report.ts").contains("sum(7, 9)"));
        assert_eq!(workspace.read_file("src/math.ts"), fixtures::SUM_MODULE);
        let state = StateStore::new(&config.jobs.state_file).load().await.unwrap();
        assert_eq!(state.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_move_registers_a_relocation_job() {
        let workspace = TestWorkspace::new();
        workspace.create_file("src/service.ts", fixtures::MISORDERED_MODULE);
        let config = config_in(&workspace);

        execute(
            Commands::Move {
                file: workspace.absolute_path("src/service.ts"),
                line: 3,
            },
            &config,
        )
        .await
        .unwrap();

        let state = StateStore::new(&config.jobs.state_file).load().await.unwrap();
        assert_eq!(state.jobs.len(), 1);
        assert!(matches!(state.jobs[0].kind, JobKind::MoveTopLevelNode { .. }));
    }

    #[tokio::test]
    async fn test_resolving_an_unknown_job_is_a_no_op() {
        let workspace = TestWorkspace::new();
        let config = config_in(&workspace);

        for command in [
            JobsCommand::Reject {
                hash: "0123456789abcdef0123".to_string(),
            },
            JobsCommand::Accept {
                hash: "0123456789abcdef0123".to_string(),
            },
        ] {
            execute(Commands::Jobs { command }, &config).await.unwrap();
        }

        assert!(!config.jobs.state_file.exists());
    }

    #[tokio::test]
    async fn test_engine_without_executable_is_rejected() {
        let workspace = TestWorkspace::new();
        let config = config_in(&workspace);

        let err = execute(
            Commands::Engine {
                executable: None,
                codemod_set: None,
                clear_output: false,
                args: Vec::new(),
            },
            &config,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("engine.executable"));
    }
}
