//! Services around the rewriting engine: the job/case registry, persisted
//! state, the external engine protocol and materialisation of accepted jobs.

pub mod engine;
pub mod error;
pub mod jobs;
pub mod materialize;
pub mod persistence;
pub mod proposals;
pub mod registry;

pub use engine::{
    clear_output_files, EngineCommand, EngineLineConsumer, EngineMessage, ExecutionCoordinator,
    ExecutionSession, ExecutionSummary, LineOutcome, LogProgress, ProgressSink,
};
pub use error::{EngineError, EngineResult};
pub use jobs::{Case, CaseHash, CaseKind, Job, JobHash, JobKind};
pub use materialize::{accept_job, DocumentHost, FileSystemHost, InMemoryHost};
pub use persistence::{PersistedState, PersistenceWorker, StateStore};
pub use proposals::{register_apply_result, register_move};
pub use registry::{JobRegistry, Registration, RegistryEvent, Resolution};
