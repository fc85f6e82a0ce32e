//! Job/case registry
//!
//! The registry exclusively owns job and case lifetimes. A job lives from its
//! first registration until it is accepted or rejected; a case lives as long
//! as it has jobs. Rejected hashes are remembered so that the same proposal
//! is not offered again.

use crate::jobs::{Case, CaseHash, Job, JobHash};
use crate::persistence::PersistedState;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::mpsc;

/// Result of offering a job to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(JobHash),
    /// A job with the same hash is already pending
    Existing(JobHash),
    /// The same proposal was rejected before
    PreviouslyRejected(JobHash),
}

impl Registration {
    pub fn hash(&self) -> &JobHash {
        match self {
            Registration::Created(hash)
            | Registration::Existing(hash)
            | Registration::PreviouslyRejected(hash) => hash,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// Result of accepting or rejecting a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Job),
    /// Unknown or already resolved hash
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    JobRegistered { job: JobHash, case: CaseHash },
    JobAccepted { job: JobHash },
    JobRejected { job: JobHash },
    CaseRemoved { case: CaseHash },
    Cleared,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    cases: IndexMap<CaseHash, Case>,
    case_jobs: IndexMap<CaseHash, IndexSet<JobHash>>,
    jobs: IndexMap<JobHash, Job>,
    rejected: IndexSet<JobHash>,
    subscriber: Option<mpsc::UnboundedSender<RegistryEvent>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every subsequent registry mutation. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriber = Some(tx);
        rx
    }

    fn emit(&self, event: RegistryEvent) {
        if let Some(subscriber) = &self.subscriber {
            // a dropped receiver just means nobody listens anymore
            let _ = subscriber.send(event);
        }
    }

    /// Register `job` under `case`; identical hashes collapse
    pub fn register_job(&mut self, case: Case, job: Job) -> Registration {
        let hash = job.hash.clone();

        if self.rejected.contains(&hash) {
            tracing::debug!(job_hash = %hash, "Ignoring previously rejected job");
            return Registration::PreviouslyRejected(hash);
        }
        if self.jobs.contains_key(&hash) {
            return Registration::Existing(hash);
        }

        let case_hash = case.hash.clone();
        self.cases.entry(case_hash.clone()).or_insert(case);
        self.case_jobs
            .entry(case_hash.clone())
            .or_default()
            .insert(hash.clone());

        tracing::info!(
            job_hash = %hash,
            case_hash = %case_hash,
            file = %job.file_name.display(),
            title = %job.title,
            "Registered job"
        );
        self.jobs.insert(hash.clone(), job);
        self.emit(RegistryEvent::JobRegistered {
            job: hash.clone(),
            case: case_hash,
        });

        Registration::Created(hash)
    }

    pub fn accept(&mut self, hash: &JobHash) -> Resolution {
        match self.remove(hash) {
            Some(job) => {
                tracing::info!(job_hash = %hash, file = %job.file_name.display(), "Accepted job");
                self.emit(RegistryEvent::JobAccepted { job: hash.clone() });
                self.prune_cases();
                Resolution::Resolved(job)
            }
            None => Resolution::NotFound,
        }
    }

    pub fn reject(&mut self, hash: &JobHash) -> Resolution {
        match self.remove(hash) {
            Some(job) => {
                self.rejected.insert(hash.clone());
                tracing::info!(job_hash = %hash, file = %job.file_name.display(), "Rejected job");
                self.emit(RegistryEvent::JobRejected { job: hash.clone() });
                self.prune_cases();
                Resolution::Resolved(job)
            }
            None => Resolution::NotFound,
        }
    }

    fn remove(&mut self, hash: &JobHash) -> Option<Job> {
        let job = self.jobs.shift_remove(hash)?;
        for jobs in self.case_jobs.values_mut() {
            jobs.shift_remove(hash);
        }
        Some(job)
    }

    /// Delete cases whose last job has been resolved
    fn prune_cases(&mut self) {
        let emptied: Vec<CaseHash> = self
            .case_jobs
            .iter()
            .filter(|(_, jobs)| jobs.is_empty())
            .map(|(case, _)| case.clone())
            .collect();

        for case in emptied {
            self.case_jobs.shift_remove(&case);
            self.cases.shift_remove(&case);
            tracing::debug!(case_hash = %case, "Removed case without jobs");
            self.emit(RegistryEvent::CaseRemoved { case });
        }
    }

    pub fn get(&self, hash: &JobHash) -> Option<&Job> {
        self.jobs.get(hash)
    }

    /// Pending jobs in registration order, optionally limited to one case
    pub fn list_jobs(&self, case: Option<&CaseHash>) -> Vec<&Job> {
        match case {
            None => self.jobs.values().collect(),
            Some(case) => self
                .case_jobs
                .get(case)
                .map(|hashes| hashes.iter().filter_map(|hash| self.jobs.get(hash)).collect())
                .unwrap_or_default(),
        }
    }

    pub fn list_cases(&self) -> Vec<&Case> {
        self.cases.values().collect()
    }

    pub fn case_label(&self, case: &CaseHash) -> Option<String> {
        let count = self.case_jobs.get(case).map_or(0, IndexSet::len);
        self.cases.get(case).map(|case| case.label(count))
    }

    pub fn file_names(&self) -> BTreeSet<&Path> {
        self.jobs.values().map(|job| job.file_name.as_path()).collect()
    }

    pub fn jobs_for_file(&self, file: &Path) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|job| job.file_name == file)
            .collect()
    }

    pub fn is_rejected(&self, hash: &JobHash) -> bool {
        self.rejected.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Forget every job, case and rejection
    pub fn clear(&mut self) {
        self.cases.clear();
        self.case_jobs.clear();
        self.jobs.clear();
        self.rejected.clear();
        tracing::info!("Cleared job registry");
        self.emit(RegistryEvent::Cleared);
    }

    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            cases: self.cases.values().cloned().collect(),
            case_hash_job_hashes: self
                .case_jobs
                .iter()
                .flat_map(|(case, jobs)| jobs.iter().map(move |job| (case.clone(), job.clone())))
                .collect(),
            jobs: self.jobs.values().cloned().collect(),
            rejected_job_hashes: self.rejected.iter().cloned().collect(),
        }
    }

    /// Rebuild a registry from persisted state
    ///
    /// Memberships that point at unknown cases or jobs are dropped, as are
    /// cases left without jobs.
    pub fn from_persisted(state: PersistedState) -> Self {
        let mut registry = Self {
            rejected: state.rejected_job_hashes.into_iter().collect(),
            jobs: state
                .jobs
                .into_iter()
                .map(|job| (job.hash.clone(), job))
                .collect(),
            ..Self::default()
        };

        let cases: IndexMap<CaseHash, Case> = state
            .cases
            .into_iter()
            .map(|case| (case.hash.clone(), case))
            .collect();

        for (case, job) in state.case_hash_job_hashes {
            if !cases.contains_key(&case) || !registry.jobs.contains_key(&job) {
                tracing::warn!(case_hash = %case, job_hash = %job, "Dropping dangling case membership");
                continue;
            }
            registry.case_jobs.entry(case).or_default().insert(job);
        }

        registry.cases = cases
            .into_iter()
            .filter(|(hash, _)| registry.case_jobs.contains_key(hash))
            .collect();

        registry
    }
}
