//! Writing accepted jobs back through the host

use crate::jobs::{JobHash, JobKind};
use crate::registry::{JobRegistry, Resolution};
use async_trait::async_trait;
use recast_foundation::{apply_edits, EditLocation, LineIndex, RecastError, RecastResult, TextEdit};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// The editor (or file system) that accepted jobs are applied to
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Text of the live document for `path`, when the host has one open
    async fn open_document(&self, path: &Path) -> Option<String>;

    /// Replace the live document's text
    async fn update_document(&mut self, path: &Path, text: String) -> RecastResult<()>;

    async fn save_document(&mut self, path: &Path) -> RecastResult<()>;

    /// `None` when the file does not exist
    async fn read_file(&self, path: &Path) -> RecastResult<Option<String>>;

    async fn write_file(&mut self, path: &Path, text: &str) -> RecastResult<()>;
}

/// Applies jobs straight to disk; it has no open documents
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemHost;

#[async_trait]
impl DocumentHost for FileSystemHost {
    async fn open_document(&self, _path: &Path) -> Option<String> {
        None
    }

    async fn update_document(&mut self, path: &Path, text: String) -> RecastResult<()> {
        self.write_file(path, &text).await
    }

    async fn save_document(&mut self, _path: &Path) -> RecastResult<()> {
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> RecastResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RecastError::io_at(path, err)),
        }
    }

    async fn write_file(&mut self, path: &Path, text: &str) -> RecastResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| RecastError::io_at(parent, err))?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|err| RecastError::io_at(path, err))
    }
}

/// Open documents and files kept in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryHost {
    documents: BTreeMap<PathBuf, String>,
    files: BTreeMap<PathBuf, String>,
    saved: BTreeSet<PathBuf>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.documents.insert(path.into(), text.into());
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn document(&self, path: &Path) -> Option<&str> {
        self.documents.get(path).map(String::as_str)
    }

    pub fn file(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn was_saved(&self, path: &Path) -> bool {
        self.saved.contains(path)
    }
}

#[async_trait]
impl DocumentHost for InMemoryHost {
    async fn open_document(&self, path: &Path) -> Option<String> {
        self.documents.get(path).cloned()
    }

    async fn update_document(&mut self, path: &Path, text: String) -> RecastResult<()> {
        match self.documents.get_mut(path) {
            Some(document) => {
                *document = text;
                Ok(())
            }
            None => Err(RecastError::not_found(format!(
                "open document {}",
                path.display()
            ))),
        }
    }

    async fn save_document(&mut self, path: &Path) -> RecastResult<()> {
        let text = self
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| RecastError::not_found(format!("open document {}", path.display())))?;
        self.files.insert(path.to_path_buf(), text);
        self.saved.insert(path.to_path_buf());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> RecastResult<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    async fn write_file(&mut self, path: &Path, text: &str) -> RecastResult<()> {
        self.files.insert(path.to_path_buf(), text.to_string());
        Ok(())
    }
}

fn replace_range(path: &Path, text: &str, range: &EditLocation, replacement: &str) -> RecastResult<String> {
    let (start, end) = LineIndex::new(text).range(range).ok_or_else(|| {
        RecastError::conflict(format!(
            "Job range {:?} no longer fits {}",
            range.to_array(),
            path.display()
        ))
    })?;
    let (updated, _) = apply_edits(text, &[TextEdit::replace(start, end, replacement)]);
    Ok(updated)
}

/// Apply a pending job through `host`, then resolve it as accepted
///
/// The job stays pending when materialisation fails.
pub async fn accept_job(
    registry: &mut JobRegistry,
    hash: &JobHash,
    host: &mut dyn DocumentHost,
    save_on_accept: bool,
) -> RecastResult<Resolution> {
    let Some(job) = registry.get(hash) else {
        tracing::debug!(job_hash = %hash, "Accepting unknown job");
        return Ok(Resolution::NotFound);
    };

    let replacement = job.replacement()?.to_string();
    let path = job.file_name.clone();
    let range = job.range;
    let creates_file = matches!(job.kind, JobKind::CreateFile { .. });

    if creates_file {
        host.write_file(&path, &replacement).await?;
    } else if let Some(document) = host.open_document(&path).await {
        let updated = replace_range(&path, &document, &range, &replacement)?;
        host.update_document(&path, updated).await?;
        if save_on_accept {
            host.save_document(&path).await?;
        }
    } else {
        let current = host.read_file(&path).await?.unwrap_or_default();
        let updated = replace_range(&path, &current, &range, &replacement)?;
        host.write_file(&path, &updated).await?;
    }

    tracing::debug!(job_hash = %hash, file = %path.display(), "Materialised job");
    Ok(registry.accept(hash))
}
