//! Jobs and cases: reviewable proposals with content-derived identities

use once_cell::sync::OnceCell;
use recast_ast::MoveProposal;
use recast_foundation::{content_hash, EditLocation, LineIndex, RecastError, RecastResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

macro_rules! hash_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

hash_newtype!(JobHash);
hash_newtype!(CaseHash);

/// What a job does, and what it needs to produce its replacement text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobKind {
    #[serde(rename_all = "camelCase")]
    MoveTopLevelNode {
        old_index: usize,
        new_index: usize,
        replacement: String,
    },
    /// The engine wrote a rewritten copy of the file to `output_path`
    #[serde(rename_all = "camelCase")]
    RewriteFile {
        output_path: PathBuf,
        codemod_name: String,
    },
    /// The engine proposes a new file whose content sits at `output_path`
    #[serde(rename_all = "camelCase")]
    CreateFile {
        output_path: PathBuf,
        codemod_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ApplyAstChange { change_kind: String, new_text: String },
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::MoveTopLevelNode { .. } => "moveTopLevelNode",
            JobKind::RewriteFile { .. } => "rewriteFile",
            JobKind::CreateFile { .. } => "createFile",
            JobKind::ApplyAstChange { .. } => "applyAstChange",
        }
    }
}

/// One proposed edit of one file
///
/// `range` is the region of the file as it was when the job was built. The
/// replacement text is computed on first use and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub hash: JobHash,
    #[serde(flatten)]
    pub kind: JobKind,
    pub file_name: PathBuf,
    pub title: String,
    pub range: EditLocation,
    #[serde(skip)]
    replacement: OnceCell<String>,
}

impl Job {
    fn new(
        hash: JobHash,
        kind: JobKind,
        file_name: &Path,
        title: String,
        range: EditLocation,
    ) -> Self {
        Self {
            hash,
            kind,
            file_name: file_name.to_path_buf(),
            title,
            range,
            replacement: OnceCell::new(),
        }
    }

    pub fn move_top_level_node(file_name: &Path, proposal: &MoveProposal) -> Self {
        let solution = &proposal.solution;
        let hash = content_hash([
            file_name.to_string_lossy().as_bytes(),
            "moveTopLevelNode".as_bytes(),
            proposal.start.to_string().as_bytes(),
            proposal.end.to_string().as_bytes(),
            proposal.replacement.as_bytes(),
        ]);

        Self::new(
            hash.into(),
            JobKind::MoveTopLevelNode {
                old_index: solution.old_index,
                new_index: solution.new_index,
                replacement: proposal.replacement.clone(),
            },
            file_name,
            format!(
                "Move top-level node {} to position {}",
                solution.old_index + 1,
                solution.new_index + 1
            ),
            proposal.location,
        )
    }

    /// A whole-file rewrite produced by the AST change applier
    pub fn ast_change(file_name: &Path, change_kind: &str, old_text: &str, new_text: &str) -> Self {
        let hash = content_hash([
            file_name.to_string_lossy().as_bytes(),
            "applyAstChange".as_bytes(),
            change_kind.as_bytes(),
            new_text.as_bytes(),
        ]);

        Self::new(
            hash.into(),
            JobKind::ApplyAstChange {
                change_kind: change_kind.to_string(),
                new_text: new_text.to_string(),
            },
            file_name,
            format!("Apply {} to {}", change_kind, display_name(file_name)),
            LineIndex::new(old_text).full_location(),
        )
    }

    /// `old_text` is the current content of `input_path`, if it could be read
    pub fn rewrite_file(
        input_path: &Path,
        output_path: &Path,
        codemod_name: &str,
        old_text: Option<&str>,
    ) -> Self {
        let hash = content_hash([
            input_path.to_string_lossy().as_bytes(),
            "rewriteFile".as_bytes(),
            output_path.to_string_lossy().as_bytes(),
            codemod_name.as_bytes(),
        ]);

        Self::new(
            hash.into(),
            JobKind::RewriteFile {
                output_path: output_path.to_path_buf(),
                codemod_name: codemod_name.to_string(),
            },
            input_path,
            format!("Rewrite {} ({})", display_name(input_path), codemod_name),
            old_text
                .map(|text| LineIndex::new(text).full_location())
                .unwrap_or_default(),
        )
    }

    pub fn create_file(new_path: &Path, output_path: &Path, codemod_name: &str) -> Self {
        let hash = content_hash([
            new_path.to_string_lossy().as_bytes(),
            "createFile".as_bytes(),
            output_path.to_string_lossy().as_bytes(),
            codemod_name.as_bytes(),
        ]);

        Self::new(
            hash.into(),
            JobKind::CreateFile {
                output_path: output_path.to_path_buf(),
                codemod_name: codemod_name.to_string(),
            },
            new_path,
            format!("Create {} ({})", display_name(new_path), codemod_name),
            EditLocation::default(),
        )
    }

    /// The text that replaces `range`
    pub fn replacement(&self) -> RecastResult<&str> {
        self.replacement
            .get_or_try_init(|| match &self.kind {
                JobKind::MoveTopLevelNode { replacement, .. } => Ok(replacement.clone()),
                JobKind::ApplyAstChange { new_text, .. } => Ok(new_text.clone()),
                JobKind::RewriteFile { output_path, .. }
                | JobKind::CreateFile { output_path, .. } => std::fs::read_to_string(output_path)
                    .map_err(|err| RecastError::io_at(output_path, err)),
            })
            .map(String::as_str)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseKind {
    MoveTopLevelBlocks,
    ApplyAstChanges,
    RewriteFileByEngine,
}

impl CaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseKind::MoveTopLevelBlocks => "moveTopLevelBlocks",
            CaseKind::ApplyAstChanges => "applyAstChanges",
            CaseKind::RewriteFileByEngine => "rewriteFileByEngine",
        }
    }
}

/// A group of jobs sharing a cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub hash: CaseHash,
    pub kind: CaseKind,
    /// Refines the kind, e.g. the codemod that produced the jobs
    pub sub_kind: String,
}

impl Case {
    pub fn new(kind: CaseKind, sub_kind: impl Into<String>) -> Self {
        let sub_kind = sub_kind.into();
        let hash = content_hash([kind.as_str(), sub_kind.as_str()]);
        Self {
            hash: hash.into(),
            kind,
            sub_kind,
        }
    }

    pub fn label(&self, job_count: usize) -> String {
        let header = match self.kind {
            CaseKind::MoveTopLevelBlocks => "Case: Move Top-Level Blocks".to_string(),
            CaseKind::ApplyAstChanges => "Case: Apply AST Changes".to_string(),
            CaseKind::RewriteFileByEngine if self.sub_kind.is_empty() => {
                "Case: Rewrite Files".to_string()
            }
            CaseKind::RewriteFileByEngine => format!("Case: Rewrite Files ({})", self.sub_kind),
        };
        format!("{} ({})", header, job_count)
    }
}
