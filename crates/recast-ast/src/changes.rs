//! Change descriptions consumed by the applier

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One semantic code change, as produced by analysis
///
/// Parameter deletions describe a parameter that has already been removed
/// from its declaration; applying them brings the call sites in line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeDescription {
    #[serde(rename_all = "camelCase")]
    FunctionParameterDeleted {
        file_path: PathBuf,
        function_name: String,
        parameters: Vec<String>,
        #[serde(alias = "parameter")]
        deleted_parameter: String,
    },
    #[serde(rename_all = "camelCase")]
    ArrowFunctionParameterDeleted {
        file_path: PathBuf,
        arrow_function_name: String,
        parameters: Vec<String>,
        #[serde(alias = "parameter")]
        deleted_parameter: String,
    },
    #[serde(rename_all = "camelCase")]
    ClassMethodParameterDeleted {
        file_path: PathBuf,
        class_name: String,
        method_name: String,
        parameters: Vec<String>,
        #[serde(alias = "parameter")]
        deleted_parameter: String,
    },
    #[serde(rename_all = "camelCase")]
    ClassSplit { file_path: PathBuf, class_name: String },
}

impl ChangeDescription {
    pub fn file_path(&self) -> &Path {
        match self {
            ChangeDescription::FunctionParameterDeleted { file_path, .. }
            | ChangeDescription::ArrowFunctionParameterDeleted { file_path, .. }
            | ChangeDescription::ClassMethodParameterDeleted { file_path, .. }
            | ChangeDescription::ClassSplit { file_path, .. } => file_path,
        }
    }

    /// Make a relative `filePath` absolute by joining it onto `root`
    pub fn resolve_against(&mut self, root: &Path) {
        let file_path = match self {
            ChangeDescription::FunctionParameterDeleted { file_path, .. }
            | ChangeDescription::ArrowFunctionParameterDeleted { file_path, .. }
            | ChangeDescription::ClassMethodParameterDeleted { file_path, .. }
            | ChangeDescription::ClassSplit { file_path, .. } => file_path,
        };
        if file_path.is_relative() {
            *file_path = root.join(&*file_path);
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ChangeDescription::FunctionParameterDeleted { .. } => "functionParameterDeleted",
            ChangeDescription::ArrowFunctionParameterDeleted { .. } => {
                "arrowFunctionParameterDeleted"
            }
            ChangeDescription::ClassMethodParameterDeleted { .. } => "classMethodParameterDeleted",
            ChangeDescription::ClassSplit { .. } => "classSplit",
        }
    }

    /// Position of the deleted parameter in the described parameter list
    ///
    /// `None` for class splits and for stale descriptions whose deleted
    /// parameter is not listed.
    pub fn deleted_parameter_index(&self) -> Option<usize> {
        let (parameters, deleted) = match self {
            ChangeDescription::FunctionParameterDeleted {
                parameters,
                deleted_parameter,
                ..
            }
            | ChangeDescription::ArrowFunctionParameterDeleted {
                parameters,
                deleted_parameter,
                ..
            }
            | ChangeDescription::ClassMethodParameterDeleted {
                parameters,
                deleted_parameter,
                ..
            } => (parameters, deleted_parameter),
            ChangeDescription::ClassSplit { .. } => return None,
        };
        parameters.iter().position(|p| p == deleted)
    }
}
