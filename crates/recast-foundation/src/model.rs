//! Shared domain enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a top-level declaration, as far as ordering rules care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TopLevelNodeKind {
    Unknown,
    Import,
    Class,
    Function,
    Interface,
    TypeAlias,
    Block,
    Variable,
    Enum,
}

impl TopLevelNodeKind {
    /// Declarations whose binding exists before any statement runs
    /// (function hoisting, or type-only declarations)
    pub fn is_hoisted(self) -> bool {
        matches!(
            self,
            TopLevelNodeKind::Function
                | TopLevelNodeKind::Interface
                | TopLevelNodeKind::TypeAlias
                | TopLevelNodeKind::Import
        )
    }

    /// Nodes that evaluate code at module load
    pub fn is_eager(self) -> bool {
        !matches!(
            self,
            TopLevelNodeKind::Function
                | TopLevelNodeKind::Interface
                | TopLevelNodeKind::TypeAlias
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopLevelNodeKind::Unknown => "unknown",
            TopLevelNodeKind::Import => "import",
            TopLevelNodeKind::Class => "class",
            TopLevelNodeKind::Function => "function",
            TopLevelNodeKind::Interface => "interface",
            TopLevelNodeKind::TypeAlias => "typeAlias",
            TopLevelNodeKind::Block => "block",
            TopLevelNodeKind::Variable => "variable",
            TopLevelNodeKind::Enum => "enum",
        }
    }

    /// The default preferred ordering of top-level declarations
    pub fn default_order() -> Vec<TopLevelNodeKind> {
        vec![
            TopLevelNodeKind::Class,
            TopLevelNodeKind::Function,
            TopLevelNodeKind::Interface,
            TopLevelNodeKind::TypeAlias,
            TopLevelNodeKind::Enum,
            TopLevelNodeKind::Variable,
            TopLevelNodeKind::Block,
            TopLevelNodeKind::Unknown,
        ]
    }
}

impl fmt::Display for TopLevelNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
