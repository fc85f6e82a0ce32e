//! Foundation Layer - Core types shared by every Recast crate
//!
//! This crate provides the foundational building blocks for Recast:
//! - The unified error type (`RecastError`)
//! - The text model: byte-offset edits, line/column locations and line tables
//! - Content hashing used for stable job and case identities
//! - Shared enums that cross crate boundaries (top-level node kinds)

pub mod error;
pub mod hashing;
pub mod model;
pub mod text;

// Re-export commonly used types for convenience
pub use error::*;
pub use hashing::content_hash;
pub use model::*;
pub use text::{apply_edits, EditLocation, LineIndex, TextEdit};
