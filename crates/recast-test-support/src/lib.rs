//! Test support utilities and fixtures for Recast integration tests

pub mod fixtures;
pub mod workspace;

pub use workspace::TestWorkspace;
