//! Workspace-level compile state and source discovery.

mod context;
pub mod loader;

pub use context::ProjectContext;
