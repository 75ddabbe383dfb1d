//! Incremental build engine for Java workspaces.
//!
//! Source files are queued per project and built by per-file strategies.
//! Compiled class files are read back to find the symbols each source
//! refers to; the resulting file-level dependency graph decides which
//! dependents need rebuilding when a file's references change. Every
//! diagnostic lands in a sorted, deduplicated issue ledger.

pub mod build;
pub mod config;
pub mod deps;
pub mod error;
pub mod issues;
pub mod logging;
pub mod project;
pub mod store;
pub mod workspace;

pub use build::{BuildLog, BuildQueue, FileBuilder, PassState};
pub use config::{BuildStrategy, ProjectSettings, WorkspaceConfig};
pub use deps::{DependencyGraph, ReferenceExtractor, SymbolReference};
pub use error::{KilnError, Result};
pub use issues::IssueLedger;
pub use project::{Project, ProjectBuilder};
pub use store::{DiskStore, MemoryStore};
pub use workspace::builder::PassOutcome;
pub use workspace::{BuildState, Workspace, WorkspaceBuilder};
