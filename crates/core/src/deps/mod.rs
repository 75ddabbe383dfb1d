//! Symbol references, their extraction from class files, and the file-level
//! dependency graph built from them.

pub mod extract;
pub mod graph;
pub mod symbol;

pub use extract::{ClassFileTypeInfo, ReferenceExtractor};
pub use graph::{DependencyGraph, DependencyRecord};
pub use symbol::{SymbolReference, is_system_class, root_class_name};
