//! Java collaborators for the kiln build engine: a `javac` process
//! compiler and a tree-sitter syntax checker.

pub mod error;
pub mod javac;
pub mod jdk;
mod queries;
pub mod syntax;

pub use error::{JavaError, Result};
pub use javac::JavacCompiler;
pub use jdk::Jdk;
pub use syntax::TreeSitterSyntaxChecker;
