pub mod compiler;
pub mod error;
pub mod models;
pub mod store;
pub mod syntax;
pub mod types;

pub use compiler::{
    CompileOutcome, CompileRequest, Compiler, Diagnostic, DiagnosticSink, Severity,
};
pub use error::{ApiError, ApiResult};
pub use models::*;
pub use store::FileStore;
pub use syntax::SyntaxChecker;
pub use types::TypeInfoProvider;
