use kiln_api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum JavaError {
    #[error("No JDK found (set JAVA_HOME or put javac on the PATH)")]
    JdkNotFound,
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is outside the workspace root")]
    OutsideRoot(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, JavaError>;

impl From<JavaError> for ApiError {
    fn from(err: JavaError) -> Self {
        match err {
            JavaError::OutsideRoot(path) => ApiError::InvalidArgument(format!(
                "{path} is outside the workspace root"
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
