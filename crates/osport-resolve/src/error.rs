/// Errors that can occur during name resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The native resolver rejected the query. Carries the platform code
    /// and its diagnostic text.
    #[error("resolution failed for node {node:?} service {service:?}: {message} (code {code})")]
    Lookup {
        node: Option<String>,
        service: Option<String>,
        code: i32,
        message: String,
    },

    /// Numeric address/port conversion failed.
    #[error("address formatting failed: {message} (code {code})")]
    Format { code: i32, message: String },

    /// The node or service string contains an interior NUL byte and cannot
    /// be passed to the platform resolver.
    #[error("query contains an interior NUL byte")]
    InvalidQuery,
}

pub type Result<T> = std::result::Result<T, ResolveError>;
