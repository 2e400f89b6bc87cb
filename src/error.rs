use thiserror::Error;

/// Machine-readable store error codes.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const FOREIGN_KEY_VIOLATION: &str = "FOREIGN_KEY_VIOLATION";
    pub const UNIQUE_VIOLATION: &str = "UNIQUE_VIOLATION";
    pub const CORRUPT_RECORD: &str = "CORRUPT_RECORD";
}

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Not in an arbor project. Run 'arbor init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .arbor/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Ambiguous node id '{0}': matches more than one node")]
    AmbiguousNodeId(String),

    #[error("Ordering error: cannot place a key between '{prev}' and '{next}'")]
    Ordering { prev: String, next: String },

    #[error("Invalid position key '{key}': {reason}")]
    InvalidPositionKey { key: String, reason: String },

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Invalid variable name '{name}': {reason}")]
    InvalidVariableName { name: String, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("{message} (code {code})")]
    Store { code: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Loro error: {0}")]
    Loro(#[from] loro::LoroError),

    #[error("Loro encode error: {0}")]
    LoroEncode(#[from] loro::LoroEncodeError),
}

impl ArborError {
    pub fn store(code: &str, message: impl Into<String>) -> Self {
        ArborError::Store {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Machine-readable code for surfacing failures to users.
    pub fn code(&self) -> &str {
        match self {
            ArborError::NotInitialized => "NOT_INITIALIZED",
            ArborError::AlreadyInitialized => "ALREADY_INITIALIZED",
            ArborError::NodeNotFound(_) => codes::NOT_FOUND,
            ArborError::AmbiguousNodeId(_) => "AMBIGUOUS_ID",
            ArborError::Ordering { .. } => "ORDERING",
            ArborError::InvalidPositionKey { .. } => "INVALID_POSITION_KEY",
            ArborError::InvalidMove(_) => "INVALID_MOVE",
            ArborError::InvalidVariableName { .. } => "INVALID_VARIABLE_NAME",
            ArborError::Template(_) => "TEMPLATE",
            ArborError::Store { code, .. } => code,
            ArborError::Io(_) => "IO",
            ArborError::Json(_) => "JSON",
            ArborError::Yaml(_) => "YAML",
            ArborError::Loro(_) | ArborError::LoroEncode(_) => "LORO",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_carries_code() {
        let err = ArborError::store(codes::FOREIGN_KEY_VIOLATION, "parent missing");
        assert_eq!(err.code(), "FOREIGN_KEY_VIOLATION");
        assert_eq!(err.to_string(), "parent missing (code FOREIGN_KEY_VIOLATION)");
    }

    #[test]
    fn test_ordering_error_message() {
        let err = ArborError::Ordering {
            prev: "a1".to_string(),
            next: "a1".to_string(),
        };
        assert!(err.to_string().contains("'a1'"));
        assert_eq!(err.code(), "ORDERING");
    }
}
