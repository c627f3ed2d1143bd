use thiserror::Error;

/// Main error type for the coordination engine
#[derive(Error, Debug)]
pub enum ConvoyError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Store corruption or broken internal invariants
    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Malformed client frames
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for ConvoyError
pub type Result<T> = std::result::Result<T, ConvoyError>;

impl ConvoyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConvoyError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ConvoyError::NotFound(msg.into())
    }

    /// Short machine-readable kind, used in API error bodies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ConvoyError::InvalidArgument(_) => "invalid_argument",
            ConvoyError::NotFound(_) => "not_found",
            ConvoyError::InvalidState(_) => "invalid_state",
            ConvoyError::Internal(_) => "internal",
            ConvoyError::Config(_) => "config",
            ConvoyError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ConvoyError::invalid("latitude out of range").to_string(),
            "Invalid argument: latitude out of range"
        );
        assert_eq!(
            ConvoyError::InvalidState("no pending destination".into()).to_string(),
            "Invalid state: no pending destination"
        );
    }

    #[test]
    fn test_not_found_and_invalid_state_are_distinct() {
        let unknown_group = ConvoyError::not_found("group g1");
        let no_proposal = ConvoyError::InvalidState("no pending destination".into());
        assert_eq!(unknown_group.kind(), "not_found");
        assert_eq!(no_proposal.kind(), "invalid_state");
    }
}
