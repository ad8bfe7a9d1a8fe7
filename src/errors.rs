use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpiryError {
    #[error("whois client not found: {0}")]
    ToolNotFound(String),

    #[error("whois client exited with status {status}: {stderr}")]
    ExecutionFailed { status: i32, stderr: String },

    #[error("invalid response detected: got {lines} lines, a valid whois response has at least {min} lines")]
    InvalidResponse { lines: usize, min: usize },

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("field not found in whois response: {0}")]
    MissingField(String),

    #[error("could not parse date {value:?}: {source}")]
    DateParseFailed {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("warning window of {0} hours is out of range")]
    InvalidWindow(u64),

    #[error("could not encode output: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<tokio::time::error::Elapsed> for ExpiryError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ExpiryError::Timeout
    }
}

impl ExpiryError {
    /// Name of the stage that failed, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            ExpiryError::ToolNotFound(_) => "tool lookup",
            ExpiryError::ExecutionFailed { .. } | ExpiryError::Timeout | ExpiryError::IoError(_) => {
                "execution"
            }
            ExpiryError::InvalidResponse { .. } | ExpiryError::ResponseTooLarge => "parsing",
            ExpiryError::MissingField(_) => "field extraction",
            ExpiryError::DateParseFailed { .. } => "date parsing",
            ExpiryError::InvalidTarget(_) => "input",
            ExpiryError::ConfigError(_) | ExpiryError::InvalidWindow(_) => "configuration",
            ExpiryError::Encoding(_) => "output",
        }
    }

    /// Process exit code for this error. 0 and 1 are reserved for verdicts.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExpiryError::ExecutionFailed { .. } | ExpiryError::Timeout | ExpiryError::IoError(_) => 2,
            ExpiryError::ToolNotFound(_) => 3,
            ExpiryError::InvalidResponse { .. } | ExpiryError::ResponseTooLarge => 4,
            ExpiryError::MissingField(_) => 5,
            ExpiryError::DateParseFailed { .. } => 6,
            ExpiryError::InvalidTarget(_) | ExpiryError::ConfigError(_) | ExpiryError::InvalidWindow(_) => 64,
            ExpiryError::Encoding(_) => 70,
        }
    }

    /// Whether walking up to the parent domain could change the outcome.
    pub(crate) fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ExpiryError::ToolNotFound(_) | ExpiryError::InvalidTarget(_) | ExpiryError::InvalidWindow(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        let errors = [
            ExpiryError::ExecutionFailed { status: 1, stderr: String::new() },
            ExpiryError::ToolNotFound("whois".to_string()),
            ExpiryError::InvalidResponse { lines: 2, min: 5 },
            ExpiryError::MissingField("Registry Expiry Date".to_string()),
            ExpiryError::InvalidTarget("".to_string()),
            ExpiryError::Encoding(serde_json::from_str::<u8>("x").unwrap_err()),
        ];
        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c >= 2));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ExpiryError::Timeout.stage(), "execution");
        assert_eq!(ExpiryError::ResponseTooLarge.stage(), "parsing");
        assert_eq!(ExpiryError::MissingField("x".into()).stage(), "field extraction");
        assert_eq!(ExpiryError::InvalidWindow(u64::MAX).stage(), "configuration");
    }

    #[test]
    fn test_encoding_failure_is_not_a_lookup_error() {
        let err = ExpiryError::from(serde_json::from_str::<u8>("x").unwrap_err());
        assert_eq!(err.stage(), "output");
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn test_tool_not_found_is_not_retryable() {
        assert!(!ExpiryError::ToolNotFound("whois".into()).is_retryable());
        assert!(ExpiryError::InvalidResponse { lines: 1, min: 5 }.is_retryable());
    }
}
