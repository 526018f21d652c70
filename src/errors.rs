use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingRequiredField,
    InvalidEmailFormat,
}

impl ValidationError {
    pub fn default_message(self) -> &'static str {
        match self {
            Self::MissingRequiredField => "This field is required",
            Self::InvalidEmailFormat => "Please enter a valid email address",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_message())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Logging,
}

#[derive(Debug)]
pub struct SiteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SiteError {
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config,
            message: message.into(),
        }
    }

    pub fn logging(err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Logging,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ErrorKind::Config => "invalid configuration",
            ErrorKind::Logging => "logging setup failed",
        };
        write!(f, "{label}: {}", self.message)
    }
}

impl std::error::Error for SiteError {}

impl From<serde_json::Error> for SiteError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_inline_feedback() {
        assert_eq!(
            ValidationError::MissingRequiredField.to_string(),
            "This field is required"
        );
        assert_eq!(
            ValidationError::InvalidEmailFormat.to_string(),
            "Please enter a valid email address"
        );
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: SiteError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
