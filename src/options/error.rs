//! Configuration errors.

use std::fmt;

use thiserror::Error;

/// A single rule violation, tagged with the offending member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub member: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.member, self.message)
    }
}

/// Errors that stop the mirror from being constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mirror configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("at least one upstream client must be provided")]
    NoClients,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
