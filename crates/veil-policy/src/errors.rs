use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid authority pattern: {0}")]
    InvalidPattern(String),
    #[error("pass-through rule already exists for '{0}'")]
    DuplicateRule(String),
}
