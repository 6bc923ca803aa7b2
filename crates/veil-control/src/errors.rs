use thiserror::Error;
use veil_policy::PolicyError;
use veil_tls::CertStoreError;

/// Fixed error taxonomy exposed by the control surface. Domain errors are
/// translated into these kinds at the boundary; lower-level types never
/// leak to callers, only a short reason string where one applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("invalid authority pattern: {0}")]
    InvalidPattern(String),
    #[error("pass-through rule already exists for '{0}'")]
    DuplicateRule(String),
    #[error("no such {0}")]
    NotFound(&'static str),
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("root CA import failed: {0}")]
    ImportFailure(String),
    #[error("root CA generation failed")]
    GenerationFailure,
    #[error("no root CA certificate is present")]
    NotPresent,
    #[error("feature is disabled: {0}")]
    FeatureDisabled(&'static str),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ControlError {
    /// Stable machine-readable kind for transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPattern(_) => "invalid_pattern",
            Self::DuplicateRule(_) => "duplicate_rule",
            Self::NotFound(_) => "not_found",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::MissingParameter(_) => "missing_parameter",
            Self::ImportFailure(_) => "import_failure",
            Self::GenerationFailure => "generation_failure",
            Self::NotPresent => "not_present",
            Self::FeatureDisabled(_) => "feature_disabled",
            Self::InternalError(_) => "internal_error",
        }
    }
}

impl From<PolicyError> for ControlError {
    fn from(error: PolicyError) -> Self {
        match error {
            PolicyError::InvalidPattern(reason) => Self::InvalidPattern(reason),
            PolicyError::DuplicateRule(spec) => Self::DuplicateRule(spec),
        }
    }
}

impl From<CertStoreError> for ControlError {
    fn from(error: CertStoreError) -> Self {
        match error {
            CertStoreError::Generation(_) => Self::GenerationFailure,
            CertStoreError::Import(reason) => Self::ImportFailure(reason),
            CertStoreError::NotPresent => Self::NotPresent,
            CertStoreError::EmptySerialization => {
                Self::InternalError("root CA certificate serialized to empty output".to_string())
            }
            CertStoreError::InvalidValidity { .. } => Self::InvalidParameter {
                name: "validity",
                reason: "must be greater than zero".to_string(),
            },
            CertStoreError::Io(error) => Self::InternalError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ControlError;
    use veil_tls::CertStoreError;

    #[test]
    fn generation_detail_is_not_leaked() {
        let error: ControlError =
            CertStoreError::Generation("ring backend exploded".to_string()).into();
        assert_eq!(error, ControlError::GenerationFailure);
        assert!(!error.to_string().contains("ring"));
    }

    #[test]
    fn import_reason_is_preserved() {
        let error: ControlError =
            CertStoreError::Import("bundle does not contain a certificate".to_string()).into();
        assert_eq!(error.kind(), "import_failure");
        assert!(error.to_string().contains("does not contain a certificate"));
    }
}
