use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertStoreError {
    #[error("certificate generation failed: {0}")]
    Generation(String),
    #[error("root CA import failed: {0}")]
    Import(String),
    #[error("no root CA material is present")]
    NotPresent,
    #[error("certificate serialization produced empty output")]
    EmptySerialization,
    #[error("{setting} must be greater than zero days")]
    InvalidValidity { setting: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
