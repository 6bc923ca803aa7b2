mod errors;
mod material;
mod store;

pub use errors::CertStoreError;
pub use material::{CaIdentity, IssuedServerCert, RootCaMaterial};
pub use store::{
    CertStoreMetrics, CertValidity, CertificateStore, DEFAULT_ROOT_CA_VALIDITY_DAYS,
    DEFAULT_SERVER_CERT_VALIDITY_DAYS,
};
