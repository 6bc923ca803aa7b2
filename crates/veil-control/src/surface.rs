use std::sync::Arc;

use serde::Serialize;
use veil_policy::PassThroughRegistry;
use veil_tls::CertificateStore;

use crate::errors::ControlError;

pub const ROOT_CA_CERT_FILENAME: &str = "VeilRootCA.cer";
pub const ROOT_CA_CERT_CONTENT_TYPE: &str = "application/pkix-cert";

/// Capability flags resolved once at construction. A disabled capability
/// makes every governed action and query fail `FeatureDisabled` without
/// touching the underlying registry or certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub handle_server_certs: bool,
    pub handle_local_servers: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            handle_server_certs: true,
            handle_local_servers: true,
        }
    }
}

/// Listing row for `getPassThroughs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassThroughView {
    pub name: String,
    pub enabled: bool,
}

/// The root certificate as a file-style download: fixed filename,
/// certificate content type, PEM body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertDownload {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

/// Facade over the pass-through registry and the certificate store.
/// Validates parameters and capability flags before delegating, and maps
/// every domain failure into the fixed `ControlError` taxonomy.
pub struct ControlSurface {
    capabilities: Capabilities,
    registry: Arc<PassThroughRegistry>,
    certificates: Arc<CertificateStore>,
}

impl ControlSurface {
    pub fn new(
        capabilities: Capabilities,
        registry: Arc<PassThroughRegistry>,
        certificates: Arc<CertificateStore>,
    ) -> Self {
        Self {
            capabilities,
            registry,
            certificates,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn require_local_servers(&self) -> Result<(), ControlError> {
        if !self.capabilities.handle_local_servers {
            return Err(ControlError::FeatureDisabled("local server handling"));
        }
        Ok(())
    }

    pub(crate) fn require_server_certs(&self) -> Result<(), ControlError> {
        if !self.capabilities.handle_server_certs {
            return Err(ControlError::FeatureDisabled("server certificate handling"));
        }
        Ok(())
    }

    pub fn add_pass_through(&self, authority: &str, enabled: bool) -> Result<(), ControlError> {
        self.require_local_servers()?;
        self.registry.add(authority, enabled)?;
        tracing::debug!(authority, enabled, "added pass-through rule");
        Ok(())
    }

    pub fn remove_pass_through(&self, authority: &str) -> Result<(), ControlError> {
        self.require_local_servers()?;
        if !self.registry.remove(authority) {
            return Err(ControlError::NotFound("pass-through rule"));
        }
        tracing::debug!(authority, "removed pass-through rule");
        Ok(())
    }

    pub fn set_pass_through_enabled(
        &self,
        authority: &str,
        enabled: bool,
    ) -> Result<(), ControlError> {
        self.require_local_servers()?;
        if !self.registry.set_enabled(authority, enabled) {
            return Err(ControlError::NotFound("pass-through rule"));
        }
        Ok(())
    }

    pub fn pass_throughs(&self) -> Result<Vec<PassThroughView>, ControlError> {
        self.require_local_servers()?;
        Ok(self
            .registry
            .list()
            .into_iter()
            .map(|entry| PassThroughView {
                name: entry.name,
                enabled: entry.enabled,
            })
            .collect())
    }

    pub fn generate_root_ca_cert(&self) -> Result<(), ControlError> {
        self.require_server_certs()?;
        self.certificates.generate_root_ca().map_err(|error| {
            tracing::warn!(%error, "root CA generation failed");
            ControlError::from(error)
        })
    }

    pub fn import_root_ca_cert(&self, file_path: &str) -> Result<(), ControlError> {
        self.require_server_certs()?;
        self.certificates.import_root_ca(file_path)?;
        Ok(())
    }

    pub fn set_root_ca_cert_validity(&self, days: i64) -> Result<(), ControlError> {
        self.require_server_certs()?;
        self.certificates
            .set_root_ca_validity_days(validity_days(days)?)?;
        Ok(())
    }

    pub fn set_server_cert_validity(&self, days: i64) -> Result<(), ControlError> {
        self.require_server_certs()?;
        self.certificates
            .set_server_cert_validity_days(validity_days(days)?)?;
        Ok(())
    }

    pub fn root_ca_cert_validity(&self) -> Result<u32, ControlError> {
        self.require_server_certs()?;
        Ok(self.certificates.root_ca_validity_days())
    }

    pub fn server_cert_validity(&self) -> Result<u32, ControlError> {
        self.require_server_certs()?;
        Ok(self.certificates.server_cert_validity_days())
    }

    pub fn root_ca_cert(&self) -> Result<CertDownload, ControlError> {
        self.require_server_certs()?;
        let body = self.certificates.export_root_ca_pem()?;
        Ok(CertDownload {
            filename: ROOT_CA_CERT_FILENAME,
            content_type: ROOT_CA_CERT_CONTENT_TYPE,
            body,
        })
    }
}

fn validity_days(days: i64) -> Result<u32, ControlError> {
    u32::try_from(days)
        .ok()
        .filter(|days| *days > 0)
        .ok_or(ControlError::InvalidParameter {
            name: "validity",
            reason: "must be a positive number of days".to_string(),
        })
}
