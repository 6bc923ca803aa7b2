use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::CertStoreError;
use crate::material::{self, CaIdentity, IssuedServerCert, RootCaMaterial};

// Validity defaults carried over from the original proxy options.
pub const DEFAULT_ROOT_CA_VALIDITY_DAYS: u32 = 365;
pub const DEFAULT_SERVER_CERT_VALIDITY_DAYS: u32 = 368;

/// Independent validity periods for the root certificate and the per-host
/// server certificates minted from it. A long-lived root is expensive to
/// rotate (clients must re-trust it) while short-lived leaves keep the
/// exposure window small, so the two are tuned separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertValidity {
    pub root_ca_days: u32,
    pub server_cert_days: u32,
}

impl Default for CertValidity {
    fn default() -> Self {
        Self {
            root_ca_days: DEFAULT_ROOT_CA_VALIDITY_DAYS,
            server_cert_days: DEFAULT_SERVER_CERT_VALIDITY_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertStoreMetrics {
    pub roots_generated: u64,
    pub roots_imported: u64,
    pub leaves_issued: u64,
}

/// Owns the root CA material and the validity settings.
///
/// Material is published as `Option<Arc<RootCaMaterial>>`: generate and
/// import build the replacement fully before taking the write lock, so a
/// failure leaves the previous root untouched and readers only ever see
/// complete bundles.
pub struct CertificateStore {
    identity: CaIdentity,
    validity: RwLock<CertValidity>,
    material: RwLock<Option<Arc<RootCaMaterial>>>,
    roots_generated: AtomicU64,
    roots_imported: AtomicU64,
    leaves_issued: AtomicU64,
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new(CaIdentity::default())
    }
}

impl CertificateStore {
    pub fn new(identity: CaIdentity) -> Self {
        Self {
            identity,
            validity: RwLock::new(CertValidity::default()),
            material: RwLock::new(None),
            roots_generated: AtomicU64::new(0),
            roots_imported: AtomicU64::new(0),
            leaves_issued: AtomicU64::new(0),
        }
    }

    /// Generates a fresh root key and self-signed certificate, replacing
    /// any existing material atomically.
    pub fn generate_root_ca(&self) -> Result<(), CertStoreError> {
        let days = self.validity.read().root_ca_days;
        self.install_root_ca(|| material::generate_root_ca(&self.identity, days))?;
        self.roots_generated.fetch_add(1, Ordering::Relaxed);
        if let Some(material) = self.root_ca() {
            tracing::debug!(fingerprint = material.fingerprint(), "generated root CA");
        }
        Ok(())
    }

    /// Imports root material from a PEM bundle file (certificate plus
    /// PKCS#8 private key).
    pub fn import_root_ca(&self, path: impl AsRef<Path>) -> Result<(), CertStoreError> {
        let path = path.as_ref();
        let bundle = fs::read(path).map_err(|error| {
            CertStoreError::Import(format!("cannot read '{}': {error}", path.display()))
        })?;
        self.install_root_ca(|| material::import_root_ca_bundle(&bundle))?;
        self.roots_imported.fetch_add(1, Ordering::Relaxed);
        if let Some(material) = self.root_ca() {
            tracing::debug!(
                fingerprint = material.fingerprint(),
                path = %path.display(),
                "imported root CA"
            );
        }
        Ok(())
    }

    /// Loads root material from separate certificate and key PEM files,
    /// the layout `persist_root_ca` writes.
    pub fn load_root_ca_from_files(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<(), CertStoreError> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();
        let mut bundle = fs::read(cert_path).map_err(|error| {
            CertStoreError::Import(format!("cannot read '{}': {error}", cert_path.display()))
        })?;
        let key = fs::read(key_path).map_err(|error| {
            CertStoreError::Import(format!("cannot read '{}': {error}", key_path.display()))
        })?;
        bundle.extend_from_slice(&key);
        self.install_root_ca(|| material::import_root_ca_bundle(&bundle))?;
        self.roots_imported.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes the current root certificate and key as PEM files, creating
    /// parent directories as needed.
    pub fn persist_root_ca(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<(), CertStoreError> {
        let material = self.root_ca().ok_or(CertStoreError::NotPresent)?;
        ensure_parent_exists(cert_path.as_ref())?;
        ensure_parent_exists(key_path.as_ref())?;
        fs::write(cert_path, material.cert_pem().as_bytes())?;
        fs::write(key_path, material.key_pem().as_bytes())?;
        Ok(())
    }

    pub fn root_ca(&self) -> Option<Arc<RootCaMaterial>> {
        self.material.read().clone()
    }

    pub fn export_root_ca_pem(&self) -> Result<String, CertStoreError> {
        let material = self.root_ca().ok_or(CertStoreError::NotPresent)?;
        let pem = material.cert_pem().to_string();
        if pem.trim().is_empty() {
            return Err(CertStoreError::EmptySerialization);
        }
        Ok(pem)
    }

    /// Mints a server certificate for `host`, signed by the current root,
    /// using the server-cert validity in effect right now.
    pub fn issue_server_cert(&self, host: &str) -> Result<IssuedServerCert, CertStoreError> {
        let material = self.root_ca().ok_or(CertStoreError::NotPresent)?;
        let days = self.validity.read().server_cert_days;
        let issued = material::issue_server_cert(&material, host, days)?;
        self.leaves_issued.fetch_add(1, Ordering::Relaxed);
        Ok(issued)
    }

    pub fn set_root_ca_validity_days(&self, days: u32) -> Result<(), CertStoreError> {
        if days == 0 {
            return Err(CertStoreError::InvalidValidity {
                setting: "root CA certificate validity",
            });
        }
        self.validity.write().root_ca_days = days;
        Ok(())
    }

    pub fn set_server_cert_validity_days(&self, days: u32) -> Result<(), CertStoreError> {
        if days == 0 {
            return Err(CertStoreError::InvalidValidity {
                setting: "server certificate validity",
            });
        }
        self.validity.write().server_cert_days = days;
        Ok(())
    }

    pub fn root_ca_validity_days(&self) -> u32 {
        self.validity.read().root_ca_days
    }

    pub fn server_cert_validity_days(&self) -> u32 {
        self.validity.read().server_cert_days
    }

    pub fn metrics_snapshot(&self) -> CertStoreMetrics {
        CertStoreMetrics {
            roots_generated: self.roots_generated.load(Ordering::Relaxed),
            roots_imported: self.roots_imported.load(Ordering::Relaxed),
            leaves_issued: self.leaves_issued.load(Ordering::Relaxed),
        }
    }

    /// Builds the replacement first; only a successful build reaches the
    /// write lock, so prior material survives every failure path.
    fn install_root_ca(
        &self,
        build: impl FnOnce() -> Result<RootCaMaterial, CertStoreError>,
    ) -> Result<(), CertStoreError> {
        let material = build()?;
        *self.material.write() = Some(Arc::new(material));
        Ok(())
    }
}

fn ensure_parent_exists(path: &Path) -> Result<(), CertStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
