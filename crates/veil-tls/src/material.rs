use std::fmt::{self, Write as _};
use std::net::IpAddr;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, PublicKeyData, SanType,
};
use rustls_pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::errors::CertStoreError;

/// Subject identity placed on generated root certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaIdentity {
    pub common_name: String,
    pub organization: String,
}

impl Default for CaIdentity {
    fn default() -> Self {
        Self {
            common_name: "Veil Proxy Root CA".to_string(),
            organization: "Veil Proxy".to_string(),
        }
    }
}

/// Root key/certificate bundle. Handed out as immutable `Arc` snapshots;
/// regeneration and import replace the whole value, never parts of it.
pub struct RootCaMaterial {
    issuer: Issuer<'static, KeyPair>,
    cert_pem: String,
    key_pem: String,
    cert_der: CertificateDer<'static>,
    fingerprint: String,
    not_after: OffsetDateTime,
}

impl RootCaMaterial {
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// Lowercase hex SHA-256 of the certificate DER.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }
}

// The issuer (and the private key inside it) has no useful debug form;
// identify material by its public fingerprint only.
impl fmt::Debug for RootCaMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCaMaterial")
            .field("fingerprint", &self.fingerprint)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Server certificate minted for one intercepted host, signed by the
/// current root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedServerCert {
    pub host: String,
    pub cert_pem: String,
    pub key_pem: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub ca_fingerprint: String,
}

pub(crate) fn generate_root_ca(
    identity: &CaIdentity,
    validity_days: u32,
) -> Result<RootCaMaterial, CertStoreError> {
    let key = KeyPair::generate().map_err(generation_error)?;

    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.use_authority_key_identifier_extension = true;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, identity.common_name.clone());
    dn.push(DnType::OrganizationName, identity.organization.clone());
    params.distinguished_name = dn;

    let (not_before, not_after) = validity_window(validity_days)?;
    params.not_before = not_before;
    params.not_after = not_after;

    let cert = params.self_signed(&key).map_err(generation_error)?;
    let cert_pem = cert.pem();
    let key_pem = key.serialize_pem();
    let cert_der = cert.der().clone();
    let fingerprint = sha256_hex(cert_der.as_ref());
    let issuer = Issuer::new(params, key);

    Ok(RootCaMaterial {
        issuer,
        cert_pem,
        key_pem,
        cert_der,
        fingerprint,
        not_after,
    })
}

/// Rebuilds root material from a PEM bundle holding the CA certificate
/// and its PKCS#8 private key. Every rejection carries the reason; the
/// caller's existing material is never touched by a failed import.
pub(crate) fn import_root_ca_bundle(bundle: &[u8]) -> Result<RootCaMaterial, CertStoreError> {
    let blocks = pem::parse_many(bundle)
        .map_err(|error| import_error(format!("malformed PEM: {error}")))?;
    if blocks.is_empty() {
        return Err(import_error("no PEM blocks found".to_string()));
    }

    let cert_block = blocks
        .iter()
        .find(|block| block.tag() == "CERTIFICATE")
        .ok_or_else(|| import_error("bundle does not contain a certificate".to_string()))?;
    let key_block = blocks
        .iter()
        .find(|block| block.tag() == "PRIVATE KEY")
        .ok_or_else(|| {
            if blocks
                .iter()
                .any(|block| matches!(block.tag(), "RSA PRIVATE KEY" | "EC PRIVATE KEY"))
            {
                import_error(
                    "legacy private key encoding is not supported, re-encode as PKCS#8".to_string(),
                )
            } else {
                import_error("bundle does not contain a private key".to_string())
            }
        })?;

    let cert_der = CertificateDer::from(cert_block.contents().to_vec());
    let key = KeyPair::try_from(key_block.contents())
        .map_err(|error| import_error(format!("invalid private key: {error}")))?;

    let (spki, not_after) = {
        let (_, parsed) = X509Certificate::from_der(cert_der.as_ref())
            .map_err(|error| import_error(format!("invalid certificate: {error}")))?;
        let is_ca = parsed
            .basic_constraints()
            .map_err(|error| import_error(format!("invalid basicConstraints extension: {error}")))?
            .map(|ext| ext.value.ca)
            .unwrap_or(false);
        if !is_ca {
            return Err(import_error(
                "certificate is not a certificate authority (CA basic constraint missing)"
                    .to_string(),
            ));
        }
        (
            parsed.public_key().raw.to_vec(),
            parsed.validity().not_after.to_datetime(),
        )
    };

    if spki != key.subject_public_key_info() {
        return Err(import_error(
            "private key does not match the certificate".to_string(),
        ));
    }

    let issuer = Issuer::from_ca_cert_der(&cert_der, key).map_err(|error| {
        import_error(format!("certificate cannot act as an issuer: {error}"))
    })?;

    let cert_pem = pem::encode(cert_block);
    let fingerprint = sha256_hex(cert_der.as_ref());
    // serialize_pem is not available once the key is inside the issuer,
    // so normalize the imported block instead.
    let key_pem = pem::encode(key_block);

    Ok(RootCaMaterial {
        issuer,
        cert_pem,
        key_pem,
        cert_der,
        fingerprint,
        not_after,
    })
}

pub(crate) fn issue_server_cert(
    ca: &RootCaMaterial,
    host: &str,
    validity_days: u32,
) -> Result<IssuedServerCert, CertStoreError> {
    let host = normalize_host(host);
    if host.is_empty() {
        return Err(generation_error_text("server certificate host must not be empty"));
    }

    let mut params = CertificateParams::new(Vec::<String>::new()).map_err(generation_error)?;
    params.is_ca = IsCa::NoCa;
    params.use_authority_key_identifier_extension = true;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, host.clone());
    params.distinguished_name = dn;

    if let Ok(ip) = host.parse::<IpAddr>() {
        params.subject_alt_names.push(SanType::IpAddress(ip));
    } else {
        params
            .subject_alt_names
            .push(SanType::DnsName(host.as_str().try_into().map_err(generation_error)?));
    }

    let (not_before, not_after) = validity_window(validity_days)?;
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate().map_err(generation_error)?;
    let cert = params.signed_by(&key, &ca.issuer).map_err(generation_error)?;

    Ok(IssuedServerCert {
        host,
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        not_before,
        not_after,
        ca_fingerprint: ca.fingerprint.clone(),
    })
}

/// Validity settings only enforce positivity, so day counts large enough
/// to overflow the date range must fail as a generation error instead of
/// panicking.
fn validity_window(days: u32) -> Result<(OffsetDateTime, OffsetDateTime), CertStoreError> {
    let not_before = OffsetDateTime::now_utc();
    let not_after = not_before
        .checked_add(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            generation_error_text("validity period exceeds the representable certificate date range")
        })?;
    Ok((not_before, not_after))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    match host.parse::<IpAddr>() {
        Ok(_) => host.to_string(),
        Err(_) => host.to_ascii_lowercase(),
    }
}

fn generation_error(error: rcgen::Error) -> CertStoreError {
    CertStoreError::Generation(error.to_string())
}

fn generation_error_text(reason: &str) -> CertStoreError {
    CertStoreError::Generation(reason.to_string())
}

fn import_error(reason: String) -> CertStoreError {
    CertStoreError::Import(reason)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut rendered = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}
