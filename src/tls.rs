//! Self-signed TLS material for local servers and tests.

use rcgen::CertifiedKey;
use std::{fs, path::Path};
use tracing::info;

use crate::RpcError;

/// Writes a fresh self-signed certificate and its private key as PEM.
///
/// `names` become the certificate's subject alternative names; a client must
/// use one of them as its `server_name`. Missing parent directories are
/// created.
pub fn generate_self_signed(
    cert_path: &Path,
    key_path: &Path,
    names: &[&str],
) -> Result<(), RpcError> {
    let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
    let CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(names)
        .map_err(|e| RpcError::TlsError(format!("certificate generation failed: {e}")))?;

    for path in [cert_path, key_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(cert_path, cert.pem())?;
    fs::write(key_path, key_pair.serialize_pem())?;

    info!(cert = %cert_path.display(), key = %key_path.display(), "wrote self-signed certificate");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pem_files_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("certs/cert.pem");
        let key = dir.path().join("certs/key.pem");

        generate_self_signed(&cert, &key, &["localhost"]).unwrap();

        let cert_pem = std::fs::read_to_string(&cert).unwrap();
        let key_pem = std::fs::read_to_string(&key).unwrap();
        assert!(cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key_pem.contains("PRIVATE KEY"));
    }
}
