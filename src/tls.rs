// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # TLS
//!
//! 从 PEM 文件构建 rustls 服务端配置。密钥交换只允许 X25519 与 P-256，
//! 协议版本为 TLS 1.2 与 TLS 1.3。

use std::{path::Path, sync::Arc};

use log::info;
use rustls::{
    crypto::{ring, CryptoProvider},
    pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer},
    ServerConfig,
};
use tokio_rustls::TlsAcceptor;

use crate::exception::Exception;

/// 只保留两条椭圆曲线的 ring 密码套件
pub fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: vec![ring::kx_group::X25519, ring::kx_group::SECP256R1],
        ..ring::default_provider()
    }
}

pub fn server_config(cert: &Path, key: &Path) -> Result<ServerConfig, Exception> {
    let certs = CertificateDer::pem_file_iter(cert)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|e| Exception::Tls(format!("无法读取证书{}：{}", cert.display(), e)))?;
    if certs.is_empty() {
        return Err(Exception::Tls(format!("{}中没有证书", cert.display())));
    }
    let key = PrivateKeyDer::from_pem_file(key)
        .map_err(|e| Exception::Tls(format!("无法读取私钥{}：{}", key.display(), e)))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| Exception::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Exception::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

pub fn acceptor(cert: &str, key: &str) -> Result<TlsAcceptor, Exception> {
    let config = server_config(Path::new(cert), Path::new(key))?;
    info!("TLS证书{}已载入", cert);
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_loads_certificate_and_key() {
        let config = server_config(
            Path::new(&fixture("cert.pem")),
            Path::new(&fixture("key.pem")),
        )
        .unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_only_modern_curves() {
        let names: Vec<_> = crypto_provider()
            .kx_groups
            .iter()
            .map(|group| group.name())
            .collect();
        assert_eq!(
            names,
            vec![
                rustls::NamedGroup::X25519,
                rustls::NamedGroup::secp256r1
            ]
        );
    }

    #[test]
    fn test_missing_files() {
        let err = acceptor("/nonexistent/cert.pem", &fixture("key.pem")).err().unwrap();
        assert!(matches!(err, Exception::Tls(_)));
        let err = acceptor(&fixture("cert.pem"), "/nonexistent/key.pem").err().unwrap();
        assert!(matches!(err, Exception::Tls(_)));
    }

    #[test]
    fn test_key_file_is_not_a_certificate() {
        let err = acceptor(&fixture("key.pem"), &fixture("key.pem")).err().unwrap();
        assert!(matches!(err, Exception::Tls(_)));
    }
}
