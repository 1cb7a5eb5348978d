//! Client traffic over TLS, with certificates minted at test time.

use std::path::PathBuf;

use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa};
use serde_json::json;

use rpc_balancer::config::TlsConfig;
use rpc_balancer::net::tls;
use rpc_balancer::{ClientError, RpcClient};

mod common;

use common::{local_config, params, start_backend, start_balancer};

struct Material {
    ca_pem: String,
    cert_path: PathBuf,
    key_path: PathBuf,
}

fn mint(tag: &str) -> Material {
    let mut ca_params = CertificateParams::new(Vec::new());
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "rpc-balancer test CA");
    let ca = Certificate::from_params(ca_params).unwrap();

    let mut leaf_params = CertificateParams::new(vec!["localhost".to_string()]);
    leaf_params.distinguished_name.push(DnType::CommonName, "localhost");
    let leaf = Certificate::from_params(leaf_params).unwrap();

    let dir = std::env::temp_dir().join(format!("rpc-balancer-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("lb.crt");
    let key_path = dir.join("lb.key");
    std::fs::write(&cert_path, leaf.serialize_pem_with_signer(&ca).unwrap()).unwrap();
    std::fs::write(&key_path, leaf.serialize_private_key_pem()).unwrap();

    Material {
        ca_pem: ca.serialize_pem().unwrap(),
        cert_path,
        key_path,
    }
}

#[tokio::test]
async fn test_call_over_tls() {
    let material = mint("call");
    let mut config = local_config();
    config.listener.tls = Some(TlsConfig {
        cert_path: material.cert_path.display().to_string(),
        key_path: material.key_path.display().to_string(),
    });
    let balancer = start_balancer(config).await;
    let _a = start_backend("a", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(1).await;

    let connector = tls::connector_from_pem(material.ca_pem.as_bytes()).unwrap();
    let client = RpcClient::new(balancer.client_addr.clone())
        .with_tls(connector, tls::server_name("localhost").unwrap());

    let diff = client.call("Sub", params(json!({"a": 1, "b": 2}))).await.unwrap();
    assert_eq!(diff, json!(-1.0));

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_plaintext_client_is_rejected() {
    let material = mint("plain");
    let mut config = local_config();
    config.listener.tls = Some(TlsConfig {
        cert_path: material.cert_path.display().to_string(),
        key_path: material.key_path.display().to_string(),
    });
    let balancer = start_balancer(config).await;

    let err = balancer
        .client()
        .call("Add", params(json!({"a": 1, "b": 2})))
        .await
        .unwrap_err();
    assert!(!matches!(err, ClientError::Remote(_)), "unexpected reply: {err}");

    balancer.shutdown().await;
}
