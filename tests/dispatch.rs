//! End-to-end dispatch through a running balancer.

use serde_json::{json, Map, Value};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use rpc_balancer::config::DialFailurePolicy;
use rpc_balancer::protocol::read_message;
use rpc_balancer::rpc::handler::{CONNECT_ERROR, NO_REACHABLE_SERVER, NO_SERVER};
use rpc_balancer::ClientError;

mod common;

use common::{local_config, params, start_backend, start_balancer};

#[tokio::test]
async fn test_round_robin_order() {
    let balancer = start_balancer(local_config()).await;

    let _a = start_backend("a", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(1).await;
    let _b = start_backend("b", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(2).await;

    let client = balancer.client();
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(client.call("Whoami", Map::new()).await.unwrap());
    }
    assert_eq!(seen, vec![json!("a"), json!("b"), json!("a")]);

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_add_through_balancer() {
    let balancer = start_balancer(local_config()).await;
    let _a = start_backend("a", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(1).await;

    let sum = balancer
        .client()
        .call("Add", params(json!({"a": 1, "b": 2})))
        .await
        .unwrap();
    assert_eq!(sum, json!(3.0));

    let err = balancer
        .client()
        .call("Mul", params(json!({"a": 1, "b": 2})))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Remote(ref m) if m == "Invalid RPC Call Method"));

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_dead_backend_is_retried_on_next() {
    let balancer = start_balancer(local_config()).await;

    let mut a = start_backend("a", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(1).await;
    let _b = start_backend("b", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(2).await;

    // A stops serving but keeps heartbeating, so it stays registered.
    a.stop_serving().await;
    assert_eq!(balancer.registry.len(), 2);

    let client = balancer.client();
    for _ in 0..4 {
        let who = client.call("Whoami", Map::new()).await.unwrap();
        assert_eq!(who, json!("b"));
    }

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_all_backends_dead_is_reported() {
    let balancer = start_balancer(local_config()).await;

    let mut a = start_backend("a", &balancer.heartbeat_addr).await;
    let mut b = start_backend("b", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(2).await;
    a.stop_serving().await;
    b.stop_serving().await;

    let err = balancer.client().call("Whoami", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote(ref m) if m == NO_REACHABLE_SERVER));

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_fail_fast_policy_surfaces_dial_error() {
    let mut config = local_config();
    config.dispatch.on_dial_failure = DialFailurePolicy::FailFast;
    let balancer = start_balancer(config).await;

    let mut a = start_backend("a", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(1).await;
    let _b = start_backend("b", &balancer.heartbeat_addr).await;
    balancer.wait_for_backends(2).await;
    a.stop_serving().await;

    let client = balancer.client();
    let first = client.call("Whoami", Map::new()).await.unwrap_err();
    assert!(matches!(first, ClientError::Remote(ref m) if m == CONNECT_ERROR));

    // The cursor moved on; B still answers.
    let second = client.call("Whoami", Map::new()).await.unwrap();
    assert_eq!(second, json!("b"));

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_empty_registry_returns_error_envelope() {
    let balancer = start_balancer(local_config()).await;

    let mut stream = TcpStream::connect(&balancer.client_addr).await.unwrap();
    stream
        .write_all(b"{\"method\":\"Add\",\"params\":{\"a\":1,\"b\":2}}\n")
        .await
        .unwrap();
    let mut reader = BufReader::new(stream);
    let reply: Value = read_message(&mut reader).await.unwrap();
    assert_eq!(reply, json!({"error": NO_SERVER}));

    balancer.shutdown().await;
}

#[tokio::test]
async fn test_request_and_response_relayed_verbatim() {
    let balancer = start_balancer(local_config()).await;

    // A raw backend that echoes what it received inside its reply, plus
    // a key the balancer knows nothing about.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let (read, mut write) = stream.split();
            let mut reader = BufReader::new(read);
            let request: Value = read_message(&mut reader).await.unwrap();
            let reply = json!({"result": {"echo": request}, "served_by": "raw"});
            rpc_balancer::protocol::write_message(&mut write, &reply).await.unwrap();
        }
    });
    let _heartbeats = tokio::spawn(
        rpc_balancer::backend::HeartbeatSender::new(balancer.heartbeat_addr.clone(), port.to_string())
            .with_interval(common::HEARTBEAT_INTERVAL)
            .run(),
    );
    balancer.wait_for_backends(1).await;

    let requests = [
        json!({
            "method": "Concat",
            "params": {"left": "foo", "right": [1, 2, {"nested": true}]},
            "trace": "abc"
        }),
        json!({"method": "Ping"}),
        json!({"method": "Sum", "params": [1, 2, 3]}),
    ];
    for request in requests {
        let mut stream = TcpStream::connect(&balancer.client_addr).await.unwrap();
        let mut raw = serde_json::to_vec(&request).unwrap();
        raw.push(b'\n');
        stream.write_all(&raw).await.unwrap();

        let mut reader = BufReader::new(stream);
        let reply: Value = read_message(&mut reader).await.unwrap();
        assert_eq!(reply, json!({"result": {"echo": request}, "served_by": "raw"}));
    }

    balancer.shutdown().await;
}
