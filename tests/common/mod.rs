//! Shared harness for integration tests: a balancer on ephemeral ports and
//! backends that register themselves with the crate's heartbeat sender.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rpc_balancer::backend::{HeartbeatSender, Service};
use rpc_balancer::config::BalancerConfig;
use rpc_balancer::lifecycle::{Balancer, Shutdown};
use rpc_balancer::load_balancer::Registry;
use rpc_balancer::{BalancerError, RpcClient};

/// Heartbeat interval used by test backends.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// A running balancer.
pub struct TestBalancer {
    pub heartbeat_addr: String,
    pub client_addr: String,
    pub registry: Arc<Registry>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), BalancerError>>,
}

/// Config listening on loopback with ephemeral ports.
pub fn local_config() -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.heartbeat.bind_address = "127.0.0.1:0".to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.connect_ms = 500;
    config.timeouts.io_ms = 2_000;
    config
}

pub async fn start_balancer(config: BalancerConfig) -> TestBalancer {
    let balancer = Balancer::bind(config).await.unwrap();
    let heartbeat_addr = balancer.heartbeat_addr().to_string();
    let client_addr = balancer.client_addr().to_string();
    let registry = balancer.registry();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(balancer.run_until(async {
        let _ = stopped.await;
    }));

    TestBalancer {
        heartbeat_addr,
        client_addr,
        registry,
        stop: Some(stop),
        task,
    }
}

impl TestBalancer {
    /// Wait until exactly `count` backends are registered.
    pub async fn wait_for_backends(&self, count: usize) {
        for _ in 0..300 {
            if self.registry.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} registered backends, found {}",
            self.registry.len()
        );
    }

    pub fn client(&self) -> RpcClient {
        RpcClient::new(self.client_addr.clone()).with_timeout(Duration::from_secs(5))
    }

    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("balancer did not shut down");
        result.unwrap().unwrap();
    }
}

/// A backend serving `Whoami` plus `Add`/`Sub`, registered via heartbeats.
pub struct TestBackend {
    pub name: &'static str,
    pub port: u16,
    service: Shutdown,
    service_task: JoinHandle<()>,
    heartbeats: Option<JoinHandle<()>>,
}

pub async fn start_backend(name: &'static str, heartbeat_addr: &str) -> TestBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let service = Shutdown::new();
    let handler = Service::arithmetic().with_method("Whoami", move |_| Ok(json!(name)));
    let service_task = tokio::spawn(handler.serve(listener, service.subscribe()));

    let mut backend = TestBackend {
        name,
        port,
        service,
        service_task,
        heartbeats: None,
    };
    backend.start_heartbeats(heartbeat_addr);
    backend
}

impl TestBackend {
    /// Open a fresh heartbeat connection.
    pub fn start_heartbeats(&mut self, heartbeat_addr: &str) {
        let sender = HeartbeatSender::new(heartbeat_addr, self.port.to_string())
            .with_interval(HEARTBEAT_INTERVAL);
        self.heartbeats = Some(tokio::spawn(async move {
            let _ = sender.run().await;
        }));
    }

    /// Stop heartbeating; the balancer notices only through the liveness timeout.
    pub fn stop_heartbeats(&mut self) {
        if let Some(task) = self.heartbeats.take() {
            task.abort();
        }
    }

    /// Stop serving RPC while heartbeats keep flowing.
    pub async fn stop_serving(&mut self) {
        self.service.trigger();
        (&mut self.service_task).await.unwrap();
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.stop_heartbeats();
        self.service_task.abort();
    }
}

pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("params must be an object, got {other}"),
    }
}
