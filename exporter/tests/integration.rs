//! HTTP integration tests for the exporter.
//!
//! Each test spins up the real axum server on a random port, backed by a
//! collection engine whose host sources are replaced by canned data, and
//! makes actual HTTP requests via `reqwest`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use vdl_exporter::api;
use vdl_exporter::collectors::connections::{Connection, ConnectionTable};
use vdl_exporter::collectors::firewall::Firewall;
use vdl_exporter::collectors::packages::{PackageCollector, PackageManager, PackageSource};
use vdl_exporter::collectors::ports::PortCollector;
use vdl_exporter::collectors::Collector;
use vdl_exporter::error::{CollectError, Result};
use vdl_exporter::metrics::Metrics;

struct CannedPackages {
    broken: Arc<AtomicBool>,
}

impl PackageSource for CannedPackages {
    fn detect(&self) -> Option<PackageManager> {
        Some(PackageManager::Dpkg)
    }

    fn query(&self, _manager: PackageManager) -> Result<String> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(CollectError::Spawn {
                program: "dpkg-query",
                source: std::io::Error::new(std::io::ErrorKind::Other, "status database locked"),
            });
        }
        Ok("bash|5.2.15-2\nlinux-image-amd64|6.1.0\nopenssh-server|1:9.2p1\n".to_string())
    }
}

struct CannedTable;

impl ConnectionTable for CannedTable {
    fn connections(&mut self) -> Result<Vec<Connection>> {
        Ok(vec![Connection {
            socket_type: 1,
            address: "0.0.0.0".to_string(),
            port: 22,
            pid: 812,
        }])
    }

    fn process_name(&mut self, _pid: u32) -> String {
        "sshd".to_string()
    }
}

/// A host without firewalld.
struct NoFirewall;

impl Firewall for NoFirewall {
    fn zones(&mut self) -> Result<Vec<String>> {
        Err(CollectError::Firewall(zbus::Error::Failure(
            "org.freedesktop.DBus.Error.ServiceUnknown".to_string(),
        )))
    }

    fn ports(&mut self, _zone: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Spawn a real axum server on a random port.
///
/// Returns the base URL, e.g. `"http://127.0.0.1:54321"`, and the switch
/// that makes the package step fail.
async fn spawn_test_server() -> (String, Arc<AtomicBool>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind random port");
    let addr = listener.local_addr().expect("failed to get local address");
    let base_url = format!("http://{addr}");

    let broken = Arc::new(AtomicBool::new(false));
    let metrics = Metrics::new().expect("metrics registry");
    let packages = PackageCollector::new(
        Box::new(CannedPackages {
            broken: broken.clone(),
        }),
        Arc::new(HashSet::from(["linux-image-amd64".to_string()])),
        metrics.package_installed.clone(),
    );
    let ports = PortCollector::new(
        Box::new(CannedTable),
        Box::new(NoFirewall),
        false,
        metrics.ports_open.clone(),
        metrics.ports_authorized.clone(),
    );
    let collector = Arc::new(Collector::new(metrics, packages, ports));
    let app = api::router(api::AppState::new(collector));

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });

    (base_url, broken)
}

#[tokio::test]
async fn test_health() {
    let (base_url, _) = spawn_test_server().await;
    let resp = reqwest::get(format!("{base_url}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_metrics_empty_before_first_pass() {
    let (base_url, _) = spawn_test_server().await;
    let resp = reqwest::get(format!("{base_url}/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.text().await.unwrap().contains("package_installed_info{"));
}

#[tokio::test]
async fn test_refresh_then_scrape() {
    let (base_url, _) = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/refresh"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "collection triggered");

    let resp = client
        .get(format!("{base_url}/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("package_installed_info{name=\"bash\",version=\"5.2.15-2\"} 1"));
    assert!(body.contains("name=\"openssh-server\""));
    assert!(!body.contains("linux-image-amd64"), "excluded package leaked");
    assert!(body.contains("ports_open_info{"));
    assert!(body.contains("process=\"sshd\""));
    // firewalld is absent: no authorized ports, but the pass still succeeded.
    assert!(!body.contains("ports_authorized_info{"));
}

#[tokio::test]
async fn test_refresh_reports_package_failure() {
    let (base_url, broken) = spawn_test_server().await;
    broken.store(true, Ordering::SeqCst);

    let resp = reqwest::get(format!("{base_url}/refresh")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json: Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(json["code"], "collection_failed");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("status database locked"));
}

#[tokio::test]
async fn test_failed_pass_clears_previous_inventory() {
    let (base_url, broken) = spawn_test_server().await;

    let resp = reqwest::get(format!("{base_url}/refresh")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    broken.store(true, Ordering::SeqCst);
    let resp = reqwest::get(format!("{base_url}/refresh")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = reqwest::get(format!("{base_url}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.contains("package_installed_info{"));
    assert!(!body.contains("ports_open_info{"));
}
