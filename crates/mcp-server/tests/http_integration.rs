//! HTTP transport integration tests: spawn the real binary against a stub
//! gateway and talk to it over the wire.

mod common;

use std::net::TcpStream;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::json;

fn spawn_http_server(gateway_port: u16, http_port: u16) -> common::ChildGuard {
    let child = Command::new(common::SERVER_BIN)
        .args([
            "--transport",
            "http",
            "--host",
            "127.0.0.1",
            "--port",
            &gateway_port.to_string(),
            "--http-host",
            "127.0.0.1",
            "--http-port",
            &http_port.to_string(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn server");
    common::ChildGuard(child)
}

fn wait_for_listener(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        assert!(Instant::now() < deadline, "server never started listening");
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[tokio::test]
async fn http_server_listens_and_responds() {
    let gateway_port = common::spawn_stub_gateway();
    let http_port = common::free_port();
    let mut server = spawn_http_server(gateway_port, http_port);

    wait_for_listener(http_port);
    assert!(
        server.0.try_wait().expect("poll child").is_none(),
        "server process exited unexpectedly"
    );

    let response = reqwest::get(format!("http://127.0.0.1:{}/", http_port))
        .await
        .expect("GET /");
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn tool_outcomes_map_to_http_statuses() {
    let gateway_port = common::spawn_stub_gateway();
    let http_port = common::free_port();
    let _server = spawn_http_server(gateway_port, http_port);

    wait_for_listener(http_port);
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/mcp", http_port);

    // connection_status touches no gateway operation and succeeds.
    let response = client
        .post(&url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "connection_status", "arguments": {} }
        }))
        .send()
        .await
        .expect("POST tools/call");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert!(body["result"]["isError"].is_null());

    // Unknown tool is a 404 with a structured failure body.
    let response = client
        .post(&url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "no_such_tool", "arguments": {} }
        }))
        .send()
        .await
        .expect("POST unknown tool");
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body["result"]["isError"], true);

    // Schema violation is a 400, same response shape.
    let response = client
        .post(&url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": "get_quote", "arguments": { "symbol": 42 } }
        }))
        .send()
        .await
        .expect("POST bad arguments");
    assert_eq!(response.status().as_u16(), 400);
}

#[test]
fn connect_failure_exits_nonzero() {
    // Nothing listens on this port, so the startup connect must fail.
    let dead_port = common::free_port();
    let http_port = common::free_port();
    let mut server = spawn_http_server(dead_port, http_port);

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = server.0.try_wait().expect("poll child") {
            break status;
        }
        assert!(Instant::now() < deadline, "server did not exit");
        std::thread::sleep(Duration::from_millis(100));
    };

    assert!(!status.success());
}
