//! Shared helpers for integration tests: a stub broker gateway the server
//! can connect to, free-port allocation, and child process cleanup.

#![allow(dead_code)]

use std::net::TcpListener;
use std::process::Child;

/// Binary under test.
pub const SERVER_BIN: &str = env!("CARGO_BIN_EXE_ib-mcp-server");

/// Start a TCP listener standing in for the broker gateway. It accepts
/// connections and holds them open; the protocol above it is never
/// exercised by these tests.
pub fn spawn_stub_gateway() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub gateway");
    let port = listener.local_addr().expect("stub gateway addr").port();

    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            match stream {
                Ok(socket) => held.push(socket),
                Err(_) => break,
            }
        }
    });

    port
}

/// Reserve a port that nothing is listening on.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("reserve port");
    listener.local_addr().expect("reserved addr").port()
}

/// Kills the child process when the test ends, pass or fail.
pub struct ChildGuard(pub Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}
