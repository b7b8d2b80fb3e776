//! Wire roundtrip through the dispatch service over an in-memory duplex
//! stream, with a canned executor standing in for privileged execution.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::path::PathBuf;
use std::sync::Arc;

use nix::errno::Errno;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use xattrust_common::types::{ContainerId, Credentials, IdMapping};
use xattrust_core::classify::{RawCall, SetFlags, SyscallKind};
use xattrust_core::context::ProcessContext;
use xattrust_core::pipeline::CallHandler;
use xattrust_core::policy::Policy;
use xattrust_core::proxy::PrivilegedExecutor;
use xattrust_core::resolve::ResolvedTarget;
use xattrust_shim::event::{CallRequest, CallResponse, Request, Verdict};
use xattrust_shim::service;

/// Executor answering with canned values; records nothing.
struct CannedExecutor;

impl PrivilegedExecutor for CannedExecutor {
    fn get(&self, _target: &ResolvedTarget, _name: &str, _follow: bool) -> Result<Vec<u8>, Errno> {
        Ok(b"y".to_vec())
    }

    fn set(
        &self,
        _target: &ResolvedTarget,
        _name: &str,
        _value: &[u8],
        _flags: SetFlags,
        _follow: bool,
    ) -> Result<(), Errno> {
        Ok(())
    }

    fn list(&self, _target: &ResolvedTarget, _follow: bool) -> Result<Vec<String>, Errno> {
        Ok(vec![
            "trusted.overlay.opaque".to_string(),
            "user.demo".to_string(),
        ])
    }

    fn remove(&self, _target: &ResolvedTarget, _name: &str, _follow: bool) -> Result<(), Errno> {
        Ok(())
    }
}

fn handler() -> Arc<CallHandler> {
    let policy = Policy::new(
        ContainerId::new("wire-test"),
        true,
        ["overlay.opaque".to_string()],
        IdMapping::identity(),
        IdMapping::identity(),
    );
    Arc::new(CallHandler::new(Arc::new(policy), Arc::new(CannedExecutor)))
}

fn call(id: u64, syscall: SyscallKind, name: Option<&str>, rootfs: &std::path::Path) -> Request {
    Request::Call(CallRequest {
        id,
        call: RawCall {
            syscall,
            path: Some(PathBuf::from("/file.txt")),
            fd: None,
            name: name.map(String::from),
            value: Some(b"y".to_vec()),
            flags: 0,
            size: 1024,
        },
        process: ProcessContext::rooted(9, rootfs, Credentials::container_root()),
    })
}

async fn send(writer: &mut (impl AsyncWriteExt + Unpin), request: &Request) {
    let mut line = serde_json::to_vec(request).expect("should serialize");
    line.push(b'\n');
    writer.write_all(&line).await.expect("should write");
}

async fn recv(reader: &mut (impl AsyncBufReadExt + Unpin)) -> CallResponse {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await.expect("should read");
    assert!(n > 0, "transport closed early");
    serde_json::from_str(&line).expect("should deserialize")
}

#[tokio::test]
async fn calls_round_trip_with_correct_verdicts() {
    let rootfs = tempfile::tempdir().expect("should create rootfs");
    std::fs::write(rootfs.path().join("file.txt"), b"data").expect("should write");

    let (client, server) = tokio::io::duplex(16 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let served = tokio::spawn(service::drive(handler(), server_read, server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    let mut client_read = BufReader::new(client_read);

    // user.* write passes through to the caller's own syscall.
    send(
        &mut client_write,
        &call(1, SyscallKind::Setxattr, Some("user.demo"), rootfs.path()),
    )
    .await;
    let response = recv(&mut client_read).await;
    assert_eq!(response.id, 1);
    assert_eq!(response.verdict, Verdict::Continue);

    // Honored trusted write is emulated and answered directly.
    send(
        &mut client_write,
        &call(
            2,
            SyscallKind::Setxattr,
            Some("trusted.overlay.opaque"),
            rootfs.path(),
        ),
    )
    .await;
    let response = recv(&mut client_read).await;
    assert_eq!(response.id, 2);
    assert_eq!(response.verdict, Verdict::Reply);
    assert_eq!(response.ret, 0);

    // Privileged listing is emulated; the canned names come back
    // NUL-joined.
    send(
        &mut client_write,
        &call(3, SyscallKind::Listxattr, None, rootfs.path()),
    )
    .await;
    let response = recv(&mut client_read).await;
    assert_eq!(response.verdict, Verdict::Reply);
    let payload = response.payload.expect("listing should carry names");
    assert_eq!(payload, b"trusted.overlay.opaque\0user.demo\0".to_vec());

    // Unknown trusted name is refused as unsupported.
    send(
        &mut client_write,
        &call(
            4,
            SyscallKind::Setxattr,
            Some("trusted.overlay.redirect"),
            rootfs.path(),
        ),
    )
    .await;
    let response = recv(&mut client_read).await;
    assert_eq!(response.verdict, Verdict::Reply);
    assert_eq!(response.ret, -i64::from(Errno::EOPNOTSUPP as i32));

    // Closing the client ends the connection cleanly.
    drop(client_write);
    drop(client_read);
    served
        .await
        .expect("drive task should join")
        .expect("drive should close cleanly");
}
