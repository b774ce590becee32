//! Integration tests for the rendezvous server over real UDP sockets.
//!
//! # Purpose
//!
//! Each test starts a server on an ephemeral loopback port and talks to it
//! with plain `UdpSocket`s sending the literal datagram text a peer would
//! send.  They verify:
//!
//! - authentication outcomes, including a second login for a live identity;
//! - the alice/bob/carol publish → search → get walkthrough;
//! - eviction of a session that stops heartbeating;
//! - `ERROR` replies for unauthenticated and malformed requests.
//!
//! Every receive is bounded by a timeout so a lost datagram fails the test
//! instead of hanging it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use bittrickle_core::Shutdown;
use bittrickle_server::application::dispatch::{Dispatcher, RendezvousState};
use bittrickle_server::infrastructure::network::run_server;
use bittrickle_server::infrastructure::network::udp_server::RendezvousServer;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<Shutdown>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(liveness_timeout: Duration, sweep_interval: Duration) -> Self {
        let credentials: HashMap<String, String> = [
            ("alice".to_string(), "pw1".to_string()),
            ("bob".to_string(), "pw2".to_string()),
            ("carol".to_string(), "pw3".to_string()),
        ]
        .into();
        let state = Arc::new(Mutex::new(RendezvousState::new(liveness_timeout)));
        let dispatcher = Dispatcher::new(state, Arc::new(credentials));
        let server = RendezvousServer::bind("127.0.0.1:0".parse().unwrap(), dispatcher)
            .await
            .expect("bind");
        let addr = server.local_addr().expect("local addr");
        let shutdown = Arc::new(Shutdown::new());
        let task = tokio::spawn(run_server(server, sweep_interval, Arc::clone(&shutdown)));
        Self {
            addr,
            shutdown,
            task,
        }
    }

    async fn default_timings() -> Self {
        Self::start(Duration::from_secs(3), Duration::from_secs(1)).await
    }

    async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("server must stop on shutdown")
            .unwrap();
    }
}

/// A peer's datagram socket, speaking raw protocol text.
struct Peer {
    socket: UdpSocket,
    server: SocketAddr,
}

impl Peer {
    async fn new(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self { socket, server }
    }

    async fn send(&self, text: &str) {
        self.socket.send_to(text.as_bytes(), self.server).await.unwrap();
    }

    async fn request(&self, text: &str) -> String {
        self.send(text).await;
        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(REPLY_TIMEOUT, self.socket.recv_from(&mut buf))
            .await
            .unwrap_or_else(|_| panic!("no reply to {text:?}"))
            .unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    async fn expect_silence(&self) {
        let mut buf = [0u8; 2048];
        let got = tokio::time::timeout(Duration::from_millis(300), self.socket.recv_from(&mut buf)).await;
        assert!(got.is_err(), "expected no reply");
    }

    async fn login(server: SocketAddr, identity: &str, secret: &str) -> Self {
        let peer = Self::new(server).await;
        let reply = peer.request(&format!("AUTH {identity} {secret} 40000")).await;
        assert_eq!(reply, "AUTH_SUCCESS");
        peer
    }
}

// ── Authentication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_success_failure_and_already_active() {
    let server = TestServer::default_timings().await;
    let first = Peer::new(server.addr).await;
    let second = Peer::new(server.addr).await;

    assert_eq!(first.request("AUTH alice wrong 40000").await, "AUTH_FAILURE");
    assert_eq!(first.request("AUTH alice pw1 40000").await, "AUTH_SUCCESS");
    assert_eq!(second.request("AUTH alice pw1 40001").await, "USER_ALREADY_ACTIVE");

    server.stop().await;
}

/// Two sockets race the same login; exactly one of them wins.
#[tokio::test]
async fn test_concurrent_auth_for_one_identity_admits_exactly_one() {
    // Arrange
    let server = TestServer::default_timings().await;
    let first = Peer::new(server.addr).await;
    let second = Peer::new(server.addr).await;

    // Act
    let (a, b) = tokio::join!(
        first.request("AUTH carol pw3 40000"),
        second.request("AUTH carol pw3 40001"),
    );

    // Assert
    let mut replies = vec![a, b];
    replies.sort();
    assert_eq!(replies, ["AUTH_SUCCESS", "USER_ALREADY_ACTIVE"]);

    server.stop().await;
}

// ── Walkthrough ───────────────────────────────────────────────────────────────

/// alice and bob publish, carol searches and resolves.
#[tokio::test]
async fn test_alice_bob_carol_walkthrough() {
    // Arrange
    let server = TestServer::default_timings().await;
    let alice = Peer::login(server.addr, "alice", "pw1").await;
    let bob = Peer::login(server.addr, "bob", "pw2").await;
    let carol = Peer::login(server.addr, "carol", "pw3").await;

    // Act / Assert: publishing
    assert_eq!(alice.request("pub report.pdf").await, "Published file: report.pdf");
    assert_eq!(alice.request("pub report.pdf").await, "Already published file: report.pdf");
    assert_eq!(bob.request("pub report-draft.pdf").await, "Published file: report-draft.pdf");
    assert_eq!(bob.request("pub music.mp3").await, "Published file: music.mp3");

    // lap / lpf
    assert_eq!(carol.request("lap").await, "Active peers: alice, bob");
    assert_eq!(carol.request("lpf").await, "No files published");
    assert_eq!(bob.request("lpf").await, "Published files: music.mp3, report-draft.pdf");

    // sch
    assert_eq!(carol.request("sch report").await, "report-draft.pdf | report.pdf");
    assert_eq!(alice.request("sch report").await, "report-draft.pdf");
    assert_eq!(carol.request("sch nothing-matches").await, "");

    // get
    assert_eq!(carol.request("get report.pdf").await, "127.0.0.1 40000");
    assert_eq!(carol.request("get missing.txt").await, "File not found");

    // unp
    assert_eq!(bob.request("unp music.mp3").await, "Unpublished file: music.mp3");
    assert_eq!(bob.request("unp music.mp3").await, "User has not published file: music.mp3");

    server.stop().await;
}

#[tokio::test]
async fn test_logout_frees_identity_and_hides_files() {
    let server = TestServer::default_timings().await;
    let alice = Peer::login(server.addr, "alice", "pw1").await;
    let bob = Peer::login(server.addr, "bob", "pw2").await;
    assert_eq!(bob.request("pub b.txt").await, "Published file: b.txt");

    bob.send("LOGOUT").await;
    bob.expect_silence().await;

    assert_eq!(alice.request("lap").await, "No active peers");
    assert_eq!(alice.request("get b.txt").await, "File not found");
    // bob can log straight back in from a new socket.
    let bob_again = Peer::login(server.addr, "bob", "pw2").await;
    assert_eq!(bob_again.request("lpf").await, "Published files: b.txt");

    server.stop().await;
}

// ── Liveness ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_silent_session_is_evicted_and_heartbeating_one_survives() {
    // Arrange: short timings so the test stays fast.
    let server = TestServer::start(Duration::from_millis(300), Duration::from_millis(50)).await;
    let alice = Peer::login(server.addr, "alice", "pw1").await;
    let bob = Peer::login(server.addr, "bob", "pw2").await;

    // Act: bob heartbeats, alice stays silent.
    for _ in 0..10 {
        bob.send("HEARTBEAT").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Assert
    assert_eq!(bob.request("lap").await, "No active peers");
    assert_eq!(alice.request("lap").await, "ERROR UNAUTHENTICATED");
    let alice_again = Peer::login(server.addr, "alice", "pw1").await;
    assert_eq!(alice_again.request("lap").await, "Active peers: bob");

    server.stop().await;
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthenticated_and_malformed_requests_get_error_replies() {
    let server = TestServer::default_timings().await;
    let stranger = Peer::new(server.addr).await;

    assert_eq!(stranger.request("lap").await, "ERROR UNAUTHENTICATED");
    assert!(stranger.request("bogus").await.starts_with("ERROR MALFORMED"));
    assert!(stranger.request("AUTH alice pw1").await.starts_with("ERROR MALFORMED"));
    assert!(stranger.request("get ../../etc/passwd").await.starts_with("ERROR MALFORMED"));

    stranger.send("HEARTBEAT").await;
    stranger.expect_silence().await;

    // The loop is still serving after all of that.
    assert_eq!(stranger.request("AUTH carol pw3 40000").await, "AUTH_SUCCESS");

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_datagram_is_rejected_not_truncated() {
    let server = TestServer::default_timings().await;
    let alice = Peer::login(server.addr, "alice", "pw1").await;

    let long = format!("pub {}", "a".repeat(1100));
    assert!(alice.request(&long).await.starts_with("ERROR MALFORMED"));
    assert_eq!(alice.request("lpf").await, "No files published");

    server.stop().await;
}
