// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::redundant_pub_crate
)]

//! Integration tests for chat sessions over real TCP connections.
//!
//! Each test starts a server on `127.0.0.1:0` and drives it with plain
//! line-oriented clients, checking what every participant observes:
//! - name negotiation (typed and anonymous names)
//! - join / message / leave notices and their exact wire form
//! - self-delivery of broadcasts
//! - registry size as clients join and leave
//! - exactly one departure notice per member

use std::time::Duration;

use linechat_proto::protocol::{ANONYMOUS_PREFIX, NAME_PROMPT};
use linechat_server::config::ServerConfig;
use linechat_server::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Helpers
// =============================================================================

async fn start_server() -> (ChatServer, std::net::SocketAddr) {
    let (server, _events) = ChatServer::new(&ServerConfig::with_bind_addr("127.0.0.1:0"));
    let addr = server.start().await.expect("failed to start test server");
    (server, addr)
}

/// A line-oriented TCP client, as a terminal client would be.
struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    /// Connects, answers the prompt with `name`, and consumes the welcome and
    /// the client's own join notice. Returns `(welcome, join)`.
    async fn join(addr: std::net::SocketAddr, name: &str) -> (Self, String, String) {
        let mut client = Self::connect(addr).await;
        assert_eq!(client.recv().await.as_deref(), Some(NAME_PROMPT));
        client.send(name).await;
        let welcome = client.recv().await.expect("welcome");
        let join = client.recv().await.expect("own join notice");
        (client, welcome, join)
    }

    async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }

    /// Asserts nothing arrives for a short while.
    async fn assert_quiet(&mut self) {
        let pending = timeout(Duration::from_millis(200), self.lines.next_line()).await;
        assert!(pending.is_err(), "unexpected line: {pending:?}");
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }
}

/// The `#rrggbb` prefix of an attributed line.
fn color_of(line: &str) -> &str {
    line.split_once('|').expect("attributed line").0
}

async fn wait_for_members(server: &ChatServer, expected: usize) {
    timeout(WAIT, async {
        while server.registry().len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {expected} members"));
}

// =============================================================================
// Naming
// =============================================================================

#[tokio::test]
async fn typed_name_is_welcomed() {
    let (_server, addr) = start_server().await;

    let (_alice, welcome, join) = TestClient::join(addr, "Alice").await;

    assert!(welcome.contains("Alice"), "{welcome}");
    assert!(join.ends_with("|Alice: has joined the chat."), "{join}");
}

#[tokio::test]
async fn empty_name_gets_anonymous_prefix() {
    let (_server, addr) = start_server().await;

    let (_client, welcome, join) = TestClient::join(addr, "").await;

    assert!(
        welcome.starts_with(&format!("Welcome, {ANONYMOUS_PREFIX}")),
        "{welcome}"
    );
    let name = join.split_once('|').unwrap().1;
    assert!(name.starts_with(ANONYMOUS_PREFIX), "{join}");
}

#[tokio::test]
async fn assigned_color_is_six_lowercase_hex_digits_in_band() {
    let (_server, addr) = start_server().await;

    for i in 0..8 {
        let (_client, _, join) = TestClient::join(addr, &format!("c{i}")).await;
        let digits = color_of(&join).strip_prefix('#').unwrap();
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')), "{digits}");
        for pair in [&digits[0..2], &digits[2..4], &digits[4..6]] {
            let channel = u8::from_str_radix(pair, 16).unwrap();
            assert!((50..=200).contains(&channel), "{digits}");
        }
    }
}

// =============================================================================
// Broadcasting
// =============================================================================

#[tokio::test]
async fn join_message_leave_sequence_without_quit_line() {
    let (_server, addr) = start_server().await;
    let (mut alice, _, _) = TestClient::join(addr, "Alice").await;
    let (mut bob, _, bob_join) = TestClient::join(addr, "Bob").await;
    let color = color_of(&bob_join).to_string();

    bob.send("hello").await;
    bob.send("/quit").await;

    assert_eq!(
        alice.recv().await.unwrap(),
        format!("{color}|Bob: has joined the chat.")
    );
    assert_eq!(alice.recv().await.unwrap(), format!("{color}|Bob: hello"));
    assert_eq!(
        alice.recv().await.unwrap(),
        format!("{color}|Bob: has left the chat.")
    );
    alice.assert_quiet().await;

    // Bob's own echo arrives, then his connection closes.
    assert_eq!(bob.recv().await.unwrap(), format!("{color}|Bob: hello"));
    assert_eq!(bob.recv().await, None);
}

#[tokio::test]
async fn every_member_including_sender_receives_broadcast() {
    let (_server, addr) = start_server().await;
    let (mut c0, _, _) = TestClient::join(addr, "c0").await;
    let (mut c1, _, _) = TestClient::join(addr, "c1").await;
    let (mut c2, _, _) = TestClient::join(addr, "c2").await;

    // Drain the join notices of later arrivals.
    c0.recv().await.unwrap();
    c0.recv().await.unwrap();
    c1.recv().await.unwrap();

    c0.send("ping from c0").await;

    let expected = c0.recv().await.unwrap();
    assert!(expected.ends_with("|c0: ping from c0"), "{expected}");
    assert_eq!(c1.recv().await.unwrap(), expected);
    assert_eq!(c2.recv().await.unwrap(), expected);
}

#[tokio::test]
async fn messages_from_one_sender_keep_their_order() {
    let (_server, addr) = start_server().await;
    let (mut reader, _, _) = TestClient::join(addr, "reader").await;
    let (mut writer, _, _) = TestClient::join(addr, "writer").await;
    reader.recv().await.unwrap(); // writer's join

    for i in 0..50 {
        writer.send(&format!("msg {i}")).await;
    }
    for i in 0..50 {
        let line = reader.recv().await.unwrap();
        assert!(line.ends_with(&format!("|writer: msg {i}")), "{line}");
    }
}

// =============================================================================
// Membership
// =============================================================================

#[tokio::test]
async fn registry_counts_only_named_live_connections() {
    let (server, addr) = start_server().await;

    let mut named = Vec::new();
    for i in 0..5 {
        named.push(TestClient::join(addr, &format!("n{i}")).await.0);
    }
    // Connected but still at the name prompt.
    let mut pending = Vec::new();
    for _ in 0..2 {
        let mut client = TestClient::connect(addr).await;
        assert_eq!(client.recv().await.as_deref(), Some(NAME_PROMPT));
        pending.push(client);
    }
    wait_for_members(&server, 5).await;

    for client in named.iter_mut().take(2) {
        client.send("/QUIT").await;
    }
    wait_for_members(&server, 3).await;

    pending[0].send("late").await;
    wait_for_members(&server, 4).await;
}

#[tokio::test]
async fn abrupt_disconnect_announces_departure_once() {
    let (server, addr) = start_server().await;
    let (mut alice, _, _) = TestClient::join(addr, "Alice").await;
    let (bob, _, bob_join) = TestClient::join(addr, "Bob").await;
    alice.recv().await.unwrap(); // Bob's join

    drop(bob);

    assert_eq!(
        alice.recv().await.unwrap(),
        format!("{}|Bob: has left the chat.", color_of(&bob_join))
    );
    alice.assert_quiet().await;
    wait_for_members(&server, 1).await;
}

#[tokio::test]
async fn failure_before_naming_is_announced_as_unknown_client() {
    let (server, addr) = start_server().await;
    let (mut alice, _, _) = TestClient::join(addr, "Alice").await;

    let mut broken = TestClient::connect(addr).await;
    assert_eq!(broken.recv().await.as_deref(), Some(NAME_PROMPT));
    broken.send_raw(b"\xff\xfe\n").await;

    assert_eq!(
        alice.recv().await.unwrap(),
        "#808080|An unknown client: has left the chat."
    );
    assert_eq!(server.registry().len().await, 1);
}

#[tokio::test]
async fn carriage_returns_are_stripped() {
    let (_server, addr) = start_server().await;
    let mut client = TestClient::connect(addr).await;
    client.recv().await.unwrap();

    client.send_raw(b"Dana\r\n").await;
    assert_eq!(client.recv().await.as_deref(), Some("Welcome, Dana!"));
    let join = client.recv().await.unwrap();
    assert!(join.ends_with("|Dana: has joined the chat."), "{join}");

    client.send_raw(b"hi there\r\n").await;
    let line = client.recv().await.unwrap();
    assert!(line.ends_with("|Dana: hi there"), "{line}");
}
