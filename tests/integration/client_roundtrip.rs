// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send
)]

//! Integration tests for the terminal client's connection against a real
//! server.

use std::time::Duration;

use linechat::connection::{self, Incoming, Outgoing};
use linechat::render::render_raw;
use linechat_proto::line::ChatLine;
use linechat_proto::protocol::{NAME_PROMPT, welcome};
use linechat_server::config::ServerConfig;
use linechat_server::server::ChatServer;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (ChatServer, String) {
    let (server, _events) = ChatServer::new(&ServerConfig::with_bind_addr("127.0.0.1:0"));
    let addr = server.start().await.expect("failed to start test server");
    (server, addr.to_string())
}

async fn recv(incoming: &mut Incoming) -> Option<String> {
    timeout(WAIT, incoming.next_line())
        .await
        .expect("timed out waiting for a line")
        .unwrap()
}

async fn join(addr: &str, name: &str) -> (Incoming, Outgoing) {
    let (mut incoming, mut outgoing) = connection::connect(addr).await.unwrap();
    assert_eq!(recv(&mut incoming).await.as_deref(), Some(NAME_PROMPT));
    outgoing.send_line(name).await.unwrap();
    assert_eq!(recv(&mut incoming).await, Some(welcome(name)));
    recv(&mut incoming).await.expect("own join notice");
    (incoming, outgoing)
}

#[tokio::test]
async fn client_sends_and_receives_attributed_lines() {
    let (_server, addr) = start_server().await;
    let (mut incoming, mut outgoing) = join(&addr, "alice").await;

    outgoing.send_line("hello there").await.unwrap();

    let echoed = recv(&mut incoming).await.unwrap();
    match ChatLine::parse(&echoed) {
        ChatLine::Attributed { name, body, .. } => {
            assert_eq!(name, "alice");
            assert_eq!(body, "hello there");
        }
        ChatLine::Plain(text) => panic!("expected an attributed line, got {text:?}"),
    }
    assert!(render_raw(&echoed).ends_with(" hello there"));
}

#[tokio::test]
async fn quit_ends_the_transcript() {
    let (_server, addr) = start_server().await;
    let (mut incoming, mut outgoing) = join(&addr, "bob").await;

    outgoing.send_line("/quit").await.unwrap();

    assert_eq!(recv(&mut incoming).await, None);
}

#[tokio::test]
async fn closing_stdin_side_leaves_the_room() {
    let (server, addr) = start_server().await;
    let (mut watcher, _watcher_out) = join(&addr, "watcher").await;
    let (mut incoming, mut outgoing) = join(&addr, "leaver").await;
    recv(&mut watcher).await.unwrap(); // leaver's join

    outgoing.finish().await.unwrap();

    assert_eq!(recv(&mut incoming).await, None);
    let notice = recv(&mut watcher).await.unwrap();
    assert!(notice.ends_with("|leaver: has left the chat."), "{notice}");
    assert_eq!(server.registry().len().await, 1);
}
