//! End-to-end tests: real server, real WebSocket clients.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use pairhub::api;
use pairhub::app_state::AppState;
use pairhub::config::ServerConfig;
use pairhub::hub::{Hub, RegistrySnapshot};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

async fn start_server(config: ServerConfig) -> (SocketAddr, Hub) {
    let (hub, _task) = Hub::spawn(config.hub_command_capacity);
    let state = AppState {
        hub: hub.clone(),
        config: Arc::new(config),
    };
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, api::app(state)).await;
    });
    (addr, hub)
}

async fn connect(addr: SocketAddr, pair: &str) -> Client {
    let url = format!("ws://{addr}/ws?pair={pair}");
    let Ok((ws, _)) = tokio_tungstenite::connect_async(url).await else {
        panic!("ws connect failed");
    };
    ws
}

/// Waits until the hub reports `clients` registered clients.
async fn wait_for_clients(hub: &Hub, clients: usize) -> RegistrySnapshot {
    let polled = timeout(WAIT, async {
        loop {
            if let Some(snapshot) = hub.snapshot().await
                && snapshot.clients == clients
            {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    let Ok(snapshot) = polled else {
        panic!("hub never reached {clients} clients");
    };
    snapshot
}

async fn recv_text(ws: &mut Client) -> String {
    loop {
        let Ok(next) = timeout(WAIT, ws.next()).await else {
            panic!("timed out waiting for a message");
        };
        match next {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) = timeout(Duration::from_millis(200), ws.next()).await {
        panic!("unexpected message: {}", text.as_str());
    }
}

#[tokio::test]
async fn pair_messages_stay_in_their_group() {
    let (addr, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(addr, "x").await;
    let mut b = connect(addr, "x").await;
    let mut c = connect(addr, "").await;
    let snapshot = wait_for_clients(&hub, 3).await;
    assert_eq!(snapshot.pairs.get("x"), Some(&2));

    let hello = r#"{"type":"pair","data":"hello"}"#;
    tokio_test::assert_ok!(a.send(Message::text(hello)).await);

    assert_eq!(recv_text(&mut a).await, hello);
    assert_eq!(recv_text(&mut b).await, hello);
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn plain_messages_reach_everyone() {
    let (addr, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(addr, "x").await;
    let mut c = connect(addr, "").await;
    wait_for_clients(&hub, 2).await;

    tokio_test::assert_ok!(c.send(Message::text("hi-all")).await);
    assert_eq!(recv_text(&mut a).await, "hi-all");
    assert_eq!(recv_text(&mut c).await, "hi-all");
}

#[tokio::test]
async fn rest_broadcast_reaches_websocket_clients() {
    let (addr, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(addr, "x").await;
    let mut c = connect(addr, "").await;
    wait_for_clients(&hub, 2).await;

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("http://{addr}/api/v1/pairs/x/broadcast"))
        .json(&serde_json::json!({ "message": "pair-only" }))
        .send()
        .await;
    let Ok(resp) = resp else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    assert_eq!(recv_text(&mut a).await, "pair-only");
    assert_silent(&mut c).await;

    let resp = http
        .post(format!("http://{addr}/api/v1/broadcast"))
        .json(&serde_json::json!({ "message": "everyone" }))
        .send()
        .await;
    let Ok(resp) = resp else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    assert_eq!(recv_text(&mut a).await, "everyone");
    assert_eq!(recv_text(&mut c).await, "everyone");
}

#[tokio::test]
async fn closing_a_socket_unregisters_and_prunes_group() {
    let (addr, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(addr, "x").await;
    let mut b = connect(addr, "x").await;
    let _c = connect(addr, "").await;
    wait_for_clients(&hub, 3).await;

    tokio_test::assert_ok!(b.close(None).await);
    let snapshot = wait_for_clients(&hub, 2).await;
    assert_eq!(snapshot.pairs.get("x"), Some(&1));

    tokio_test::assert_ok!(a.close(None).await);
    let snapshot = wait_for_clients(&hub, 1).await;
    assert!(snapshot.pairs.is_empty());
}

#[tokio::test]
async fn idle_client_is_dropped_after_read_timeout() {
    let config = ServerConfig {
        read_timeout: Duration::from_millis(300),
        ping_interval: Duration::from_secs(60),
        ..ServerConfig::default()
    };
    let (addr, hub) = start_server(config).await;
    let _idle = connect(addr, "x").await;
    wait_for_clients(&hub, 1).await;
    let snapshot = wait_for_clients(&hub, 0).await;
    assert!(snapshot.pairs.is_empty());
}

#[tokio::test]
async fn hub_shutdown_closes_sockets() {
    let (addr, hub) = start_server(ServerConfig::default()).await;
    let mut a = connect(addr, "x").await;
    wait_for_clients(&hub, 1).await;

    hub.shutdown().await;
    let closed = timeout(WAIT, async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
