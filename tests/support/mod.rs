// Shared primitives for one-time server bootstrapping and WebSocket clients across tests.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use pacman_server::domain::WorldState;
use pacman_server::interface_adapters::protocol::WorldStateDto;
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Generous upper bound for anything that should happen within a few ticks.
pub const WAIT: Duration = Duration::from_secs(5);

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        // Local one-time slot where the server thread publishes its selected URL.
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                pacman_server::run(listener).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    // Strip the scheme so we can use host:port for raw TCP readiness checks.
    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

// Open a WebSocket to the shared server's socket route.
pub async fn connect() -> Client {
    let base_url = ensure_server();
    let ws_url = format!("{}/sockets", base_url.replacen("http://", "ws://", 1));
    let (client, _response) = connect_async(ws_url.as_str())
        .await
        .expect("websocket handshake");
    client
}

// Unique user id so tests sharing one server never see each other's players.
pub fn user_id(tag: &str) -> String {
    format!("{tag}-{}", uuid::Uuid::new_v4())
}

pub async fn send_text(client: &mut Client, text: String) {
    client
        .send(Message::Text(text.into()))
        .await
        .expect("send frame");
}

pub async fn send_location(client: &mut Client, user_id: &str, latitude: f64, longitude: f64) {
    let payload = serde_json::json!({
        "Action": "updateOwnLocation",
        "UserID": user_id,
        "Latitude": latitude,
        "Longitude": longitude,
    });
    send_text(client, payload.to_string()).await;
}

// Read snapshots until one satisfies `accept`, failing the test after `WAIT`.
pub async fn wait_for_snapshot<F>(client: &mut Client, mut accept: F) -> WorldState
where
    F: FnMut(&WorldState) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let message = client
                .next()
                .await
                .expect("connection open")
                .expect("frame readable");
            let Message::Text(text) = message else {
                continue;
            };
            let dto: WorldStateDto = serde_json::from_str(text.as_str()).expect("snapshot json");
            let world = WorldState::from(dto);
            if accept(&world) {
                break world;
            }
        }
    })
    .await
    .expect("expected snapshot did not arrive in time")
}

// Read until the server closes the connection; returns the close frame if one was sent.
pub async fn wait_for_close(client: &mut Client) -> Option<CloseFrame> {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(frame))) => break frame,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break None,
            }
        }
    })
    .await
    .expect("server did not close the connection in time")
}
