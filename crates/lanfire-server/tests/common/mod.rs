use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use lanfire_core::map::MapGeometry;
use lanfire_core::net::messages::{ClientMessage, ServerMessage};
use lanfire_core::net::protocol::{decode_server_message, encode_client_message};
use lanfire_core::test_helpers::open_map;
use lanfire_core::weapon::WeaponTable;
use lanfire_server::build_app;
use lanfire_server::config::ServerConfig;
use lanfire_sim::Simulation;
use lanfire_sim::config::SimConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server on the open test map.
    pub async fn new() -> Self {
        Self::from_parts(ServerConfig::default(), open_map()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        Self::from_parts(config, open_map()).await
    }

    pub async fn from_parts(config: ServerConfig, map: MapGeometry) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sim = Simulation::with_seed(SimConfig::default(), map, WeaponTable::default(), 11);
        let (app, _state, _game) = build_app(config, sim);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a raw text frame.
pub async fn ws_send_text(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.into())).await.unwrap();
}

pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    ws_send_text(stream, &encoded).await;
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_text(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let text = ws_read_text(stream).await;
    decode_server_message(&text).unwrap()
}

/// Skip frames until one of the given kind arrives.
pub async fn ws_read_kind(stream: &mut WsStream, kind: &str) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if msg.kind() == kind {
            return msg;
        }
    }
}

/// Collect every frame of `kind` arriving within `window_ms`.
pub async fn ws_collect_kind(stream: &mut WsStream, kind: &str, window_ms: u64) -> Vec<ServerMessage> {
    let mut found = Vec::new();
    let _ = tokio::time::timeout(Duration::from_millis(window_ms), async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if msg.kind() == kind {
                found.push(msg);
            }
        }
    })
    .await;
    found
}

/// Connect and consume the welcome. Returns the stream and the player id.
pub async fn ws_join(server: &TestServer) -> (WsStream, lanfire_core::player::PlayerId) {
    let mut stream = ws_connect(&server.ws_url()).await;
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::Welcome(welcome) => (stream, welcome.id),
        other => panic!("Expected welcome, got: {other:?}"),
    }
}
