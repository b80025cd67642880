//! Mock market-channel WebSocket server for integration tests.
//!
//! Accepts connections, records received messages and per-connection accept
//! times, optionally replies to the first message of every connection (the
//! subscribe) with a canned frame, and can drop every connection right after
//! the subscribe to exercise the reconnect path.

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What a connection does after receiving its first message.
#[derive(Clone)]
enum OnSubscribe {
    /// Keep the connection open silently.
    Hold,
    /// Send one canned frame, then keep the connection open.
    Reply(String),
    /// Close the connection immediately.
    Drop,
}

pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<Vec<Instant>>>,
}

impl MockWsServer {
    /// Start a silent mock server on an available port.
    pub async fn start() -> Self {
        Self::start_inner(OnSubscribe::Hold).await
    }

    /// Start a mock server that answers the first message of every
    /// connection with `reply`.
    pub async fn start_with_reply(reply: String) -> Self {
        Self::start_inner(OnSubscribe::Reply(reply)).await
    }

    /// Start a mock server that completes the handshake, consumes the
    /// subscribe, then drops the connection.
    pub async fn start_dropping() -> Self {
        Self::start_inner(OnSubscribe::Drop).await
    }

    async fn start_inner(on_subscribe: OnSubscribe) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let on_subscribe = on_subscribe.clone();
                        tokio::spawn(handle_connection(stream, messages, connections, on_subscribe));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        self.connections.lock().await.len() as u32
    }

    /// Accept time of every connection, in order.
    pub async fn connection_times(&self) -> Vec<Instant> {
        self.connections.lock().await.clone()
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<Vec<Instant>>>,
    on_subscribe: OnSubscribe,
) {
    connections.lock().await.push(Instant::now());

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut first_message = true;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                {
                    let mut msgs = messages.lock().await;
                    msgs.push_back(text.clone());
                }

                if first_message {
                    first_message = false;
                    match &on_subscribe {
                        OnSubscribe::Hold => {}
                        OnSubscribe::Reply(frame) => {
                            let _ = write.send(Message::Text(frame.clone())).await;
                        }
                        OnSubscribe::Drop => return,
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}
