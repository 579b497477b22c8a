//! WebSocket API Server
//!
//! 視聴者にイベントをリアルタイムで配信し、オペレーターからの監視対象の受付も行う。
//!
//! ## 使用方法
//!
//! ```ignore
//! let queue = Arc::new(TargetQueue::new());
//! let server = WebSocketServer::new(8765, Arc::clone(&queue));
//! server.start().await?;
//!
//! // イベントをブロードキャスト
//! server.publish(FanoutEvent::Diamonds { total_diamonds: 0 }).await;
//!
//! server.stop().await;
//! ```
//!
//! ## WebSocket API
//!
//! クライアントは `ws://localhost:8765` に接続する。メッセージはJSON形式。
//!
//! - `{"type":"Listen","target":"@handle"}` で監視対象をキューに追加
//! - `{"type":"Status"}` で保留中のキュー長を取得

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;

use super::fanout::{FanoutEvent, FanoutSink};
use crate::session::TargetQueue;

/// WebSocket接続のID
type ClientId = u64;

/// サーバーからクライアントへのメッセージ
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// 配信イベント
    Event(FanoutEvent),
    /// 接続確認
    Connected { client_id: ClientId },
    /// サーバー情報
    ServerInfo {
        version: String,
        connected_clients: usize,
    },
    /// 監視対象の受付完了
    Listening { status: String, listening: String },
    /// キューの状態
    Status { queue_size: usize },
    /// エラー
    Error { message: String },
}

/// クライアントからサーバーへのメッセージ
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ping
    Ping,
    /// サーバー情報をリクエスト
    GetInfo,
    /// 監視対象を追加
    Listen { target: String },
    /// キューの状態をリクエスト
    Status,
}

/// WebSocketサーバーの状態
#[derive(Debug, Clone, PartialEq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// 希望ポートが使えないときに試す追加ポート数
const PORT_FALLBACK_RANGE: u16 = 9;

/// WebSocketサーバー
pub struct WebSocketServer {
    /// 希望ポート（開始ポート）
    preferred_port: u16,
    /// 実際に使用中のポート
    actual_port: Arc<RwLock<Option<u16>>>,
    state: Arc<RwLock<ServerState>>,
    clients: Arc<RwLock<HashMap<ClientId, SocketAddr>>>,
    message_tx: broadcast::Sender<ServerMessage>,
    next_client_id: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    queue: Arc<TargetQueue>,
}

impl WebSocketServer {
    /// 新しいWebSocketサーバーを作成
    ///
    /// `port`は希望するポート番号。サーバー起動時にこのポートが使用中の場合、
    /// 自動的に次のポート番号を試行する。
    pub fn new(port: u16, queue: Arc<TargetQueue>) -> Self {
        let (message_tx, _) = broadcast::channel(1024);
        Self {
            preferred_port: port,
            actual_port: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ServerState::Stopped)),
            clients: Arc::new(RwLock::new(HashMap::new())),
            message_tx,
            next_client_id: Arc::new(AtomicU64::new(1)),
            shutdown: Arc::new(AtomicBool::new(false)),
            queue,
        }
    }

    /// サーバーを起動
    ///
    /// 希望ポートが使用中の場合、自動的に次のポート（最大10ポート）を試行する。
    pub async fn start(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != ServerState::Stopped {
                tracing::warn!("WebSocket server is already in state: {:?}", *state);
                return Err(anyhow::anyhow!("Server is already running or starting"));
            }
            *state = ServerState::Starting;
        }

        self.shutdown.store(false, Ordering::SeqCst);

        let port_range_end = self.preferred_port.saturating_add(PORT_FALLBACK_RANGE);
        let (listener, bound_port) = self.try_bind_ports(self.preferred_port, port_range_end).await?;

        {
            let mut actual = self.actual_port.write().await;
            *actual = Some(bound_port);
        }

        let addr = format!("127.0.0.1:{}", bound_port);
        if self.preferred_port != 0 && bound_port != self.preferred_port {
            tracing::info!(
                "🌐 WebSocket server listening on ws://{} (preferred port {} was unavailable)",
                addr,
                self.preferred_port
            );
        } else {
            tracing::info!("🌐 WebSocket server listening on ws://{}", addr);
        }

        {
            let mut state = self.state.write().await;
            *state = ServerState::Running;
        }

        let connection = ConnectionContext {
            clients: Arc::clone(&self.clients),
            queue: Arc::clone(&self.queue),
        };
        let message_tx = self.message_tx.clone();
        let next_client_id = Arc::clone(&self.next_client_id);
        let shutdown = Arc::clone(&self.shutdown);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            while !shutdown.load(Ordering::SeqCst) {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let client_id = next_client_id.fetch_add(1, Ordering::SeqCst);
                                tracing::info!("📥 New WebSocket connection from {} (client_id: {})", addr, client_id);

                                let connection = connection.clone();
                                let message_rx = message_tx.subscribe();

                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, addr, client_id, connection, message_rx).await {
                                        tracing::warn!("WebSocket connection error for client {}: {}", client_id, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Failed to accept connection: {}", e);
                            }
                        }
                    }
                    _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                        // Check shutdown flag periodically
                    }
                }
            }

            let mut state_guard = state.write().await;
            *state_guard = ServerState::Stopped;
            tracing::info!("🛑 WebSocket server stopped");
        });

        Ok(())
    }

    /// 指定範囲のポートを順番に試行してバインド
    async fn try_bind_ports(
        &self,
        start_port: u16,
        end_port: u16,
    ) -> anyhow::Result<(TcpListener, u16)> {
        let mut last_error = None;

        for port in start_port..=end_port {
            let addr = format!("127.0.0.1:{}", port);
            tracing::debug!("Attempting to bind WebSocket server to {}", addr);

            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    // ポート0の場合はOSが割り当てたポートになる
                    let bound_port = listener.local_addr()?.port();
                    tracing::debug!("Successfully bound to 127.0.0.1:{}", bound_port);
                    return Ok((listener, bound_port));
                }
                Err(e) => {
                    tracing::debug!("Port {} unavailable: {}", port, e);
                    last_error = Some(e);
                }
            }
        }

        // すべてのポートが使用中
        let err = last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "No ports available")
        });
        tracing::error!(
            "❌ Failed to bind WebSocket server to any port in range {}-{}: {}",
            start_port,
            end_port,
            err
        );

        let mut state = self.state.write().await;
        *state = ServerState::Stopped;

        Err(anyhow::anyhow!(
            "Failed to bind to any port in range {}-{}: {}",
            start_port,
            end_port,
            err
        ))
    }

    /// サーバーを停止
    pub async fn stop(&self) {
        tracing::info!("🛑 Stopping WebSocket server...");

        {
            let mut state = self.state.write().await;
            *state = ServerState::Stopping;
        }

        self.shutdown.store(true, Ordering::SeqCst);

        {
            let mut actual = self.actual_port.write().await;
            *actual = None;
        }

        let mut clients = self.clients.write().await;
        clients.clear();
    }

    /// 接続中のクライアント数を取得
    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    /// サーバーの状態を取得
    pub async fn get_state(&self) -> ServerState {
        self.state.read().await.clone()
    }

    /// サーバーが実行中かどうか
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == ServerState::Running
    }

    /// 希望ポート番号を取得
    pub fn preferred_port(&self) -> u16 {
        self.preferred_port
    }

    /// 実際に使用中のポート番号を取得
    ///
    /// サーバーが起動していない場合はNoneを返す
    pub async fn actual_port(&self) -> Option<u16> {
        *self.actual_port.read().await
    }
}

#[async_trait]
impl FanoutSink for WebSocketServer {
    /// イベントを全クライアントにブロードキャスト
    async fn publish(&self, event: FanoutEvent) {
        let name = event.name();
        if let Err(e) = self.message_tx.send(ServerMessage::Event(event)) {
            tracing::trace!(event = name, "No active subscribers for broadcast: {}", e);
        }
    }
}

/// 接続ごとのタスクが共有する状態
#[derive(Clone)]
struct ConnectionContext {
    clients: Arc<RwLock<HashMap<ClientId, SocketAddr>>>,
    queue: Arc<TargetQueue>,
}

impl ConnectionContext {
    /// クライアントからの要求に対する応答を作る
    async fn respond(&self, client_id: ClientId, request: ClientMessage) -> Option<ServerMessage> {
        match request {
            ClientMessage::Ping => None,
            ClientMessage::GetInfo => {
                let clients_guard = self.clients.read().await;
                Some(ServerMessage::ServerInfo {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    connected_clients: clients_guard.len(),
                })
            }
            ClientMessage::Listen { target } => match self.queue.submit(&target) {
                Ok(target) => {
                    tracing::info!(client_id, session = %target, "🎯 Target accepted");
                    Some(ServerMessage::Listening {
                        status: "ok".to_string(),
                        listening: target.to_string(),
                    })
                }
                Err(e) => {
                    tracing::info!(client_id, "Target rejected: {}", e);
                    Some(ServerMessage::Error {
                        message: e.to_string(),
                    })
                }
            },
            ClientMessage::Status => Some(ServerMessage::Status {
                queue_size: self.queue.size(),
            }),
        }
    }
}

/// WebSocket接続を処理
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    client_id: ClientId,
    connection: ConnectionContext,
    mut message_rx: broadcast::Receiver<ServerMessage>,
) -> anyhow::Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    {
        let mut clients_guard = connection.clients.write().await;
        clients_guard.insert(client_id, addr);
    }

    let connected_msg = ServerMessage::Connected { client_id };
    let json = serde_json::to_string(&connected_msg)?;
    write.send(Message::Text(json)).await?;

    tracing::info!("✅ Client {} connected from {}", client_id, addr);

    let result: anyhow::Result<()> = async {
        loop {
            tokio::select! {
                // クライアントからのメッセージを処理
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::Ping) => {
                                    write.send(Message::Pong(vec![])).await?;
                                }
                                Ok(request) => {
                                    if let Some(reply) = connection.respond(client_id, request).await {
                                        let json = serde_json::to_string(&reply)?;
                                        write.send(Message::Text(json)).await?;
                                    }
                                }
                                Err(e) => {
                                    let reply = ServerMessage::Error {
                                        message: format!("invalid request: {}", e),
                                    };
                                    write.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("📤 Client {} disconnected", client_id);
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!("WebSocket error for client {}: {}", client_id, e);
                            break;
                        }
                        _ => {}
                    }
                }

                // ブロードキャストメッセージを受信
                msg = message_rx.recv() => {
                    match msg {
                        Ok(server_msg) => {
                            let json = serde_json::to_string(&server_msg)?;
                            if write.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Client {} lagged behind, {} events skipped", client_id, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    // クライアントを削除
    {
        let mut clients_guard = connection.clients.write().await;
        clients_guard.remove(&client_id);
    }

    result
}
