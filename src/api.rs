pub mod fanout; // 視聴者向けイベント配信
pub mod websocket_server; // WebSocket配信サーバーと受付

pub use fanout::{FanoutEvent, FanoutSink, MemorySink};
pub use websocket_server::{ClientMessage, ServerMessage, ServerState, WebSocketServer};
