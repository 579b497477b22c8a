//! 上流ライブイベントプロバイダー
//!
//! プロバイダー本体はブラックボックスとして扱い、スーパーバイザーが必要とする
//! 解決（resolve）と接続（connect）だけをトレイトで定義する。

pub mod events; // 生イベント
pub mod handle; // 1接続分のセッションハンドル
pub mod replay; // NDJSON記録の再生プロバイダー

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::session::Target;

pub use events::{GiftNotification, UpstreamEvent};
pub use handle::{SessionEventHandler, SessionHandle};
pub use replay::ReplayProvider;

/// 上流接続のイベントストリーム
pub type EventStream = BoxStream<'static, Result<UpstreamEvent, UpstreamError>>;

#[derive(Error, Debug)]
pub enum UpstreamError {
    /// 配信がまだ始まっていない（一時的な状態）
    #[error("target '{0}' is currently offline")]
    Offline(String),

    #[error("target '{0}' was not found")]
    NotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse upstream data: {0}")]
    Parse(#[from] crate::io::ndjson::NdjsonError),
}

impl UpstreamError {
    /// 再試行で解消しうるエラーかどうか
    pub fn is_offline(&self) -> bool {
        matches!(self, UpstreamError::Offline(_))
    }
}

/// 接続可能な配信ルームへの参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRef {
    pub target: Target,
    pub room_id: String,
}

/// 上流プロバイダートレイト
#[async_trait]
pub trait LiveProvider: Send + Sync {
    /// ターゲットを接続可能なルームに解決する
    ///
    /// 配信前のターゲットには [`UpstreamError::Offline`] を返す。
    async fn resolve(&self, target: &Target) -> Result<RoomRef, UpstreamError>;

    /// ルームに接続してイベントストリームを得る
    async fn connect(&self, room: &RoomRef) -> Result<EventStream, UpstreamError>;

    /// プロバイダー名を取得
    fn name(&self) -> &'static str;
}
