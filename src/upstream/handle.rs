//! 上流セッションハンドル
//!
//! 1つの上流接続を包み、バックグラウンドの受信ループを所有する。
//! 停止は [`CancellationToken`] で要求し、[`SessionHandle::join`] で完了を待つ。
//! 受信ループが自分で終わったことは [`SessionHandle::finished`] で検知できる。

use async_trait::async_trait;
use futures_util::StreamExt;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{GiftNotification, UpstreamEvent};
use super::{EventStream, UpstreamError};
use crate::error::TeardownError;
use crate::session::Target;

/// セッションイベントハンドラートレイト
///
/// 受信ループはイベントの到着順に1つずつ呼び出す。
#[async_trait]
pub trait SessionEventHandler: Send {
    async fn on_connect(&mut self);

    async fn on_comment(&mut self, nickname: Option<String>, comment: String);

    async fn on_gift(&mut self, gift: GiftNotification);

    async fn on_follow(&mut self, nickname: Option<String>);

    async fn on_join(&mut self, _nickname: Option<String>) {}
}

/// イベントを対応するハンドラーメソッドへ振り分ける
pub async fn dispatch<H>(handler: &mut H, event: UpstreamEvent)
where
    H: SessionEventHandler + ?Sized,
{
    match event {
        UpstreamEvent::Connected => handler.on_connect().await,
        UpstreamEvent::Comment { nickname, comment } => handler.on_comment(nickname, comment).await,
        UpstreamEvent::Gift(gift) => handler.on_gift(gift).await,
        UpstreamEvent::Follow { nickname } => handler.on_follow(nickname).await,
        UpstreamEvent::Join { nickname } => handler.on_join(nickname).await,
    }
}

/// 開始前の接続とハンドラー
struct Pending {
    stream: EventStream,
    handler: Box<dyn SessionEventHandler>,
}

/// 上流セッションハンドル
pub struct SessionHandle {
    target: Target,
    cancel: CancellationToken,
    /// 受信タスクの終了時（パニック含む）にキャンセルされる
    done: CancellationToken,
    pending: Option<Pending>,
    task: Option<JoinHandle<Result<(), UpstreamError>>>,
}

impl SessionHandle {
    pub fn new(target: Target, stream: EventStream, handler: Box<dyn SessionEventHandler>) -> Self {
        Self {
            target,
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            pending: Some(Pending { stream, handler }),
            task: None,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// 受信ループを独立したタスクとして開始
    ///
    /// 2回目以降の呼び出しは何もしない。
    pub fn start(&mut self) {
        let Some(Pending { stream, handler }) = self.pending.take() else {
            tracing::debug!(session = %self.target, "Session handle already started");
            return;
        };

        let target = self.target.clone();
        let cancel = self.cancel.clone();
        let done = self.done.clone();
        self.task = Some(tokio::spawn(async move {
            let _done = done.drop_guard();
            receive_loop(target, stream, handler, cancel).await
        }));
    }

    /// 受信ループが終了したら完了するフューチャー
    ///
    /// ハンドルを借用しないので、ハンドルの所有者と並行して待てる。
    /// 開始されていないハンドルでは完了しない。
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let done = self.done.clone();
        let started = self.task.is_some();
        async move {
            if started {
                done.cancelled().await;
            } else {
                std::future::pending::<()>().await;
            }
        }
    }

    /// 受信ループに停止を要求（冪等）
    pub fn disconnect(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(session = %self.target, "🔌 Disconnect requested");
        }
        self.cancel.cancel();
    }

    /// 受信ループが終了済みかどうか
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// 受信ループの完了を待つ
    ///
    /// 開始されていないハンドルは即座に完了する。
    pub async fn join(mut self) -> Result<(), TeardownError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let target = self.target.to_string();
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TeardownError::Upstream { target, source }),
            Err(e) if e.is_panic() => Err(TeardownError::Panicked { target }),
            Err(_) => Err(TeardownError::Cancelled { target }),
        }
    }

    /// 停止を要求して完了まで待つ
    pub async fn shutdown(self) -> Result<(), TeardownError> {
        self.disconnect();
        self.join().await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("target", &self.target)
            .field("started", &self.pending.is_none())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn receive_loop(
    target: Target,
    mut stream: EventStream,
    mut handler: Box<dyn SessionEventHandler>,
    cancel: CancellationToken,
) -> Result<(), UpstreamError> {
    tracing::info!(session = %target, "🚀 Receive loop started");
    let mut received: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(session = %target, received, "🛑 Receive loop stopped by disconnect");
                return Ok(());
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                received += 1;
                tracing::trace!(session = %target, kind = event.kind(), "📨 Upstream event");
                dispatch(handler.as_mut(), event).await;
            }
            Some(Err(e)) => {
                tracing::warn!(session = %target, received, "❌ Upstream stream failed: {}", e);
                return Err(e);
            }
            None => {
                tracing::info!(session = %target, received, "📪 Upstream stream ended");
                return Ok(());
            }
        }
    }
}
