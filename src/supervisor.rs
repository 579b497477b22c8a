//! セッションスーパーバイザー
//!
//! キューから監視対象を1つずつ取り出し、常に高々1つの上流接続だけを保つ制御ループ。
//!
//! 1件ごとの流れ:
//! 1. 前のハンドルに切断を要求し、終了を待つ（エラーはログに残して捨てる）
//! 2. 新しい [`SessionContext`] を作り、累計ゼロと監視開始を通知
//! 3. ターゲットを解決（オフラインの間は [`BackoffPolicy`] の間隔で再試行）
//! 4. 接続してハンドルを開始し、現在のセッションとして保持
//!
//! 上流ストリームが途中で終わったり失敗したりした場合は、そのターゲットを破棄して Idle に戻る。

pub mod backoff; // 解決リトライの待ち時間
pub mod context; // セッションごとのイベントハンドラー

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::analytics::{AlertGiftSet, AlertHook};
use crate::api::FanoutSink;
use crate::io::GiftLog;
use crate::session::{SessionState, Target, TargetQueue};
use crate::upstream::{LiveProvider, RoomRef, SessionHandle, UpstreamError};

pub use backoff::BackoffPolicy;
pub use context::{SessionContext, SessionServices};

/// 1回のアクティベーションの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Started,
    Shutdown,
}

/// セッションスーパーバイザー
pub struct SessionSupervisor {
    queue: Arc<TargetQueue>,
    provider: Arc<dyn LiveProvider>,
    services: SessionServices,
    backoff: BackoffPolicy,
    state_tx: watch::Sender<SessionState>,
    current: Option<SessionHandle>,
}

impl SessionSupervisor {
    pub fn new(
        queue: Arc<TargetQueue>,
        provider: Arc<dyn LiveProvider>,
        sink: Arc<dyn FanoutSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            queue,
            provider,
            services: SessionServices::new(sink),
            backoff: BackoffPolicy::default(),
            state_tx,
            current: None,
        }
    }

    pub fn with_gift_log(mut self, gift_log: Arc<GiftLog>) -> Self {
        self.services.gift_log = gift_log;
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertGiftSet>) -> Self {
        self.services.alerts = alerts;
        self
    }

    pub fn with_alert_hook(mut self, alert_hook: Arc<dyn AlertHook>) -> Self {
        self.services.alert_hook = alert_hook;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// 状態の変化を購読する
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// 現在アクティブなターゲット
    pub fn current_target(&self) -> Option<&Target> {
        self.current.as_ref().map(SessionHandle::target)
    }

    /// 制御ループを実行
    ///
    /// `shutdown` がキャンセルされるまで戻らない。戻る前に現在のセッションを停止する。
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(provider = self.provider.name(), "🎬 Session supervisor started");

        loop {
            let current_finished = self.current.as_ref().map(SessionHandle::finished);
            let target = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = async {
                    match current_finished {
                        Some(finished) => finished.await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.retire_current().await;
                    continue;
                }
                target = self.queue.take() => target,
            };

            tracing::info!(session = %target, pending = self.queue.size(), "📥 Target dequeued");

            match self.activate(target.clone(), &shutdown).await {
                Ok(Activation::Started) => {}
                Ok(Activation::Shutdown) => break,
                Err(e) => {
                    tracing::warn!(session = %target, "❌ Abandoning target: {}", e);
                    self.set_state(SessionState::Idle);
                }
            }
        }

        self.teardown_current().await;
        self.set_state(SessionState::Idle);
        tracing::info!("🛑 Session supervisor stopped");
    }

    async fn activate(
        &mut self,
        target: Target,
        shutdown: &CancellationToken,
    ) -> Result<Activation, UpstreamError> {
        self.teardown_current().await;

        let context = SessionContext::new(target.clone(), self.services.clone());
        context.announce().await;
        self.set_state(SessionState::Resolving(target.clone()));

        let resolved =
            Self::resolve_with_retry(self.provider.as_ref(), self.backoff, &target, shutdown).await?;
        let Some(room) = resolved else {
            return Ok(Activation::Shutdown);
        };

        let stream = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Activation::Shutdown),
            stream = self.provider.connect(&room) => stream?,
        };

        let mut handle = SessionHandle::new(target.clone(), stream, Box::new(context));
        handle.start();
        self.current = Some(handle);
        self.set_state(SessionState::Active(target.clone()));

        tracing::info!(session = %target, room = %room.room_id, "✅ Session active");
        Ok(Activation::Started)
    }

    /// オフラインの間は再試行し続ける
    ///
    /// シャットダウンされた場合は `None`。後続のターゲットが来ても待ちは中断しない。
    async fn resolve_with_retry(
        provider: &dyn LiveProvider,
        backoff: BackoffPolicy,
        target: &Target,
        shutdown: &CancellationToken,
    ) -> Result<Option<RoomRef>, UpstreamError> {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(None),
                result = provider.resolve(target) => result,
            };

            match result {
                Ok(room) => return Ok(Some(room)),
                Err(e) if e.is_offline() => {
                    let delay = backoff.next(attempt);
                    attempt = attempt.saturating_add(1);
                    tracing::info!(
                        session = %target,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "⏳ Target offline, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 現在のセッションを停止し、終了まで待つ
    async fn teardown_current(&mut self) {
        let Some(handle) = self.current.take() else {
            return;
        };

        let target = handle.target().clone();
        self.set_state(SessionState::TearingDown(target.clone()));

        match handle.shutdown().await {
            Ok(()) => tracing::info!(session = %target, "🔌 Previous session torn down"),
            Err(e) => tracing::warn!(session = %target, "Teardown error ignored: {}", e),
        }

        self.set_state(SessionState::Idle);
    }

    /// 自分で終了した受信ループを回収する
    async fn retire_current(&mut self) {
        let Some(handle) = self.current.take() else {
            return;
        };

        let target = handle.target().clone();
        match handle.join().await {
            Ok(()) => tracing::info!(session = %target, "📪 Upstream session ended"),
            Err(e) => tracing::warn!(session = %target, "❌ Abandoning target: {}", e),
        }

        self.set_state(SessionState::Idle);
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(state = state.label(), "Session state changed");
        self.state_tx.send_replace(state);
    }
}

impl std::fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("provider", &self.provider.name())
            .field("backoff", &self.backoff)
            .field("state", &*self.state_tx.borrow())
            .field("current", &self.current)
            .finish()
    }
}
