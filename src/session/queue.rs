//! 監視対象キュー
//!
//! オペレーターからの受付とスーパーバイザーを切り離す無制限FIFO。

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

use super::target::{InvalidTargetError, Target};

/// 保留中ターゲットのキュー
#[derive(Debug, Default)]
pub struct TargetQueue {
    pending: Mutex<VecDeque<Target>>,
    available: Notify,
}

impl TargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生の入力を正規化してキューに追加
    pub fn submit(&self, raw: &str) -> Result<Target, InvalidTargetError> {
        let target = Target::parse(raw)?;
        self.push(target.clone());
        Ok(target)
    }

    /// 正規化済みのターゲットを追加
    pub fn push(&self, target: Target) {
        let depth = {
            let mut pending = self.pending.lock();
            pending.push_back(target.clone());
            pending.len()
        };
        tracing::debug!(session = %target, depth, "📥 Target queued");
        self.available.notify_one();
    }

    /// 保留中の件数（参考値）
    pub fn size(&self) -> usize {
        self.pending.lock().len()
    }

    /// 次のターゲットが来るまで待機して取り出す
    ///
    /// 消費者は1つ（スーパーバイザー）を想定している。
    pub async fn take(&self) -> Target {
        loop {
            let next = self.pending.lock().pop_front();
            if let Some(target) = next {
                return target;
            }
            self.available.notified().await;
        }
    }
}
