//! 視聴者向けファンアウト
//!
//! 名前付きイベントとペイロードを接続中の全視聴者へ配信する。

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Notify;

use crate::analytics::{ComboGift, SettledGift, SingleGift};

/// 配信イベント
///
/// JSONでは `{"event": <名前>, "data": <ペイロード>}` になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum FanoutEvent {
    Diamonds { total_diamonds: u64 },
    Listening { target: String },
    Connect { msg: String },
    Comment { nickname: String, comment: String },
    ComboGift(ComboGift),
    Gift(SingleGift),
    Follow { nickname: String },
    Join { nickname: String },
}

impl FanoutEvent {
    /// イベント名
    pub fn name(&self) -> &'static str {
        match self {
            FanoutEvent::Diamonds { .. } => "diamonds",
            FanoutEvent::Listening { .. } => "listening",
            FanoutEvent::Connect { .. } => "connect",
            FanoutEvent::Comment { .. } => "comment",
            FanoutEvent::ComboGift(_) => "combo_gift",
            FanoutEvent::Gift(_) => "gift",
            FanoutEvent::Follow { .. } => "follow",
            FanoutEvent::Join { .. } => "join",
        }
    }

    /// ペイロード部分のみ
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut value| value.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<SettledGift> for FanoutEvent {
    fn from(gift: SettledGift) -> Self {
        match gift {
            SettledGift::Combo(gift) => FanoutEvent::ComboGift(gift),
            SettledGift::Single(gift) => FanoutEvent::Gift(gift),
        }
    }
}

/// ファンアウト先トレイト
///
/// 配信の失敗は実装側でログに残し、呼び出し元には返さない。
#[async_trait]
pub trait FanoutSink: Send + Sync {
    async fn publish(&self, event: FanoutEvent);
}

/// 配信イベントをメモリに溜めるシンク
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<FanoutEvent>>,
    published: Notify,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに配信されたイベント
    pub fn events(&self) -> Vec<FanoutEvent> {
        self.events.lock().clone()
    }

    /// 指定した名前のイベントだけ
    pub fn events_named(&self, name: &str) -> Vec<FanoutEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name() == name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// 条件を満たすイベントが配信されるまで待つ
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<FanoutEvent>
    where
        F: Fn(&FanoutEvent) -> bool,
    {
        let wait = async {
            loop {
                let notified = self.published.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let found = self.events.lock().iter().find(|e| predicate(e)).cloned();
                if let Some(event) = found {
                    return event;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.ok()
    }
}

#[async_trait]
impl FanoutSink for MemorySink {
    async fn publish(&self, event: FanoutEvent) {
        tracing::trace!(event = event.name(), "Recorded fan-out event");
        self.events.lock().push(event);
        self.published.notify_waiters();
    }
}
