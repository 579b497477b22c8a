//! セッションコンテキスト
//!
//! アクティベーションごとに新しく作られ、そのセッションのダイヤ累計を所有する。
//! 置き換えられた古いハンドルが新しいセッションの累計に触れることはない。

use async_trait::async_trait;
use std::sync::Arc;

use crate::analytics::{display_nickname, AlertGiftSet, AlertHook, ComboAggregator, NoopAlertHook};
use crate::api::{FanoutEvent, FanoutSink};
use crate::io::GiftLog;
use crate::session::Target;
use crate::upstream::{GiftNotification, SessionEventHandler};

/// 全セッションで共有する出力先
#[derive(Clone)]
pub struct SessionServices {
    pub sink: Arc<dyn FanoutSink>,
    pub gift_log: Arc<GiftLog>,
    pub alerts: Arc<AlertGiftSet>,
    pub alert_hook: Arc<dyn AlertHook>,
}

impl SessionServices {
    /// ギフトログなし・アラートなしの構成
    pub fn new(sink: Arc<dyn FanoutSink>) -> Self {
        Self {
            sink,
            gift_log: Arc::new(GiftLog::disabled()),
            alerts: Arc::new(AlertGiftSet::default()),
            alert_hook: Arc::new(NoopAlertHook),
        }
    }
}

/// 1セッション分のイベントハンドラー
pub struct SessionContext {
    target: Target,
    aggregator: ComboAggregator,
    services: SessionServices,
}

impl SessionContext {
    /// 累計ゼロの新しいコンテキストを作成
    pub fn new(target: Target, services: SessionServices) -> Self {
        Self {
            target,
            aggregator: ComboAggregator::new(),
            services,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn total(&self) -> u64 {
        self.aggregator.total()
    }

    /// 累計リセットと監視開始を視聴者に通知
    pub async fn announce(&self) {
        self.services
            .sink
            .publish(FanoutEvent::Diamonds {
                total_diamonds: self.aggregator.total(),
            })
            .await;
        self.services
            .sink
            .publish(FanoutEvent::Listening {
                target: self.target.to_string(),
            })
            .await;
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("target", &self.target)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

#[async_trait]
impl SessionEventHandler for SessionContext {
    async fn on_connect(&mut self) {
        tracing::info!(session = %self.target, "🔗 Upstream connected");
        self.services
            .sink
            .publish(FanoutEvent::Connect {
                msg: "connected".to_string(),
            })
            .await;
    }

    async fn on_comment(&mut self, nickname: Option<String>, comment: String) {
        self.services
            .sink
            .publish(FanoutEvent::Comment {
                nickname: display_nickname(nickname),
                comment,
            })
            .await;
    }

    async fn on_gift(&mut self, gift: GiftNotification) {
        let Some(settled) = self.aggregator.apply(&gift) else {
            tracing::trace!(session = %self.target, gift_id = gift.gift_id, "Combo in progress");
            return;
        };

        let is_alert = self.services.alerts.contains(settled.gift_id());
        self.services.alert_hook.on_settled(&settled, is_alert);

        tracing::info!(
            session = %self.target,
            gift_id = settled.gift_id(),
            count = settled.count(),
            value = settled.value(),
            total = settled.total_diamonds(),
            is_alert,
            "🎁 Gift settled"
        );

        if let Err(e) = self.services.gift_log.append(&settled).await {
            tracing::warn!(session = %self.target, "Failed to append gift log: {}", e);
        }

        let total_diamonds = settled.total_diamonds();
        self.services.sink.publish(settled.into()).await;
        self.services
            .sink
            .publish(FanoutEvent::Diamonds { total_diamonds })
            .await;
    }

    async fn on_follow(&mut self, nickname: Option<String>) {
        self.services
            .sink
            .publish(FanoutEvent::Follow {
                nickname: display_nickname(nickname),
            })
            .await;
    }

    async fn on_join(&mut self, nickname: Option<String>) {
        self.services
            .sink
            .publish(FanoutEvent::Join {
                nickname: display_nickname(nickname),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{SettledGift, ANONYMOUS_NICKNAME};
    use crate::api::MemorySink;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHook {
        calls: Mutex<Vec<(u64, bool)>>,
    }

    impl AlertHook for RecordingHook {
        fn on_settled(&self, gift: &SettledGift, is_alert: bool) {
            self.calls.lock().push((gift.gift_id(), is_alert));
        }
    }

    fn gift(gift_id: u64, unit_value: u64, repeat_count: u64) -> GiftNotification {
        GiftNotification {
            gift_id,
            gift_name: Some("Rose".to_string()),
            unit_value: Some(unit_value),
            repeat_count: Some(repeat_count),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_announce_publishes_reset_then_listening() {
        let sink = Arc::new(MemorySink::new());
        let context = SessionContext::new(
            Target::parse("@alice").unwrap(),
            SessionServices::new(sink.clone()),
        );

        context.announce().await;

        assert_eq!(
            sink.events(),
            vec![
                FanoutEvent::Diamonds { total_diamonds: 0 },
                FanoutEvent::Listening {
                    target: "alice".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_gift_is_logged_published_and_totalled() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("gifts.jsonl");
        let sink = Arc::new(MemorySink::new());
        let hook = Arc::new(RecordingHook::default());
        let services = SessionServices {
            sink: sink.clone(),
            gift_log: Arc::new(GiftLog::new(&log_path)),
            alerts: Arc::new(AlertGiftSet::new([2])),
            alert_hook: hook.clone(),
        };
        let mut context = SessionContext::new(Target::parse("alice").unwrap(), services);

        context.on_gift(gift(1, 5, 3)).await;
        context.on_gift(gift(2, 1, 1)).await;

        assert_eq!(context.total(), 16);
        assert_eq!(*hook.calls.lock(), vec![(1, false), (2, true)]);

        let diamonds = sink.events_named("diamonds");
        assert_eq!(
            diamonds,
            vec![
                FanoutEvent::Diamonds { total_diamonds: 15 },
                FanoutEvent::Diamonds { total_diamonds: 16 },
            ]
        );
        assert_eq!(sink.events_named("gift").len(), 2);

        let logged: Vec<serde_json::Value> = GiftLog::new(&log_path).read_entries().unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0]["diamond"], 15);
        assert_eq!(logged[1]["total_diamonds"], 16);
    }

    #[tokio::test]
    async fn test_other_events_use_display_nickname() {
        let sink = Arc::new(MemorySink::new());
        let mut context = SessionContext::new(
            Target::parse("alice").unwrap(),
            SessionServices::new(sink.clone()),
        );

        context.on_connect().await;
        context.on_comment(None, "hello".to_string()).await;
        context.on_follow(Some("bob".to_string())).await;
        context.on_join(None).await;

        assert_eq!(
            sink.events(),
            vec![
                FanoutEvent::Connect {
                    msg: "connected".to_string()
                },
                FanoutEvent::Comment {
                    nickname: ANONYMOUS_NICKNAME.to_string(),
                    comment: "hello".to_string()
                },
                FanoutEvent::Follow {
                    nickname: "bob".to_string()
                },
                FanoutEvent::Join {
                    nickname: ANONYMOUS_NICKNAME.to_string()
                },
            ]
        );
    }
}
