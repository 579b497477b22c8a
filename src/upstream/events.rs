//! 上流プロバイダーから届く生イベント

use serde::{Deserialize, Serialize};

/// ギフト通知（生データ）
///
/// コンボ対応ギフトは、コンボ継続中に `in_progress = true` の通知が繰り返し届き、
/// 最後に `in_progress = false` の通知で確定する。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GiftNotification {
    pub gift_id: u64,
    #[serde(default)]
    pub gift_name: Option<String>,
    /// 1個あたりのダイヤ数
    #[serde(default)]
    pub unit_value: Option<u64>,
    #[serde(default)]
    pub repeat_count: Option<u64>,
    #[serde(default)]
    pub combo_capable: bool,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// 上流イベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamEvent {
    Connected,
    Comment {
        #[serde(default)]
        nickname: Option<String>,
        comment: String,
    },
    Gift(GiftNotification),
    Follow {
        #[serde(default)]
        nickname: Option<String>,
    },
    Join {
        #[serde(default)]
        nickname: Option<String>,
    },
}

impl UpstreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamEvent::Connected => "connected",
            UpstreamEvent::Comment { .. } => "comment",
            UpstreamEvent::Gift(_) => "gift",
            UpstreamEvent::Follow { .. } => "follow",
            UpstreamEvent::Join { .. } => "join",
        }
    }
}
