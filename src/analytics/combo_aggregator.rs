//! ギフトコンボ集計
//!
//! 上流から連続で届くギフト通知を、確定したギフトイベントとダイヤ累計に変換する。
//! コンボ継続中の通知は捨て、コンボ確定時の通知1つにつき1イベントだけを出す。

use serde::{Deserialize, Serialize};

use crate::upstream::GiftNotification;

/// 送信者名が取れないときの表示名
pub const ANONYMOUS_NICKNAME: &str = "匿名用户";

/// ギフト名が取れないときの表示名
pub fn fallback_gift_name(gift_id: u64) -> String {
    format!("ID:{}", gift_id)
}

/// 送信者名を表示用に解決
pub fn display_nickname(nickname: Option<String>) -> String {
    nickname.unwrap_or_else(|| ANONYMOUS_NICKNAME.to_string())
}

/// コンボ確定ギフト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboGift {
    pub nickname: String,
    pub gift_id: u64,
    pub gift_name: String,
    pub combo_count: u64,
    pub combo_diamond: u64,
    pub total_diamonds: u64,
}

/// 単発ギフト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleGift {
    pub nickname: String,
    pub gift_id: u64,
    pub gift_name: String,
    pub count: u64,
    pub diamond: u64,
    pub total_diamonds: u64,
}

/// 確定したギフトイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettledGift {
    Combo(ComboGift),
    Single(SingleGift),
}

impl SettledGift {
    pub fn gift_id(&self) -> u64 {
        match self {
            SettledGift::Combo(gift) => gift.gift_id,
            SettledGift::Single(gift) => gift.gift_id,
        }
    }

    pub fn nickname(&self) -> &str {
        match self {
            SettledGift::Combo(gift) => &gift.nickname,
            SettledGift::Single(gift) => &gift.nickname,
        }
    }

    /// 個数
    pub fn count(&self) -> u64 {
        match self {
            SettledGift::Combo(gift) => gift.combo_count,
            SettledGift::Single(gift) => gift.count,
        }
    }

    /// このイベントで加算されたダイヤ数
    pub fn value(&self) -> u64 {
        match self {
            SettledGift::Combo(gift) => gift.combo_diamond,
            SettledGift::Single(gift) => gift.diamond,
        }
    }

    /// 確定時点の累計
    pub fn total_diamonds(&self) -> u64 {
        match self {
            SettledGift::Combo(gift) => gift.total_diamonds,
            SettledGift::Single(gift) => gift.total_diamonds,
        }
    }
}

/// 1件の通知を処理する純粋関数
///
/// 戻り値は確定イベント（なければ `None`）と新しい累計。
/// 累計は `total + value` にしかならず、減ることはない。
pub fn settle(notification: &GiftNotification, total: u64) -> (Option<SettledGift>, u64) {
    if notification.combo_capable && notification.in_progress {
        return (None, total);
    }

    let count = match notification.repeat_count {
        Some(count) if count > 0 => count,
        _ => 1,
    };
    let value = notification.unit_value.unwrap_or(0).saturating_mul(count);
    let total = total.saturating_add(value);

    let nickname = display_nickname(notification.nickname.clone());
    let gift_id = notification.gift_id;
    let gift_name = notification
        .gift_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback_gift_name(gift_id));

    let settled = if notification.combo_capable {
        SettledGift::Combo(ComboGift {
            nickname,
            gift_id,
            gift_name,
            combo_count: count,
            combo_diamond: value,
            total_diamonds: total,
        })
    } else {
        SettledGift::Single(SingleGift {
            nickname,
            gift_id,
            gift_name,
            count,
            diamond: value,
            total_diamonds: total,
        })
    };

    (Some(settled), total)
}

/// セッション単位の集計器
///
/// 累計はセッションごとに新しく作られ、ゼロから始まる。
#[derive(Debug, Default)]
pub struct ComboAggregator {
    total: u64,
    settled_count: u64,
}

impl ComboAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// これまでに確定したイベント数
    pub fn settled_count(&self) -> u64 {
        self.settled_count
    }

    pub fn apply(&mut self, notification: &GiftNotification) -> Option<SettledGift> {
        let (settled, total) = settle(notification, self.total);
        self.total = total;
        if settled.is_some() {
            self.settled_count += 1;
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(in_progress: bool, repeat_count: u64, unit_value: u64) -> GiftNotification {
        GiftNotification {
            gift_id: 5655,
            gift_name: Some("Rose".to_string()),
            unit_value: Some(unit_value),
            repeat_count: Some(repeat_count),
            combo_capable: true,
            in_progress,
            nickname: Some("alice".to_string()),
        }
    }

    #[test]
    fn test_single_gift() {
        let notification = GiftNotification {
            gift_id: 1,
            gift_name: Some("Lion".to_string()),
            unit_value: Some(5),
            repeat_count: Some(3),
            combo_capable: false,
            in_progress: false,
            nickname: Some("bob".to_string()),
        };

        let (settled, total) = settle(&notification, 0);
        assert_eq!(total, 15);
        assert_eq!(
            settled,
            Some(SettledGift::Single(SingleGift {
                nickname: "bob".to_string(),
                gift_id: 1,
                gift_name: "Lion".to_string(),
                count: 3,
                diamond: 15,
                total_diamonds: 15,
            }))
        );
    }

    #[test]
    fn test_in_progress_combo_emits_nothing() {
        let (settled, total) = settle(&combo(true, 4, 2), 10);
        assert!(settled.is_none());
        assert_eq!(total, 10);
    }

    #[test]
    fn test_combo_window_settles_once() {
        let mut aggregator = ComboAggregator::new();
        let window = [combo(true, 1, 2), combo(true, 3, 2), combo(true, 6, 2), combo(false, 7, 2)];

        let settled: Vec<SettledGift> = window.iter().filter_map(|n| aggregator.apply(n)).collect();

        assert_eq!(settled.len(), 1);
        match &settled[0] {
            SettledGift::Combo(gift) => {
                assert_eq!(gift.combo_count, 7);
                assert_eq!(gift.combo_diamond, 14);
                assert_eq!(gift.total_diamonds, 14);
            }
            other => panic!("Expected combo gift, got: {:?}", other),
        }
        assert_eq!(aggregator.total(), 14);
        assert_eq!(aggregator.settled_count(), 1);
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let notification = GiftNotification {
            gift_id: 42,
            ..Default::default()
        };

        let (settled, total) = settle(&notification, 7);
        let settled = settled.unwrap();
        assert_eq!(total, 7);
        assert_eq!(settled.nickname(), ANONYMOUS_NICKNAME);
        assert_eq!(settled.count(), 1);
        assert_eq!(settled.value(), 0);
        match settled {
            SettledGift::Single(gift) => assert_eq!(gift.gift_name, "ID:42"),
            other => panic!("Expected single gift, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_repeat_count_counts_as_one() {
        let (settled, total) = settle(&combo(false, 0, 9), 1);
        assert_eq!(settled.unwrap().count(), 1);
        assert_eq!(total, 10);
    }

    #[test]
    fn test_running_total_is_sum_of_values() {
        let mut aggregator = ComboAggregator::new();
        let values = [3u64, 0, 12, 5];
        for value in values {
            aggregator.apply(&GiftNotification {
                gift_id: 1,
                unit_value: Some(value),
                ..Default::default()
            });
        }
        assert_eq!(aggregator.total(), values.iter().sum::<u64>());
        assert_eq!(aggregator.settled_count(), 4);
    }

    #[test]
    fn test_total_saturates() {
        let (settled, total) = settle(&combo(false, 2, u64::MAX), 1);
        assert_eq!(total, u64::MAX);
        assert_eq!(settled.unwrap().total_diamonds(), u64::MAX);
    }

    #[test]
    fn test_payload_field_names() {
        let (single, _) = settle(
            &GiftNotification {
                gift_id: 1,
                unit_value: Some(1),
                ..Default::default()
            },
            0,
        );
        let json = serde_json::to_value(single.unwrap()).unwrap();
        for field in ["nickname", "gift_id", "gift_name", "count", "diamond", "total_diamonds"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }

        let (combo_gift, _) = settle(&combo(false, 2, 1), 0);
        let json = serde_json::to_value(combo_gift.unwrap()).unwrap();
        assert_eq!(json["combo_count"], 2);
        assert_eq!(json["combo_diamond"], 2);
    }
}
