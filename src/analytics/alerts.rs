//! アラート対象ギフト
//!
//! 起動時に一度だけ読み込むギフトIDの集合と、確定ギフトごとに呼ばれるフック。
//! 現状、集合への所属はログ出力や配信の可否に影響しない。

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::combo_aggregator::SettledGift;
use crate::config::ConfigLoadError;

#[derive(Debug, Deserialize)]
struct AlertGiftFile {
    #[serde(default, rename = "alertGifts")]
    alert_gifts: Vec<AlertGiftEntry>,
}

#[derive(Debug, Deserialize)]
struct AlertGiftEntry {
    gift_id: u64,
}

/// アラート対象ギフトIDの集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertGiftSet {
    gift_ids: HashSet<u64>,
}

impl AlertGiftSet {
    pub fn new(gift_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            gift_ids: gift_ids.into_iter().collect(),
        }
    }

    /// JSONファイル `{"alertGifts":[{"gift_id":N}]}` から読み込む
    pub fn try_load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: AlertGiftFile =
            serde_json::from_str(&content).map_err(|source| ConfigLoadError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::new(file.alert_gifts.into_iter().map(|entry| entry.gift_id)))
    }

    /// 読み込みに失敗した場合は空集合にフォールバック
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(set) => {
                tracing::info!(
                    path = %path.display(),
                    count = set.len(),
                    "🔔 Alert gift ids loaded"
                );
                set
            }
            Err(e) => {
                tracing::warn!("⚠️ Alert gift list unavailable, using empty set: {}", e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, gift_id: u64) -> bool {
        self.gift_ids.contains(&gift_id)
    }

    pub fn len(&self) -> usize {
        self.gift_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gift_ids.is_empty()
    }
}

/// 確定ギフトごとに呼ばれるアラートフック
pub trait AlertHook: Send + Sync {
    fn on_settled(&self, _gift: &SettledGift, _is_alert: bool) {}
}

/// 何もしないフック
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertHook;

impl AlertHook for NoopAlertHook {}
