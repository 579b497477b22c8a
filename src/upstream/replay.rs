//! NDJSON記録の再生プロバイダー
//!
//! `<dir>/<target>.ndjson` を1つの配信ルームとして扱う。ファイルがまだ存在しない
//! ターゲットはオフラインとして報告する。

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::events::UpstreamEvent;
use super::{EventStream, LiveProvider, RoomRef, UpstreamError};
use crate::io::ndjson::parse_ndjson_file_generic;
use crate::session::Target;

/// 1行分の記録
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRecord {
    /// このイベントを配信するまでの待ち時間
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(flatten)]
    pub event: UpstreamEvent,
}

/// 1イベントあたりの待ち時間の上限
const MAX_DELAY_MS: u64 = 10 * 60 * 1000;

/// 記録ファイル再生プロバイダー
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    dir: PathBuf,
}

impl ReplayProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// ターゲットに対応する記録ファイルのパス
    fn recording_path(&self, target: &Target) -> Option<PathBuf> {
        let name = target.as_str();
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return None;
        }
        Some(self.dir.join(format!("{}.ndjson", name)))
    }
}

#[async_trait]
impl LiveProvider for ReplayProvider {
    async fn resolve(&self, target: &Target) -> Result<RoomRef, UpstreamError> {
        let path = self
            .recording_path(target)
            .ok_or_else(|| UpstreamError::NotFound(target.to_string()))?;

        if !tokio::fs::try_exists(&path).await? {
            tracing::debug!(session = %target, path = %path.display(), "Recording not available yet");
            return Err(UpstreamError::Offline(target.to_string()));
        }

        Ok(RoomRef {
            target: target.clone(),
            room_id: path.display().to_string(),
        })
    }

    async fn connect(&self, room: &RoomRef) -> Result<EventStream, UpstreamError> {
        let path = PathBuf::from(&room.room_id);
        let records = tokio::task::spawn_blocking(move || {
            parse_ndjson_file_generic(
                &path,
                Some(|record: &ReplayRecord| {
                    if record.delay_ms > MAX_DELAY_MS {
                        Err(format!(
                            "delay_ms {} exceeds limit {}",
                            record.delay_ms, MAX_DELAY_MS
                        ))
                    } else {
                        Ok(())
                    }
                }),
            )
        })
        .await
        .map_err(|e| UpstreamError::Connection(format!("replay loader failed: {}", e)))??;

        tracing::info!(
            session = %room.target,
            events = records.len(),
            "📼 Replay connected"
        );

        let events = stream::iter(records).then(|record| async move {
            if record.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(record.delay_ms)).await;
            }
            Ok::<_, UpstreamError>(record.event)
        });

        Ok(events.boxed())
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
