//! 確定ギフトの追記ログ
//!
//! 確定したギフトイベントを1行1JSONで追記する。読み出しは [`super::ndjson`] を使う。
//! 書き込みは `tokio::fs` で行い、ファイルは最初の追記で開いたまま保持する。

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ndjson::{parse_ndjson_file, NdjsonError};

#[derive(Error, Debug)]
pub enum GiftLogError {
    #[error("failed to serialize gift log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write gift log '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 確定ギフトログ
#[derive(Debug)]
pub struct GiftLog {
    path: Option<PathBuf>,
    /// 開いている追記先（書き込み失敗時は閉じて次回開き直す）
    file: Mutex<Option<File>>,
}

impl GiftLog {
    /// 指定パスへ追記するログを作成
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            file: Mutex::new(None),
        }
    }

    /// 何も書き込まないログ
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// エントリを1行追記
    pub async fn append<T: Serialize>(&self, entry: &T) -> Result<(), GiftLogError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut slot = self.file.lock().await;
        if let Err(source) = write_line(&mut slot, path, line.as_bytes()).await {
            *slot = None;
            return Err(GiftLogError::Write {
                path: path.clone(),
                source,
            });
        }

        tracing::debug!(path = %path.display(), bytes = line.len(), "💾 Gift log entry appended");
        Ok(())
    }

    /// 記録済みのエントリをすべて読み出す
    pub fn read_entries<T>(&self) -> Result<Vec<T>, NdjsonError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match &self.path {
            Some(path) if path.exists() => parse_ndjson_file(path),
            _ => Ok(Vec::new()),
        }
    }
}

async fn write_line(slot: &mut Option<File>, path: &Path, line: &[u8]) -> std::io::Result<()> {
    let file = match slot.take() {
        Some(file) => file,
        None => OpenOptions::new().create(true).append(true).open(path).await?,
    };
    let file = slot.insert(file);
    file.write_all(line).await?;
    file.flush().await
}
