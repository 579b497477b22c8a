//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリ上の `config.toml` を読み込む。ファイルがなければデフォルト、
//! 壊れていれば警告を出してデフォルトを使う。

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse TOML '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to determine project directories")]
    NoProjectDirs,
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// WebSocketサーバーの希望ポート
    pub port: u16,
    /// 記録ファイルのディレクトリ
    pub replay_dir: PathBuf,
    /// 確定ギフトログの出力先
    pub gift_log: PathBuf,
    /// アラート対象ギフトの定義ファイル
    pub alert_gifts: PathBuf,
    /// オフライン時の再試行間隔（秒）
    pub retry_interval_secs: u64,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            replay_dir: PathBuf::from("replays"),
            gift_log: PathBuf::from("history_gifts.jsonl"),
            alert_gifts: PathBuf::from("static/alert_gifts.json"),
            retry_interval_secs: 5,
            log: LogConfig::default(),
        }
    }
}

/// 再試行間隔の下限（秒）
const MIN_RETRY_INTERVAL_SECS: u64 = 1;

impl AppConfig {
    /// オフライン時の再試行間隔
    ///
    /// 0 が指定されても 1 秒未満にはしない。
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(MIN_RETRY_INTERVAL_SECS))
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGディレクトリの設定ファイルを使う
    pub fn new() -> Result<Self, ConfigLoadError> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// 任意のパスの設定ファイルを使う
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    pub fn default_config_path() -> Result<PathBuf, ConfigLoadError> {
        let project_dirs =
            ProjectDirs::from("dev", "livetally", "livetally").ok_or(ConfigLoadError::NoProjectDirs)?;
        let config_file = project_dirs.config_dir().join("config.toml");

        debug!("Config file path: {}", config_file.display());
        Ok(config_file)
    }

    /// XDGデフォルトのログディレクトリ
    pub fn default_log_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "livetally", "livetally")
            .map(|dirs| dirs.data_local_dir().join("logs"))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<AppConfig, ConfigLoadError> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content =
            std::fs::read_to_string(&self.config_path).map_err(|source| ConfigLoadError::Io {
                path: self.config_path.clone(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigLoadError::Toml {
            path: self.config_path.clone(),
            source,
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト設定を使う
    pub fn load_config_or_default(&self) -> AppConfig {
        self.load_config().unwrap_or_else(|e| {
            warn!("設定読み込みエラー、デフォルト設定を使用: {}", e);
            AppConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8765);
        assert_eq!(config.retry_interval(), Duration::from_secs(5));
        assert_eq!(config.gift_log, PathBuf::from("history_gifts.jsonl"));
        assert_eq!(config.log.log_level, "info");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        assert_eq!(manager.load_config().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "port = 9000\nretry_interval_secs = 1\n\n[log]\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load_config().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.retry_interval_secs, 1);
        assert_eq!(config.log.log_level, "debug");
        assert_eq!(config.replay_dir, PathBuf::from("replays"));
        assert!(!config.log.enable_file_logging);
    }

    #[test]
    fn test_zero_retry_interval_is_floored() {
        let config = AppConfig {
            retry_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.retry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let manager = ConfigManager::with_path(&path);
        assert!(matches!(
            manager.load_config(),
            Err(ConfigLoadError::Toml { .. })
        ));
        assert_eq!(manager.load_config_or_default(), AppConfig::default());
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let config = AppConfig {
            port: 1234,
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
