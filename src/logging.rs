//! ログ初期化

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{ConfigManager, LogConfig};

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "livetally.log";

/// RUST_LOG が設定されていればそれを優先し、なければ設定値のレベルを使う
fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// ログを初期化
///
/// ファイル出力が有効な場合、返されたガードが生きている間だけ書き込まれる。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let log_dir = if config.enable_file_logging {
        let dir = config
            .log_dir
            .clone()
            .or_else(ConfigManager::default_log_dir)
            .ok_or_else(|| anyhow::anyhow!("No log directory available"))?;
        std::fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };

    let (file_layer, guard) = if let Some(log_dir) = &log_dir {
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(build_env_filter(&config.log_level))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = &log_dir {
        tracing::info!("📝 File logging enabled: {}", dir.display());
    }

    Ok(guard)
}
