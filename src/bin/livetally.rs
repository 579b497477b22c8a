use clap::Parser;
use livetally::{
    analytics::AlertGiftSet,
    config::{AppConfig, ConfigManager},
    logging, BackoffPolicy, GiftLog, ReplayProvider, SessionSupervisor, TargetQueue,
    WebSocketServer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// ライブ配信ギフト集計サーバー
#[derive(Parser, Debug)]
#[command(name = "livetally", version, about = "Live broadcast gift tally server")]
struct Args {
    /// 設定ファイルのパス（省略時はXDG設定ディレクトリ）
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebSocketサーバーの希望ポート
    #[arg(long)]
    port: Option<u16>,

    /// 記録ファイルのディレクトリ
    #[arg(long)]
    replay_dir: Option<PathBuf>,

    /// 確定ギフトログの出力先
    #[arg(long)]
    gift_log: Option<PathBuf>,

    /// アラート対象ギフトの定義ファイル
    #[arg(long)]
    alert_gifts: Option<PathBuf>,

    /// オフライン時の再試行間隔（秒）
    #[arg(long)]
    retry_interval_secs: Option<u64>,

    /// ログレベル (trace/debug/info/warn/error)
    #[arg(long)]
    log_level: Option<String>,

    /// 起動時に監視するターゲット
    targets: Vec<String>,
}

impl Args {
    /// コマンドライン引数で設定を上書き
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.replay_dir {
            config.replay_dir = dir.clone();
        }
        if let Some(path) = &self.gift_log {
            config.gift_log = path.clone();
        }
        if let Some(path) = &self.alert_gifts {
            config.alert_gifts = path.clone();
        }
        if let Some(secs) = self.retry_interval_secs {
            config.retry_interval_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log.log_level = level.clone();
        }
    }
}

fn load_config(args: &Args) -> AppConfig {
    let mut config = match &args.config {
        Some(path) => ConfigManager::with_path(path).load_config_or_default(),
        None => match ConfigManager::new() {
            Ok(manager) => manager.load_config_or_default(),
            Err(_) => AppConfig::default(),
        },
    };
    args.apply_to(&mut config);
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args);

    let _log_guard = logging::init_logging(&config.log)?;

    tracing::info!("🎬 Starting livetally v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Configuration: {:?}", config);

    let queue = Arc::new(TargetQueue::new());

    let server = Arc::new(WebSocketServer::new(config.port, Arc::clone(&queue)));
    server.start().await?;

    let alerts = Arc::new(AlertGiftSet::load_or_empty(&config.alert_gifts));
    let provider = Arc::new(ReplayProvider::new(&config.replay_dir));
    tracing::info!("📂 Replaying recordings from {}", config.replay_dir.display());

    let supervisor = SessionSupervisor::new(Arc::clone(&queue), provider, server.clone())
        .with_gift_log(Arc::new(GiftLog::new(&config.gift_log)))
        .with_alerts(alerts)
        .with_backoff(BackoffPolicy::constant(config.retry_interval()));

    let shutdown = CancellationToken::new();
    let supervisor_task = tokio::spawn(supervisor.run(shutdown.clone()));

    for raw in &args.targets {
        match queue.submit(raw) {
            Ok(target) => tracing::info!(session = %target, "🎯 Initial target queued"),
            Err(e) => tracing::warn!("Ignoring initial target: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 終了シグナルを受信しました");

    shutdown.cancel();
    if let Err(e) = supervisor_task.await {
        tracing::error!("Supervisor task failed: {}", e);
    }
    server.stop().await;

    tracing::info!("👋 livetally shutting down");
    Ok(())
}
