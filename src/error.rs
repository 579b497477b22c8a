//! クレート共通のエラー型
//!
//! 各モジュールは自分の関心ごとにエラー型を持ち、境界では
//! [`LiveTallyError`] にまとめる。

use thiserror::Error;

pub use crate::config::ConfigLoadError;
pub use crate::io::gift_log::GiftLogError;
pub use crate::session::target::InvalidTargetError;
pub use crate::upstream::UpstreamError;

/// 旧セッションの切断・待機中に発生したエラー
///
/// スーパーバイザーはこのエラーをログに残して握りつぶす。
#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("receive task panicked for target '{target}'")]
    Panicked { target: String },

    #[error("receive task was aborted for target '{target}'")]
    Cancelled { target: String },

    #[error("receive loop for target '{target}' ended with error: {source}")]
    Upstream {
        target: String,
        #[source]
        source: UpstreamError,
    },
}

/// クレート全体のエラー型
#[derive(Error, Debug)]
pub enum LiveTallyError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTargetError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Teardown(#[from] TeardownError),

    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),

    #[error(transparent)]
    GiftLog(#[from] GiftLogError),

    #[error("I/O error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error(transparent)]
    General(#[from] anyhow::Error),
}

pub type LiveTallyResult<T> = Result<T, LiveTallyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_teardown_error_keeps_upstream_source() {
        let error = TeardownError::Upstream {
            target: "alice".to_string(),
            source: UpstreamError::Connection("reset by peer".to_string()),
        };
        assert!(error.to_string().contains("alice"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_invalid_target_converts_to_crate_error() {
        let error: LiveTallyError = InvalidTargetError::Empty {
            raw: "  ".to_string(),
        }
        .into();
        assert!(matches!(error, LiveTallyError::InvalidTarget(_)));
    }
}
