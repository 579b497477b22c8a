//! セッション状態

use serde::Serialize;

use super::target::Target;

/// スーパーバイザーが管理するセッション状態
///
/// 同時に存在する非Idle状態は常に1つだけ。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "target", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Resolving(Target),
    Active(Target),
    TearingDown(Target),
}

impl SessionState {
    /// 状態に紐づくターゲット
    pub fn target(&self) -> Option<&Target> {
        match self {
            SessionState::Idle => None,
            SessionState::Resolving(target)
            | SessionState::Active(target)
            | SessionState::TearingDown(target) => Some(target),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Resolving(_) => "resolving",
            SessionState::Active(_) => "active",
            SessionState::TearingDown(_) => "tearing_down",
        }
    }
}
