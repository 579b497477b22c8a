pub mod queue; // 監視対象キュー
pub mod state; // セッション状態
pub mod target; // ターゲット正規化

pub use queue::TargetQueue;
pub use state::SessionState;
pub use target::{InvalidTargetError, Target};
