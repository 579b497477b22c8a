//! ギフト集計モジュール
//!
//! コンボ集計とアラート対象ギフトの判定を提供します。

pub mod alerts;
pub mod combo_aggregator;

pub use alerts::{AlertGiftSet, AlertHook, NoopAlertHook};
pub use combo_aggregator::{
    display_nickname, settle, ComboAggregator, ComboGift, SettledGift, SingleGift,
    ANONYMOUS_NICKNAME,
};
