//! 監視対象（ターゲット）の正規化

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// プロフィールURLから `@handle` 部分を取り出すパターン
static URL_HANDLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([^/]*)").expect("valid handle pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTargetError {
    #[error("target is empty after normalization (input: {raw:?})")]
    Empty { raw: String },
}

/// 正規化済みのターゲット識別子
///
/// 前後の空白・先頭の `@`・URLのスキーム/ホスト部分を含まない。
/// 空文字列にはならない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    /// 生の入力（ハンドル、`@handle`、プロフィールURL）を正規化する
    pub fn parse(raw: &str) -> Result<Self, InvalidTargetError> {
        let mut value = raw.trim();

        if value.starts_with("http") {
            value = URL_HANDLE_PATTERN
                .captures(value)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str())
                .unwrap_or_default();
        }

        let value = value.trim_start_matches('@').trim();
        if value.is_empty() {
            return Err(InvalidTargetError::Empty {
                raw: raw.to_string(),
            });
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Target {
    type Error = InvalidTargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}

impl std::str::FromStr for Target {
    type Err = InvalidTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_handle() {
        assert_eq!(Target::parse("alice").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_at_prefix_and_whitespace() {
        assert_eq!(Target::parse("  @alice \n").unwrap().as_str(), "alice");
        assert_eq!(Target::parse("@@bob").unwrap().as_str(), "bob");
    }

    #[test]
    fn test_profile_url() {
        let target = Target::parse("https://host/@handle/live").unwrap();
        assert_eq!(target.as_str(), "handle");

        let target = Target::parse("https://www.tiktok.com/@some.user").unwrap();
        assert_eq!(target.as_str(), "some.user");
    }

    #[test]
    fn test_url_without_handle_is_rejected() {
        let result = Target::parse("https://host/live");
        assert!(matches!(result, Err(InvalidTargetError::Empty { .. })));
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        for raw in ["", "   ", "@", " @ ", "https://host/@/live"] {
            assert!(Target::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_normalized_target_is_fixed_point() {
        let once = Target::parse("https://host/@carol/live").unwrap();
        let twice = Target::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serde_rejects_empty_target() {
        let target: Target = serde_json::from_str("\"@dave\"").unwrap();
        assert_eq!(target.to_string(), "dave");
        assert!(serde_json::from_str::<Target>("\"\"").is_err());
    }
}
