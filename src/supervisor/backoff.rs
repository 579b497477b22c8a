//! 解決リトライの待ち時間ポリシー
//!
//! 試行 `n` の待ち時間は `first × factor^n` を `max` で頭打ちにしたもの。
//! デフォルトは 5 秒固定。待ち時間は `MIN_DELAY` を下回らない。

use std::time::Duration;

/// 待ち時間の下限
pub const MIN_DELAY: Duration = Duration::from_millis(10);

/// リトライ待ち時間ポリシー
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// 最初の待ち時間
    pub first: Duration,
    /// 待ち時間の上限
    pub max: Duration,
    /// 倍率（1.0 で固定間隔）
    pub factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::constant(Duration::from_secs(5))
    }
}

impl BackoffPolicy {
    /// 固定間隔のポリシー
    pub fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
        }
    }

    /// 試行回数（0始まり）に対する待ち時間
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let delay = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        delay.max(MIN_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_constant_five_seconds() {
        let policy = BackoffPolicy::default();
        for attempt in [0, 1, 7, 1000] {
            assert_eq!(policy.next(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_interval_never_spins() {
        let policy = BackoffPolicy::constant(Duration::ZERO);
        for attempt in [0, 1, 50] {
            assert_eq!(policy.next(attempt), MIN_DELAY);
        }

        let shrinking = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 0.0,
        };
        assert_eq!(shrinking.next(3), MIN_DELAY);
    }
}
