//! 带指数退避的均值-偏差RTT估算器。
//! A mean-deviation RTT estimator with exponential backoff.

use std::time::Duration;

const ALPHA: f64 = 1.0 / 8.0;
const BETA: f64 = 1.0 / 4.0;

/// The largest backoff exponent; keeps the doubled timeout finite.
/// 最大退避指数；保证翻倍后的超时有限。
const MAX_BACKOFF_SHIFT: u32 = 8;

/// A mean-deviation estimator for the round-trip time.
///
/// Samples must come only from segments that were never retransmitted
/// (Karn's rule); the caller enforces that by withholding ambiguous samples.
///
/// 均值-偏差往返时间估算器。
///
/// 样本必须仅来自从未被重传的报文段（Karn规则）；
/// 由调用方通过扣留有歧义的样本来保证。
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// The smoothed round-trip time, in seconds.
    /// 平滑的往返时间（秒）。
    srtt: f64,
    /// The round-trip time variation, in seconds.
    /// 往返时间变化量（秒）。
    rttvar: f64,
    /// The base retransmission timeout, before backoff.
    /// 退避前的基础重传超时时间。
    base_rto: Duration,
    /// Doubles the effective timeout once per consecutive expiry.
    /// 每次连续超时使有效超时时间翻倍。
    backoff_shift: u32,
}

impl RttEstimator {
    /// Creates a new estimator with a given initial RTO.
    ///
    /// 使用给定的初始RTO创建一个新的估算器。
    pub fn new(initial_rto: Duration) -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            base_rto: initial_rto,
            backoff_shift: 0,
        }
    }

    /// Returns the current RTO, backoff included.
    ///
    /// 返回当前的RTO（包含退避）。
    pub fn rto(&self) -> Duration {
        self.base_rto
            .saturating_mul(1 << self.backoff_shift.min(MAX_BACKOFF_SHIFT))
    }

    /// Updates the estimator with a new sample and clears any backoff.
    ///
    /// 使用一个新的样本更新估算器并清除退避。
    pub fn update(&mut self, rtt_sample: Duration, min_rto: Duration) {
        let rtt_sample_f64 = rtt_sample.as_secs_f64();

        if self.srtt == 0.0 {
            // First sample
            self.srtt = rtt_sample_f64;
            self.rttvar = rtt_sample_f64 / 2.0;
        } else {
            let delta = (self.srtt - rtt_sample_f64).abs();
            self.rttvar = (1.0 - BETA) * self.rttvar + BETA * delta;
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt_sample_f64;
        }

        let rto_f64 = self.srtt + (4.0 * self.rttvar);
        self.base_rto = Duration::from_secs_f64(rto_f64).max(min_rto);
        self.backoff_shift = 0;
    }

    /// Doubles the effective timeout after an expiry.
    ///
    /// 超时后使有效超时时间翻倍。
    pub fn backoff(&mut self) {
        self.backoff_shift = (self.backoff_shift + 1).min(MAX_BACKOFF_SHIFT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn assert_f64_eq(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "Floats not equal: {} vs {}", a, b);
    }

    #[test]
    fn test_estimator_initialization() {
        let initial_rto = Duration::from_millis(500);
        let estimator = RttEstimator::new(initial_rto);
        assert_eq!(estimator.rto(), initial_rto);
    }

    #[test]
    fn test_first_sample_sets_variance_to_half() {
        let mut estimator = RttEstimator::new(Duration::from_millis(500));
        estimator.update(Duration::from_millis(100), Duration::from_millis(50));

        assert_f64_eq(estimator.srtt, 0.1);
        assert_f64_eq(estimator.rttvar, 0.05);
        assert_eq!(estimator.rto(), Duration::from_millis(300));
    }

    #[test]
    fn test_subsequent_samples_smooth() {
        let min_rto = Duration::from_millis(50);
        let mut estimator = RttEstimator::new(Duration::from_millis(500));

        estimator.update(Duration::from_millis(100), min_rto);
        assert_eq!(estimator.rto(), Duration::from_millis(300));

        // Stable RTT shrinks the variance term.
        estimator.update(Duration::from_millis(100), min_rto);
        assert_f64_eq(estimator.srtt, 0.1);
        assert_f64_eq(estimator.rttvar, 0.0375);
        assert_eq!(estimator.rto(), Duration::from_millis(250));

        // An RTT increase pushes the timeout back up.
        estimator.update(Duration::from_millis(200), min_rto);
        assert_f64_eq(estimator.srtt, 0.1125);
        assert_f64_eq(estimator.rttvar, 0.053125);
        assert_eq!(estimator.rto(), Duration::from_millis(325));
    }

    #[test]
    fn test_min_rto_enforced() {
        let min_rto = Duration::from_millis(200);
        let mut estimator = RttEstimator::new(Duration::from_millis(500));

        // A very small sample would compute a 30ms timeout.
        estimator.update(Duration::from_millis(10), min_rto);
        assert_eq!(estimator.rto(), min_rto);
    }

    #[test]
    fn test_backoff_doubles_and_sample_resets() {
        let mut estimator = RttEstimator::new(Duration::from_millis(100));

        estimator.backoff();
        assert_eq!(estimator.rto(), Duration::from_millis(200));
        estimator.backoff();
        assert_eq!(estimator.rto(), Duration::from_millis(400));

        // A fresh sample clears the backoff.
        estimator.update(Duration::from_millis(100), Duration::from_millis(100));
        assert!(estimator.rto() < Duration::from_millis(400));
    }
}
