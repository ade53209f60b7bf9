//! 重传管理器：每个子流一个重传定时器、重复ACK计数、
//! 受限传输与超时耗尽判定。
//! The retransmission manager: one retransmission timer per subflow,
//! duplicate-ACK counting, limited transmit, and timeout exhaustion.

use crate::{
    config::Config,
    error::{Error, Result},
    reliability::rtt::RttEstimator,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Retransmission timer and duplicate-ACK state for one subflow.
///
/// The manager does not store segments; the subflow keeps the in-flight
/// store and asks this type when the timer fires and whether fast
/// retransmit or limited transmit applies.
///
/// 单个子流的重传定时器和重复ACK状态。
///
/// 管理器不存储报文段；子流保存在途存储，
/// 并向本类型询问定时器何时到期、是否适用快速重传或受限传输。
#[derive(Debug)]
pub struct RetransmissionManager {
    rtt: RttEstimator,
    config: Config,
    /// The armed retransmission deadline, if any data is outstanding.
    /// 已设置的重传截止时间（有在途数据时）。
    deadline: Option<Instant>,
    /// Duplicate ACKs seen for the current cumulative ack point.
    /// 当前累积确认点已观察到的重复ACK数量。
    dup_ack_count: u32,
    /// Consecutive timer expiries without any ack progress.
    /// 无任何确认进展的连续定时器到期次数。
    consecutive_timeouts: u32,
    /// New segments limited transmit currently permits.
    /// 受限传输当前允许发送的新报文段数量。
    limited_transmit_budget: u32,
}

impl RetransmissionManager {
    /// Creates a new manager with an unarmed timer.
    /// 创建一个定时器未设置的新管理器。
    pub fn new(config: Config) -> Self {
        let rtt = RttEstimator::new(config.retransmission.initial_rto);
        Self {
            rtt,
            config,
            deadline: None,
            dup_ack_count: 0,
            consecutive_timeouts: 0,
            limited_transmit_budget: 0,
        }
    }

    /// The current retransmission timeout.
    /// 当前的重传超时时间。
    pub fn rto(&self) -> Duration {
        self.rtt.rto()
    }

    /// The armed deadline, if any.
    /// 已设置的截止时间（如果存在）。
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Duplicate ACKs seen for the current ack point.
    /// 当前确认点已观察到的重复ACK数量。
    pub fn dup_ack_count(&self) -> u32 {
        self.dup_ack_count
    }

    /// Arms the timer for a transmission that advanced the highest sent
    /// sequence. Transmissions that do not advance it (retransmits) keep
    /// the running timer.
    ///
    /// 为推进了最高已发送序列号的传输设置定时器。
    /// 未推进的传输（重传）保持原定时器不变。
    pub fn on_segment_sent(&mut self, now: Instant, advanced_highest: bool) {
        if advanced_highest || self.deadline.is_none() {
            self.deadline = Some(now + self.rtt.rto());
            trace!(rto = ?self.rtt.rto(), "retransmission timer armed");
        }
    }

    /// Processes a cumulative ACK that advanced the ack point.
    ///
    /// `rtt_sample` must be `None` when the acknowledged segment was ever
    /// retransmitted (Karn's rule). `outstanding` says whether unacked data
    /// remains; the timer is re-armed for it or cancelled.
    ///
    /// 处理推进了确认点的累积ACK。
    ///
    /// 如果被确认的报文段曾被重传，`rtt_sample` 必须为 `None`（Karn规则）。
    /// `outstanding` 表示是否仍有未确认数据；定时器据此重设或取消。
    pub fn on_ack_advanced(
        &mut self,
        rtt_sample: Option<Duration>,
        now: Instant,
        outstanding: bool,
    ) {
        if let Some(sample) = rtt_sample {
            self.rtt.update(sample, self.config.retransmission.min_rto);
            trace!(?sample, rto = ?self.rtt.rto(), "rtt sample applied");
        }
        self.dup_ack_count = 0;
        self.consecutive_timeouts = 0;
        self.limited_transmit_budget = 0;
        self.deadline = if outstanding {
            Some(now + self.rtt.rto())
        } else {
            None
        };
    }

    /// Counts a duplicate ACK and returns the running count. Below the
    /// fast-retransmit threshold each duplicate earns one segment of
    /// limited-transmit budget, keeping the ACK clock running.
    ///
    /// 记录一个重复ACK并返回累计数量。在快速重传阈值以下，
    /// 每个重复ACK获得一个报文段的受限传输额度，维持ACK时钟运转。
    pub fn on_duplicate_ack(&mut self) -> u32 {
        self.dup_ack_count += 1;
        if self.config.congestion.limited_transmit
            && self.dup_ack_count < self.config.congestion.dup_ack_threshold
        {
            self.limited_transmit_budget += 1;
        }
        self.dup_ack_count
    }

    /// Consumes one segment of limited-transmit budget, if available.
    /// 消耗一个受限传输额度（如果有）。
    pub fn take_limited_transmit(&mut self) -> bool {
        if self.limited_transmit_budget > 0 {
            self.limited_transmit_budget -= 1;
            true
        } else {
            false
        }
    }

    /// Handles a timer expiry: doubles the backoff and re-arms.
    ///
    /// Fails with [`Error::RetransmissionExhausted`] once the configured
    /// number of consecutive expiries passes without any ack progress.
    ///
    /// 处理定时器到期：退避翻倍并重新设置。
    ///
    /// 一旦连续到期次数超过配置值且无任何确认进展，
    /// 以 [`Error::RetransmissionExhausted`] 失败。
    pub fn on_timeout(&mut self, now: Instant) -> Result<()> {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts > self.config.retransmission.max_consecutive_timeouts {
            debug!(
                attempts = self.consecutive_timeouts,
                "retransmission attempts exhausted"
            );
            self.deadline = None;
            return Err(Error::RetransmissionExhausted);
        }
        self.rtt.backoff();
        self.deadline = Some(now + self.rtt.rto());
        debug!(
            attempt = self.consecutive_timeouts,
            rto = ?self.rtt.rto(),
            "retransmission timer expired, backing off"
        );
        Ok(())
    }

    /// Cancels the timer unconditionally. Used on subflow teardown; no
    /// timer may fire after its owning subflow is gone.
    ///
    /// 无条件取消定时器。用于子流销毁；子流消亡后任何定时器都不得触发。
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.limited_transmit_budget = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn manager() -> RetransmissionManager {
        RetransmissionManager::new(Config::default())
    }

    #[test]
    fn test_timer_armed_on_new_transmission_only() {
        let mut mgr = manager();
        let now = Instant::now();
        assert!(mgr.next_deadline().is_none());

        mgr.on_segment_sent(now, true);
        let first = mgr.next_deadline().unwrap();

        // A retransmission does not push the deadline out.
        mgr.on_segment_sent(now + Duration::from_millis(100), false);
        assert_eq!(mgr.next_deadline().unwrap(), first);

        // A transmission advancing the highest sequence re-arms.
        mgr.on_segment_sent(now + Duration::from_millis(100), true);
        assert!(mgr.next_deadline().unwrap() > first);
    }

    #[test]
    fn test_ack_advance_resets_counters_and_timer() {
        let mut mgr = manager();
        let now = Instant::now();
        mgr.on_segment_sent(now, true);
        mgr.on_duplicate_ack();
        mgr.on_duplicate_ack();
        assert_eq!(mgr.dup_ack_count(), 2);

        mgr.on_ack_advanced(Some(Duration::from_millis(100)), now, true);
        assert_eq!(mgr.dup_ack_count(), 0);
        assert!(mgr.next_deadline().is_some());

        // Everything acknowledged: the timer is cancelled.
        mgr.on_ack_advanced(None, now, false);
        assert!(mgr.next_deadline().is_none());
    }

    #[test]
    fn test_limited_transmit_budget_below_threshold() {
        let mut mgr = manager();

        // First two duplicates each earn one segment.
        mgr.on_duplicate_ack();
        mgr.on_duplicate_ack();
        assert!(mgr.take_limited_transmit());
        assert!(mgr.take_limited_transmit());
        assert!(!mgr.take_limited_transmit());

        // At and beyond the threshold no further budget accrues.
        mgr.on_duplicate_ack();
        mgr.on_duplicate_ack();
        assert!(!mgr.take_limited_transmit());
    }

    #[test]
    fn test_limited_transmit_disabled_by_config() {
        let mut config = Config::default();
        config.congestion.limited_transmit = false;
        let mut mgr = RetransmissionManager::new(config);
        mgr.on_duplicate_ack();
        assert!(!mgr.take_limited_transmit());
    }

    #[test]
    fn test_timeout_backs_off_and_exhausts() {
        let mut config = Config::default();
        config.retransmission.max_consecutive_timeouts = 3;
        let mut mgr = RetransmissionManager::new(config);
        let now = Instant::now();
        mgr.on_segment_sent(now, true);

        let rto_before = mgr.rto();
        assert!(mgr.on_timeout(now).is_ok());
        assert_eq!(mgr.rto(), rto_before * 2);
        assert!(mgr.on_timeout(now).is_ok());
        assert!(mgr.on_timeout(now).is_ok());

        // The fourth consecutive expiry reports exhaustion.
        assert_eq!(mgr.on_timeout(now), Err(Error::RetransmissionExhausted));
        assert!(mgr.next_deadline().is_none());
    }

    #[test]
    fn test_progress_resets_exhaustion_counter() {
        let mut config = Config::default();
        config.retransmission.max_consecutive_timeouts = 2;
        let mut mgr = RetransmissionManager::new(config);
        let now = Instant::now();
        mgr.on_segment_sent(now, true);

        assert!(mgr.on_timeout(now).is_ok());
        assert!(mgr.on_timeout(now).is_ok());
        // Ack progress arrives just in time.
        mgr.on_ack_advanced(None, now, true);
        assert!(mgr.on_timeout(now).is_ok());
    }

    #[test]
    fn test_cancel_is_unconditional() {
        let mut mgr = manager();
        let now = Instant::now();
        mgr.on_segment_sent(now, true);
        mgr.on_duplicate_ack();
        mgr.cancel();
        assert!(mgr.next_deadline().is_none());
        assert!(!mgr.take_limited_transmit());
    }
}
