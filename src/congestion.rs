//! 定义了拥塞控制器及其可插拔的窗口增减策略。
//! Defines the congestion controller and its pluggable window
//! growth/reduction policy.

pub mod reno;

#[cfg(test)]
mod tests;

use crate::config::CongestionConfig;
use tracing::{debug, trace};

/// The strategy seam for congestion-control families. The controller's
/// state machine calls through this interface without knowing the concrete
/// family; only the growth step in congestion avoidance and the reduction
/// amount on loss differ between families.
///
/// 拥塞控制算法族的策略接口。控制器的状态机通过该接口调用，
/// 无需了解具体算法族；各族之间仅拥塞避免阶段的增长步长
/// 和丢包时的缩减量不同。
pub trait CwndPolicy: Send + Sync + std::fmt::Debug + 'static {
    /// The congestion-avoidance increment, in bytes, applied per ACK.
    ///
    /// 拥塞避免阶段每个ACK应用的增量（字节）。
    fn open_cwnd_in_ca(&self, cwnd: u32, acked_bytes: u32, segment_size: u32) -> u32;

    /// The new slow-start threshold after a loss event.
    ///
    /// 丢包事件后新的慢启动阈值。
    fn reduce_cwnd(&self, cwnd: u32, segment_size: u32) -> u32;
}

/// The phase of the congestion controller.
/// 拥塞控制器所处的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionPhase {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// The per-subflow congestion controller.
///
/// All window arithmetic is in bytes. The window is clamped to at least one
/// segment at every update.
///
/// 每个子流的拥塞控制器。
///
/// 所有窗口运算均以字节为单位。每次更新时窗口都被钳制为至少一个报文段。
#[derive(Debug)]
pub struct CongestionController {
    /// The congestion window, in bytes.
    /// 拥塞窗口（字节）。
    cwnd: u32,
    /// The slow-start threshold, in bytes.
    /// 慢启动阈值（字节）。
    ssthresh: u32,
    /// The window restored after a retransmission timeout.
    /// 重传超时后恢复的窗口。
    initial_cwnd: u32,
    /// The highest sequence sent when fast recovery was entered.
    /// 进入快速恢复时已发送的最高序列号。
    recover: u32,
    phase: CongestionPhase,
    segment_size: u32,
    policy: Box<dyn CwndPolicy>,
}

impl CongestionController {
    /// Creates a controller in slow start with the configured initial
    /// window.
    /// 创建一个处于慢启动阶段、使用配置初始窗口的控制器。
    pub fn new(config: &CongestionConfig, policy: Box<dyn CwndPolicy>) -> Self {
        let initial_cwnd = config
            .initial_cwnd_segments
            .max(1)
            .saturating_mul(config.segment_size);
        Self {
            cwnd: initial_cwnd,
            ssthresh: config.initial_ssthresh,
            initial_cwnd,
            recover: 0,
            phase: CongestionPhase::SlowStart,
            segment_size: config.segment_size,
            policy,
        }
    }

    /// The current congestion window, in bytes.
    /// 当前拥塞窗口（字节）。
    pub fn window(&self) -> u32 {
        self.cwnd
    }

    /// The current slow-start threshold, in bytes.
    /// 当前慢启动阈值（字节）。
    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    /// The current phase.
    /// 当前阶段。
    pub fn phase(&self) -> CongestionPhase {
        self.phase
    }

    /// The recovery point armed when fast recovery was entered.
    /// 进入快速恢复时设置的恢复点。
    pub fn recover(&self) -> u32 {
        self.recover
    }

    /// Called when a new ACK advances the cumulative ack point.
    ///
    /// In slow start the window grows by the acknowledged bytes; once it
    /// reaches the threshold the controller moves to congestion avoidance,
    /// where growth is delegated to the policy. A new ACK beyond the
    /// recovery point exits fast recovery by deflating the window to the
    /// threshold.
    ///
    /// 当新ACK推进累积确认点时调用。
    ///
    /// 慢启动阶段窗口按已确认字节数增长；达到阈值后控制器进入拥塞避免，
    /// 增长委托给策略。超过恢复点的新ACK退出快速恢复，
    /// 并将窗口收缩至阈值。
    pub fn on_new_ack(&mut self, acked_bytes: u32, ack: u32) {
        match self.phase {
            CongestionPhase::FastRecovery => {
                if ack > self.recover {
                    self.cwnd = self.ssthresh;
                    self.phase = CongestionPhase::CongestionAvoidance;
                    debug!(cwnd = self.cwnd, "fast recovery exited");
                }
                // A partial ACK below the recovery point keeps the window.
            }
            CongestionPhase::SlowStart => {
                self.cwnd = self.cwnd.saturating_add(acked_bytes);
                trace!(cwnd = self.cwnd, "slow start: window opened");
                if self.cwnd >= self.ssthresh {
                    self.phase = CongestionPhase::CongestionAvoidance;
                    debug!(cwnd = self.cwnd, "slow start exited");
                }
            }
            CongestionPhase::CongestionAvoidance => {
                let increment =
                    self.policy
                        .open_cwnd_in_ca(self.cwnd, acked_bytes, self.segment_size);
                self.cwnd = self.cwnd.saturating_add(increment);
                trace!(
                    cwnd = self.cwnd,
                    increment, "congestion avoidance: window opened"
                );
            }
        }
        self.clamp();
    }

    /// Called for every duplicate ACK. `dup_ack_count` is the running count
    /// for the current ack point and `highest_sent` the highest sequence
    /// transmitted so far. Returns `true` when the threshold was just
    /// crossed and the segment at the ack point must be retransmitted
    /// immediately.
    ///
    /// 每个重复ACK都会调用。`dup_ack_count` 是当前确认点的累计计数，
    /// `highest_sent` 是迄今发送的最高序列号。
    /// 当阈值刚被越过、必须立即重传确认点处的报文段时返回 `true`。
    pub fn on_duplicate_ack(
        &mut self,
        dup_ack_count: u32,
        dup_ack_threshold: u32,
        highest_sent: u32,
    ) -> bool {
        if self.phase == CongestionPhase::FastRecovery {
            // Each further duplicate ACK signals another segment has left
            // the network.
            self.cwnd = self
                .ssthresh
                .saturating_add(dup_ack_count.saturating_mul(self.segment_size));
            self.clamp();
            return false;
        }
        if dup_ack_count < dup_ack_threshold {
            return false;
        }
        self.ssthresh = self.policy.reduce_cwnd(self.cwnd, self.segment_size);
        self.cwnd = self
            .ssthresh
            .saturating_add(dup_ack_count.saturating_mul(self.segment_size));
        self.recover = highest_sent;
        self.phase = CongestionPhase::FastRecovery;
        self.clamp();
        debug!(
            ssthresh = self.ssthresh,
            cwnd = self.cwnd,
            recover = self.recover,
            "fast recovery entered"
        );
        true
    }

    /// Called on a retransmission timeout: the threshold is halved per the
    /// policy, the window restarts from its initial value and the controller
    /// returns to slow start, independent of any fast-recovery state.
    ///
    /// 重传超时时调用：阈值按策略减半，窗口从初始值重新开始，
    /// 控制器回到慢启动，与快速恢复状态无关。
    pub fn on_timeout(&mut self) {
        self.ssthresh = self.policy.reduce_cwnd(self.cwnd, self.segment_size);
        self.cwnd = self.initial_cwnd;
        self.phase = CongestionPhase::SlowStart;
        self.clamp();
        debug!(
            ssthresh = self.ssthresh,
            cwnd = self.cwnd,
            "timeout: window reset to slow start"
        );
    }

    /// The window never falls below one segment.
    /// 窗口永远不低于一个报文段。
    fn clamp(&mut self) {
        self.cwnd = self.cwnd.max(self.segment_size);
    }
}
