//! 经典AIMD（Reno族）窗口策略的实现。
//! An implementation of the classic AIMD (Reno-family) window policy.

use crate::congestion::CwndPolicy;

/// The default congestion-control family: additive increase of roughly one
/// segment per round trip, multiplicative decrease by half on loss.
///
/// 默认的拥塞控制算法族：每个往返大约加性增加一个报文段，
/// 丢包时乘性减半。
#[derive(Debug, Default, Clone, Copy)]
pub struct Reno;

impl CwndPolicy for Reno {
    fn open_cwnd_in_ca(&self, cwnd: u32, _acked_bytes: u32, segment_size: u32) -> u32 {
        // Approximates one segment of growth per round trip.
        segment_size.saturating_mul(segment_size) / cwnd.max(1)
    }

    fn reduce_cwnd(&self, cwnd: u32, _segment_size: u32) -> u32 {
        cwnd / 2
    }
}
