//! 子流连接状态及其生命周期判定。
//! The subflow connection states and their lifecycle predicates.

use std::fmt;

/// The base state of a subflow's connection lifecycle.
///
/// The `got_fin` flag lives next to this on the subflow itself: a peer's FIN
/// is remembered separately so the move toward `Closing` can wait for the
/// local send side to drain.
///
/// 子流连接生命周期的基础状态。
///
/// `got_fin` 标志与之并列保存在子流上：对端的FIN被单独记住，
/// 以便向 `Closing` 的迁移等待本地发送侧排空。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubflowState {
    /// No connection attempt has been made.
    /// 尚未发起连接。
    Closed,
    /// Passive open: waiting for a peer's SYN.
    /// 被动打开：等待对端的SYN。
    Listen,
    /// Active open: SYN sent, waiting for the SYN-ACK.
    /// 主动打开：已发送SYN，等待SYN-ACK。
    SynSent,
    /// Passive open: SYN received and answered, waiting for the final ACK.
    /// 被动打开：已收到并应答SYN，等待最终ACK。
    SynReceived,
    /// The handshake completed; data flows.
    /// 握手完成；数据流动中。
    Established,
    /// The local FIN was sent and is not yet acknowledged, or is
    /// acknowledged while the peer's FIN is still outstanding.
    /// 本地FIN已发送但尚未确认，或已确认但对端FIN尚未到达。
    FinWait,
    /// Both FINs are in play; waiting for the local FIN's acknowledgment.
    /// 双方FIN均已出现；等待本地FIN被确认。
    Closing,
    /// Fully closed, lingering so stray segments die out.
    /// 已完全关闭，停留片刻以让迟到的报文段消亡。
    TimeWait,
    /// Torn down: timers cancelled, mapping tables discarded.
    /// 已销毁：定时器已取消，映射表已丢弃。
    Terminated,
}

impl SubflowState {
    /// Whether the subflow has finished its lifecycle.
    /// 子流是否已结束其生命周期。
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubflowState::Terminated)
    }

    /// Whether new application data may be queued in this state.
    /// 此状态下是否可以排队新的应用数据。
    pub fn can_send_data(&self) -> bool {
        matches!(self, SubflowState::Established)
    }

    /// Whether inbound segments are still processed in this state.
    /// 此状态下是否仍处理入站报文段。
    pub fn accepts_segments(&self) -> bool {
        !matches!(self, SubflowState::Closed | SubflowState::Terminated)
    }
}

impl fmt::Display for SubflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubflowState::Closed => "Closed",
            SubflowState::Listen => "Listen",
            SubflowState::SynSent => "SynSent",
            SubflowState::SynReceived => "SynReceived",
            SubflowState::Established => "Established",
            SubflowState::FinWait => "FinWait",
            SubflowState::Closing => "Closing",
            SubflowState::TimeWait => "TimeWait",
            SubflowState::Terminated => "Terminated",
        };
        write!(f, "{name}")
    }
}
