//! 定义了子流引擎的可配置参数。
//! Defines configurable parameters for the subflow engine.

use std::time::Duration;

/// A structure containing all configurable parameters for one subflow.
/// All fields are read at construction and treated as immutable for the
/// subflow's lifetime, except the backup flag which may be toggled by a
/// priority signal.
///
/// 包含单个子流所有可配置参数的结构体。
/// 所有字段在构造时读取，并在子流的生命周期内视为不可变，
/// 仅备份标志可由优先级信号切换。
#[derive(Debug, Clone)]
pub struct Config {
    /// Congestion control-related parameters.
    /// 拥塞控制相关参数。
    pub congestion: CongestionConfig,

    /// Retransmission-related parameters.
    /// 重传相关参数。
    pub retransmission: RetransmissionConfig,

    /// Subflow state machine parameters.
    /// 子流状态机参数。
    pub subflow: SubflowConfig,
}

/// Congestion control-related parameters.
///
/// 拥塞控制相关参数。
#[derive(Debug, Clone)]
pub struct CongestionConfig {
    /// The maximum segment size in bytes. Window arithmetic is in bytes but
    /// grows and shrinks in units of this size.
    /// 最大报文段大小（字节）。窗口以字节计算，但以该单位增减。
    pub segment_size: u32,
    /// The initial congestion window, in segments.
    /// 初始拥塞窗口（以报文段为单位）。
    pub initial_cwnd_segments: u32,
    /// The initial slow start threshold, in bytes.
    /// 初始慢启动阈值（字节）。
    pub initial_ssthresh: u32,
    /// The number of duplicate ACKs that triggers fast retransmit.
    /// 触发快速重传的重复ACK数量。
    pub dup_ack_threshold: u32,
    /// Whether limited transmit is performed below the duplicate-ACK
    /// threshold.
    /// 是否在重复ACK阈值以下执行受限传输。
    pub limited_transmit: bool,
}

/// Retransmission-related parameters.
///
/// 重传相关参数。
#[derive(Debug, Clone)]
pub struct RetransmissionConfig {
    /// The initial retransmission timeout for a new subflow.
    /// 新子流的初始重传超时时间。
    pub initial_rto: Duration,
    /// The minimum RTO value. The RTO will not be allowed to fall below this.
    /// 最小RTO值。RTO不允许低于此值。
    pub min_rto: Duration,
    /// Consecutive timeouts without progress before the subflow gives up
    /// and reports a connection failure.
    /// 在子流放弃并报告连接失败之前，无任何进展的连续超时次数。
    pub max_consecutive_timeouts: u32,
}

/// Subflow state machine parameters.
///
/// 子流状态机参数。
#[derive(Debug, Clone)]
pub struct SubflowConfig {
    /// Whether this subflow is a backup path, used only when the regular
    /// paths have failed. May be toggled later by a priority signal.
    /// 此子流是否为备份路径，仅在常规路径全部失败时使用。
    /// 之后可由优先级信号切换。
    pub backup: bool,
    /// The receive window advertised to the peer, in bytes.
    /// 向对端通告的接收窗口（字节）。
    pub advertised_window: u32,
    /// Protocol violations tolerated before the subflow forcibly closes.
    /// 在子流强制关闭之前可容忍的协议违规次数。
    pub max_violations: u32,
    /// How long a closed subflow lingers in TimeWait before its timers are
    /// cancelled and its mapping tables are discarded.
    /// 已关闭的子流在取消定时器并丢弃映射表之前，
    /// 在TimeWait状态停留的时长。
    pub time_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            congestion: CongestionConfig::default(),
            retransmission: RetransmissionConfig::default(),
            subflow: SubflowConfig::default(),
        }
    }
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            segment_size: 1400,
            initial_cwnd_segments: 1,
            initial_ssthresh: u32::MAX,
            dup_ack_threshold: 3,
            limited_transmit: true,
        }
    }
}

impl Default for RetransmissionConfig {
    fn default() -> Self {
        Self {
            initial_rto: Duration::from_millis(1000),
            min_rto: Duration::from_millis(200),
            max_consecutive_timeouts: 6,
        }
    }
}

impl Default for SubflowConfig {
    fn default() -> Self {
        Self {
            backup: false,
            advertised_window: 64 * 1024,
            max_violations: 3,
            time_wait: Duration::from_secs(2),
        }
    }
}
