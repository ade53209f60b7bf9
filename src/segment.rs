//! 定义了子流级报文段：状态机消费和产生的传输单元。
//! Defines the subflow-level segment, the unit the state machine consumes
//! and produces.
//!
//! Lower-layer delivery is out of scope, so segments stay in memory; only
//! the multipath options have a wire format (see [`crate::option`]).
//!
//! 下层投递不在范围内，因此报文段保留在内存中；
//! 只有多路径选项具有线路格式（见 [`crate::option`]）。

use crate::option::{
    MpOption,
    dss::Dss,
    handshake::{Capable, Join},
};
use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// The control flags of a segment.
    /// 报文段的控制标志。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u8 {
        const SYN = 0b0001;
        const ACK = 0b0010;
        const FIN = 0b0100;
        const RST = 0b1000;
    }
}

/// A subflow-level segment.
/// 子流级报文段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Control flags.
    /// 控制标志。
    pub flags: SegmentFlags,
    /// The subflow-level sequence number of the first payload byte.
    /// 首个载荷字节的子流级序列号。
    pub sequence: u32,
    /// The cumulative acknowledgment number (valid when ACK is set).
    /// 累积确认号（ACK置位时有效）。
    pub ack: u32,
    /// The sender's advertised receive window, in bytes.
    /// 发送方通告的接收窗口（字节）。
    pub window: u32,
    /// Multipath options carried in the header's options area.
    /// 头部选项区携带的多路径选项。
    pub options: Vec<MpOption>,
    /// The payload.
    /// 载荷。
    pub payload: Bytes,
}

impl Segment {
    // --- Smart Constructors ---
    // 这些构造函数确保标志与携带的选项始终一致。
    // These constructors keep the flags consistent with the carried options.

    /// Creates a SYN segment carrying an establishment option.
    /// 创建携带建立选项的SYN报文段。
    pub fn new_syn(sequence: u32, window: u32, establishment: MpOption) -> Self {
        Self {
            flags: SegmentFlags::SYN,
            sequence,
            ack: 0,
            window,
            options: vec![establishment],
            payload: Bytes::new(),
        }
    }

    /// Creates a SYN-ACK segment carrying an establishment option.
    /// 创建携带建立选项的SYN-ACK报文段。
    pub fn new_syn_ack(sequence: u32, ack: u32, window: u32, establishment: MpOption) -> Self {
        Self {
            flags: SegmentFlags::SYN | SegmentFlags::ACK,
            sequence,
            ack,
            window,
            options: vec![establishment],
            payload: Bytes::new(),
        }
    }

    /// Creates a bare ACK segment.
    /// 创建纯ACK报文段。
    pub fn new_ack(sequence: u32, ack: u32, window: u32) -> Self {
        Self {
            flags: SegmentFlags::ACK,
            sequence,
            ack,
            window,
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Creates a data segment carrying a DSS option and payload.
    ///
    /// A mapping may span several segments: the DSS always describes the
    /// whole mapping while the payload is the chunk starting at `sequence`,
    /// which must lie inside the mapped range.
    ///
    /// 创建携带DSS选项和载荷的数据报文段。
    ///
    /// 一个映射可以跨越多个报文段：DSS始终描述完整的映射，
    /// 而载荷是从 `sequence` 开始的块，必须位于映射范围之内。
    pub fn new_data(sequence: u32, ack: u32, window: u32, dss: Dss, payload: Bytes) -> Self {
        debug_assert!(dss.subflow_sequence <= sequence);
        debug_assert!(
            sequence as u64 + payload.len() as u64
                <= dss.subflow_sequence as u64 + dss.data_level_length as u64
        );
        Self {
            flags: SegmentFlags::ACK,
            sequence,
            ack,
            window,
            options: vec![MpOption::Dss(dss)],
            payload,
        }
    }

    /// Creates a FIN segment.
    /// 创建FIN报文段。
    pub fn new_fin(sequence: u32, ack: u32, window: u32) -> Self {
        Self {
            flags: SegmentFlags::FIN | SegmentFlags::ACK,
            sequence,
            ack,
            window,
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Creates an RST segment.
    /// 创建RST报文段。
    pub fn new_rst(sequence: u32) -> Self {
        Self {
            flags: SegmentFlags::RST,
            sequence,
            ack: 0,
            window: 0,
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Creates an ACK segment carrying one control option (address
    /// advertisement, withdrawal, or priority change).
    /// 创建携带单个控制选项（地址通告、撤回或优先级变更）的ACK报文段。
    pub fn new_control(sequence: u32, ack: u32, window: u32, option: MpOption) -> Self {
        Self {
            flags: SegmentFlags::ACK,
            sequence,
            ack,
            window,
            options: vec![option],
            payload: Bytes::new(),
        }
    }

    // --- End of Smart Constructors ---

    /// The subflow-sequence number just past this segment's payload.
    /// 刚好越过本报文段载荷的子流序列号。
    pub fn sequence_end(&self) -> u32 {
        self.sequence.wrapping_add(self.payload.len() as u32)
    }

    /// 获取报文段携带的能力选项（如果存在）。
    /// Gets the capability option carried by the segment, if any.
    pub fn capable(&self) -> Option<&Capable> {
        self.options.iter().find_map(|option| match option {
            MpOption::Capable(capable) => Some(capable),
            _ => None,
        })
    }

    /// 获取报文段携带的加入选项（如果存在）。
    /// Gets the join option carried by the segment, if any.
    pub fn join(&self) -> Option<&Join> {
        self.options.iter().find_map(|option| match option {
            MpOption::Join(join) => Some(join),
            _ => None,
        })
    }

    /// 获取报文段携带的DSS选项（如果存在）。
    /// Gets the DSS option carried by the segment, if any.
    pub fn dss(&self) -> Option<&Dss> {
        self.options.iter().find_map(|option| match option {
            MpOption::Dss(dss) => Some(dss),
            _ => None,
        })
    }
}
