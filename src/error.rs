//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the subflow protocol engine.
/// 子流协议引擎的主要错误类型。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A new mapping's subflow-sequence range intersects an existing one.
    /// The offending segment is dropped; the connection survives.
    /// 新映射的子流序列号范围与已有映射相交。
    /// 丢弃该报文段；连接不受影响。
    #[error("mapping conflicts with an existing subflow-sequence range")]
    MappingConflict,

    /// A joined subflow presented a token that does not match the
    /// meta-connection's established token.
    /// 加入的子流出示的令牌与元连接已建立的令牌不匹配。
    #[error("join token mismatch: expected {expected:#010x}, got {presented:#010x}")]
    TokenMismatch { expected: u32, presented: u32 },

    /// The handshake could not be completed (missing or malformed
    /// establishment option from a peer expected to speak multipath).
    /// 握手无法完成（对端缺少或携带了格式错误的建立选项）。
    #[error("handshake invalid: {0}")]
    HandshakeInvalid(&'static str),

    /// A single segment violated the protocol (malformed option, sequence
    /// number outside any plausible window). Recoverable by dropping it.
    /// 单个报文段违反了协议（选项格式错误、序列号超出任何合理窗口）。
    /// 丢弃该报文段即可恢复。
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Too many consecutive retransmission timeouts without progress.
    /// 连续多次重传超时且无任何进展。
    #[error("retransmission attempts exhausted")]
    RetransmissionExhausted,

    /// The operation requires an established subflow.
    /// 该操作要求子流处于已建立状态。
    #[error("subflow not established")]
    NotEstablished,

    /// The subflow has been closed or torn down.
    /// 子流已关闭或已被销毁。
    #[error("subflow is closed")]
    SubflowClosed,

    /// The opaque meta-connection identifier is not present in the registry.
    /// 注册表中不存在该元连接的不透明标识符。
    #[error("unknown meta-connection identifier")]
    UnknownMeta,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
