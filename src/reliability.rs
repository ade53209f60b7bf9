//! The reliability layer: round-trip estimation and retransmission state.
//!
//! The subflow state machine owns the in-flight segment store; this layer
//! keeps the timer arithmetic, duplicate-ACK accounting and backoff rules
//! that decide when and what gets resent.
//!
//! 可靠性层：往返时间估算与重传状态。
//!
//! 子流状态机拥有在途报文段存储；本层负责定时器运算、
//! 重复ACK记账和退避规则，决定何时重发以及重发什么。

pub mod retransmission;
pub mod rtt;
