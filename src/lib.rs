#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the multipath subflow protocol engine library.
//! 多路径子流协议引擎库的根。

pub mod config;
pub mod error;
pub mod option;
pub mod segment;

pub mod congestion;
pub mod handshake;
pub mod mapping;
pub mod meta;
pub mod reliability;
pub mod subflow;
