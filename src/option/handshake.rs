//! 定义了三次握手期间使用的建立选项。
//! Defines the establishment options used during the three-way handshake.

use bytes::{Buf, BufMut};

/// The capability option, carrying the local 8-byte key. Only the master
/// subflow of a meta-connection is permitted to send it.
/// 能力选项，携带本地8字节密钥。仅元连接的主子流可以发送。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capable {
    /// The sender's connection key; the peer derives the connection token
    /// from it.
    /// 发送方的连接密钥；对端由其推导连接令牌。
    pub key: u64,
}

impl Capable {
    /// The size of the option body on the wire.
    /// 选项主体在网络传输中的大小。
    pub const BODY_SIZE: usize = 8;

    /// 将选项主体编码到缓冲区。
    /// Encodes the option body into a buffer.
    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.key);
    }

    /// 从缓冲区解码选项主体。
    /// Decodes the option body from a buffer.
    pub fn decode_body<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < Self::BODY_SIZE {
            return None;
        }
        Some(Self { key: buf.get_u64() })
    }
}

/// The join option, carrying the expected meta-connection token and a
/// locally generated nonce. Sent by every subflow except the master.
/// 加入选项，携带期望的元连接令牌和本地生成的随机数。
/// 由除主子流外的所有子流发送。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    /// The token of the meta-connection this subflow wants to join.
    /// 此子流希望加入的元连接的令牌。
    pub token: u32,
    /// A locally generated random nonce.
    /// 本地生成的随机数。
    pub nonce: u32,
}

impl Join {
    /// The size of the option body on the wire.
    /// 选项主体在网络传输中的大小。
    pub const BODY_SIZE: usize = 8;

    /// 将选项主体编码到缓冲区。
    /// Encodes the option body into a buffer.
    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.token);
        buf.put_u32(self.nonce);
    }

    /// 从缓冲区解码选项主体。
    /// Decodes the option body from a buffer.
    pub fn decode_body<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < Self::BODY_SIZE {
            return None;
        }
        Some(Self {
            token: buf.get_u32(),
            nonce: buf.get_u32(),
        })
    }
}
