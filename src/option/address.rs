//! 定义了地址通告、撤回和优先级选项。
//! Defines the address advertisement, withdrawal and priority options.
//!
//! These are thin pass-throughs: the engine surfaces them as events for the
//! external address-management collaborator and keeps no policy of its own.
//!
//! 这些是轻量透传选项：引擎将其作为事件交给外部地址管理协作方，
//! 自身不保留任何策略。

use bytes::{Buf, BufMut};
use std::net::Ipv4Addr;

/// Flag bit in the priority option: the sender asks to be a backup path.
/// 优先级选项中的标志位：发送方请求成为备份路径。
const FLAG_BACKUP: u8 = 0x1;

/// Advertisement of an additional address the sender is reachable at.
/// 通告发送方可达的一个额外地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAddress {
    /// The sender-scoped identifier for this address.
    /// 发送方作用域内该地址的标识符。
    pub address_id: u8,
    /// The advertised IPv4 address.
    /// 通告的IPv4地址。
    pub address: Ipv4Addr,
    /// The advertised port.
    /// 通告的端口。
    pub port: u16,
}

impl AddAddress {
    /// The size of the option body on the wire.
    /// 选项主体在网络传输中的大小。
    pub const BODY_SIZE: usize = 7;

    /// 将选项主体编码到缓冲区。
    /// Encodes the option body into a buffer.
    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.address_id);
        buf.put_slice(&self.address.octets());
        buf.put_u16(self.port);
    }

    /// 从缓冲区解码选项主体。
    /// Decodes the option body from a buffer.
    pub fn decode_body<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < Self::BODY_SIZE {
            return None;
        }
        let address_id = buf.get_u8();
        let mut octets = [0u8; 4];
        buf.copy_to_slice(&mut octets);
        Some(Self {
            address_id,
            address: Ipv4Addr::from(octets),
            port: buf.get_u16(),
        })
    }
}

/// Withdrawal of a previously advertised address.
/// 撤回先前通告的地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveAddress {
    /// The identifier of the address being withdrawn.
    /// 被撤回地址的标识符。
    pub address_id: u8,
}

impl RemoveAddress {
    /// The size of the option body on the wire.
    /// 选项主体在网络传输中的大小。
    pub const BODY_SIZE: usize = 1;

    /// 将选项主体编码到缓冲区。
    /// Encodes the option body into a buffer.
    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.address_id);
    }

    /// 从缓冲区解码选项主体。
    /// Decodes the option body from a buffer.
    pub fn decode_body<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < Self::BODY_SIZE {
            return None;
        }
        Some(Self {
            address_id: buf.get_u8(),
        })
    }
}

/// Backup-priority change signal. The only identity field a peer may mutate
/// after the handshake completes.
/// 备份优先级变更信号。握手完成后对端唯一可以改变的身份字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    /// Whether the sending subflow should be treated as a backup path.
    /// 发送方子流是否应被视为备份路径。
    pub backup: bool,
}

impl Priority {
    /// The size of the option body on the wire. The flag rides in the
    /// subtype byte's low nibble; the body is empty.
    /// 选项主体在网络传输中的大小。标志位于子类型字节的低4位；主体为空。
    pub const BODY_SIZE: usize = 0;

    /// The flag nibble carried in the subtype byte.
    /// 子类型字节中携带的标志半字节。
    pub fn flag_nibble(&self) -> u8 {
        if self.backup { FLAG_BACKUP } else { 0 }
    }

    /// 将选项主体编码到缓冲区（主体为空）。
    /// Encodes the option body into a buffer (the body is empty).
    pub fn encode_body<B: BufMut>(&self, _buf: &mut B) {}

    /// 根据标志半字节解码选项。
    /// Decodes the option from the flag nibble.
    pub fn decode_body<B: Buf>(flags: u8, _buf: &mut B) -> Option<Self> {
        Some(Self {
            backup: flags & FLAG_BACKUP != 0,
        })
    }
}
