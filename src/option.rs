//! 定义了承载在传输头选项区内的多路径协议选项。
//! Defines the multipath protocol options carried inside the transport
//! header's options area.

pub mod address;
pub mod dss;
pub mod handshake;
pub mod subtype;

#[cfg(test)]
mod tests;

use self::{
    address::{AddAddress, Priority, RemoveAddress},
    dss::Dss,
    handshake::{Capable, Join},
    subtype::OptionSubtype,
};
use bytes::{Buf, BufMut};

/// The option kind identifying a multipath option on the wire.
/// 标识多路径选项的选项类型编号。
pub const OPTION_KIND: u8 = 30;

/// A complete multipath option that can be sent or received.
/// 一个可以被发送或接收的完整多路径选项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpOption {
    /// Connection-capability establishment, sent by the master subflow only.
    /// 连接能力建立选项，仅由主子流发送。
    Capable(Capable),
    /// Token-based join, sent by every non-master subflow.
    /// 基于令牌的加入选项，由所有非主子流发送。
    Join(Join),
    /// Data-sequence signal carrying one mapping.
    /// 携带一个映射的数据序列信号。
    Dss(Dss),
    /// Advertisement of an additional local address.
    /// 通告一个额外的本地地址。
    AddAddress(AddAddress),
    /// Withdrawal of a previously advertised address.
    /// 撤回先前通告的地址。
    RemoveAddress(RemoveAddress),
    /// Backup-priority change signal.
    /// 备份优先级变更信号。
    Priority(Priority),
}

impl MpOption {
    /// 获取选项的子类型。
    /// Gets the subtype of the option.
    pub fn subtype(&self) -> OptionSubtype {
        match self {
            MpOption::Capable(_) => OptionSubtype::Capable,
            MpOption::Join(_) => OptionSubtype::Join,
            MpOption::Dss(_) => OptionSubtype::Dss,
            MpOption::AddAddress(_) => OptionSubtype::AddAddress,
            MpOption::RemoveAddress(_) => OptionSubtype::RemoveAddress,
            MpOption::Priority(_) => OptionSubtype::Priority,
        }
    }

    /// Calculates the encoded size of the option, kind and length bytes
    /// included.
    ///
    /// 计算选项编码后的大小（包含kind和length字节）。
    pub fn encoded_size(&self) -> usize {
        // kind + length + subtype/flags byte, then the body.
        3 + match self {
            MpOption::Capable(_) => Capable::BODY_SIZE,
            MpOption::Join(_) => Join::BODY_SIZE,
            MpOption::Dss(dss) => dss.body_size(),
            MpOption::AddAddress(_) => AddAddress::BODY_SIZE,
            MpOption::RemoveAddress(_) => RemoveAddress::BODY_SIZE,
            MpOption::Priority(_) => Priority::BODY_SIZE,
        }
    }

    /// 将选项编码到缓冲区。
    /// Encodes the option into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(OPTION_KIND);
        buf.put_u8(self.encoded_size() as u8);
        let flags = match self {
            MpOption::Dss(dss) => dss.flag_nibble(),
            MpOption::Priority(prio) => prio.flag_nibble(),
            _ => 0,
        };
        buf.put_u8((self.subtype() as u8) << 4 | flags);
        match self {
            MpOption::Capable(capable) => capable.encode_body(buf),
            MpOption::Join(join) => join.encode_body(buf),
            MpOption::Dss(dss) => dss.encode_body(buf),
            MpOption::AddAddress(add) => add.encode_body(buf),
            MpOption::RemoveAddress(rem) => rem.encode_body(buf),
            MpOption::Priority(prio) => prio.encode_body(buf),
        }
    }

    /// Decodes a single option from the front of a buffer cursor.
    /// The cursor is advanced past the decoded option. Returns `None` on any
    /// malformed input; the caller treats that as a protocol violation.
    ///
    /// 从缓冲区光标的前端解码单个选项。
    /// 光标会前进到已解码选项之后。任何格式错误的输入都返回 `None`，
    /// 由调用方视为协议违规。
    pub fn decode(cursor: &mut &[u8]) -> Option<Self> {
        if cursor.len() < 3 {
            return None;
        }
        let kind = cursor[0];
        let length = cursor[1] as usize;
        if kind != OPTION_KIND || length < 3 || cursor.len() < length {
            return None;
        }
        let subtype = OptionSubtype::from_u8(cursor[2] >> 4)?;
        let flags = cursor[2] & 0x0f;

        let mut body = &cursor[3..length];
        let option = match subtype {
            OptionSubtype::Capable => MpOption::Capable(Capable::decode_body(&mut body)?),
            OptionSubtype::Join => MpOption::Join(Join::decode_body(&mut body)?),
            OptionSubtype::Dss => MpOption::Dss(Dss::decode_body(flags, &mut body)?),
            OptionSubtype::AddAddress => {
                MpOption::AddAddress(AddAddress::decode_body(&mut body)?)
            }
            OptionSubtype::RemoveAddress => {
                MpOption::RemoveAddress(RemoveAddress::decode_body(&mut body)?)
            }
            OptionSubtype::Priority => MpOption::Priority(Priority::decode_body(flags, &mut body)?),
        };
        // A correct option consumes its declared length exactly.
        if !body.is_empty() {
            return None;
        }
        cursor.advance(length);
        Some(option)
    }

    /// Encodes a list of options back-to-back into a buffer.
    /// 将选项列表背靠背地编码到缓冲区中。
    pub fn encode_all<B: BufMut>(options: &[MpOption], buf: &mut B) {
        for option in options {
            option.encode(buf);
        }
    }

    /// Decodes all options from an options area. Returns `None` if any
    /// option is malformed.
    ///
    /// 从选项区解码所有选项。任何选项格式错误都返回 `None`。
    pub fn decode_all(mut cursor: &[u8]) -> Option<Vec<MpOption>> {
        let mut options = Vec::new();
        while !cursor.is_empty() {
            options.push(Self::decode(&mut cursor)?);
        }
        Some(options)
    }
}
