//! 定义了携带数据序列映射的DSS选项。
//! Defines the DSS option carrying a data-sequence mapping.

use crate::mapping::Mapping;
use bytes::{Buf, BufMut};

/// Flag bit: the data-sequence number is carried as 8 bytes instead of 4.
/// 标志位：数据序列号以8字节而非4字节承载。
const FLAG_DSN_WIDE: u8 = 0x1;
/// Flag bit: a 2-byte checksum trails the mapping fields.
/// 标志位：映射字段之后跟随2字节校验和。
const FLAG_CHECKSUM: u8 = 0x2;

/// The data-sequence-signal option. Relates a range of the meta-connection's
/// data sequence space to this subflow's sequence space.
/// 数据序列信号选项。将元连接数据序列空间的一段范围关联到本子流的序列空间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dss {
    /// The starting data-sequence number of the mapped range.
    /// 映射范围的起始数据序列号。
    pub data_sequence: u64,
    /// Whether the data-sequence number is encoded as 8 bytes.
    /// 数据序列号是否以8字节编码。
    pub wide_dsn: bool,
    /// The starting subflow-sequence number of the mapped range.
    /// 映射范围的起始子流序列号。
    pub subflow_sequence: u32,
    /// The data-level length of the mapped range.
    /// 映射范围的数据级长度。
    pub data_level_length: u16,
    /// Optional checksum over the mapped data. Carried verbatim; payload
    /// integrity is the lower layer's concern.
    /// 可选的映射数据校验和。原样携带；载荷完整性由下层负责。
    pub checksum: Option<u16>,
}

impl Dss {
    /// Builds a DSS option describing `mapping`. A data-sequence number that
    /// fits in 32 bits is encoded in the short form.
    ///
    /// 构建描述 `mapping` 的DSS选项。能放入32位的数据序列号以短格式编码。
    pub fn from_mapping(mapping: &Mapping) -> Self {
        Self {
            data_sequence: mapping.data_sequence,
            wide_dsn: mapping.data_sequence > u32::MAX as u64,
            subflow_sequence: mapping.subflow_sequence,
            data_level_length: mapping.length as u16,
            checksum: None,
        }
    }

    /// Converts the option back into a `Mapping`.
    /// 将选项转换回 `Mapping`。
    pub fn to_mapping(&self) -> Mapping {
        Mapping::new(
            self.data_sequence,
            self.data_level_length as u32,
            self.subflow_sequence,
        )
    }

    /// The flag nibble carried in the subtype byte.
    /// 子类型字节中携带的标志半字节。
    pub fn flag_nibble(&self) -> u8 {
        let mut flags = 0;
        if self.wide_dsn {
            flags |= FLAG_DSN_WIDE;
        }
        if self.checksum.is_some() {
            flags |= FLAG_CHECKSUM;
        }
        flags
    }

    /// The size of the option body on the wire.
    /// 选项主体在网络传输中的大小。
    pub fn body_size(&self) -> usize {
        let dsn = if self.wide_dsn { 8 } else { 4 };
        let checksum = if self.checksum.is_some() { 2 } else { 0 };
        dsn + 4 + 2 + checksum
    }

    /// 将选项主体编码到缓冲区。
    /// Encodes the option body into a buffer.
    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        if self.wide_dsn {
            buf.put_u64(self.data_sequence);
        } else {
            buf.put_u32(self.data_sequence as u32);
        }
        buf.put_u32(self.subflow_sequence);
        buf.put_u16(self.data_level_length);
        if let Some(checksum) = self.checksum {
            buf.put_u16(checksum);
        }
    }

    /// 根据标志半字节从缓冲区解码选项主体。
    /// Decodes the option body from a buffer, guided by the flag nibble.
    pub fn decode_body<B: Buf>(flags: u8, buf: &mut B) -> Option<Self> {
        let wide_dsn = flags & FLAG_DSN_WIDE != 0;
        let has_checksum = flags & FLAG_CHECKSUM != 0;
        let dsn_size = if wide_dsn { 8 } else { 4 };
        let checksum_size = if has_checksum { 2 } else { 0 };
        if buf.remaining() < dsn_size + 4 + 2 + checksum_size {
            return None;
        }
        let data_sequence = if wide_dsn {
            buf.get_u64()
        } else {
            buf.get_u32() as u64
        };
        let subflow_sequence = buf.get_u32();
        let data_level_length = buf.get_u16();
        let checksum = if has_checksum {
            Some(buf.get_u16())
        } else {
            None
        };
        Some(Self {
            data_sequence,
            wide_dsn,
            subflow_sequence,
            data_level_length,
            checksum,
        })
    }
}
