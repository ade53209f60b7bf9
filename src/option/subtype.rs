//! 定义协议的所有选项子类型。
//! Defines all option subtypes for the protocol.

use std::fmt;

/// The subtype of a multipath option. The high nibble of the third byte on
/// the wire; the low nibble carries per-option flags.
/// 多路径选项的子类型。位于网络传输第三个字节的高4位；低4位携带各选项的标志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionSubtype {
    /// Connection-capability establishment (master subflow only).
    /// 连接能力建立（仅主子流）。
    Capable = 0x0,
    /// Token-based join for additional subflows.
    /// 额外子流基于令牌的加入。
    Join = 0x1,
    /// Data-sequence signal carrying a mapping.
    /// 携带映射的数据序列信号。
    Dss = 0x2,
    /// Address advertisement.
    /// 地址通告。
    AddAddress = 0x3,
    /// Address withdrawal.
    /// 地址撤回。
    RemoveAddress = 0x4,
    /// Backup-priority change.
    /// 备份优先级变更。
    Priority = 0x5,
}

impl OptionSubtype {
    /// 从一个半字节尝试转换成 `OptionSubtype`。
    /// Tries to convert a nibble into an `OptionSubtype`.
    pub fn from_u8(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(OptionSubtype::Capable),
            0x1 => Some(OptionSubtype::Join),
            0x2 => Some(OptionSubtype::Dss),
            0x3 => Some(OptionSubtype::AddAddress),
            0x4 => Some(OptionSubtype::RemoveAddress),
            0x5 => Some(OptionSubtype::Priority),
            _ => None,
        }
    }
}

impl fmt::Display for OptionSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptionSubtype::Capable => "MP_CAPABLE",
            OptionSubtype::Join => "MP_JOIN",
            OptionSubtype::Dss => "DSS",
            OptionSubtype::AddAddress => "ADD_ADDR",
            OptionSubtype::RemoveAddress => "REMOVE_ADDR",
            OptionSubtype::Priority => "MP_PRIO",
        };
        write!(f, "{}", s)
    }
}
