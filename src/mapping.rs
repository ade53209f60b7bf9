//! 管理数据序列空间与子流序列空间之间的映射，包括非重叠插入、
//! 按映射提取载荷以及确认后的清理。
//! Manages the mappings between the data-sequence space and the subflow
//! sequence space: non-overlapping insertion, per-mapping payload
//! extraction, and cleanup after acknowledgment.

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, btree_map::Entry};
use tracing::trace;

/// A record relating a range of the meta-connection's data sequence space
/// to this subflow's sequence space.
/// 将元连接数据序列空间的一段范围关联到本子流序列空间的记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// The starting data-sequence number.
    /// 起始数据序列号。
    pub data_sequence: u64,
    /// The length of the mapped range, in bytes.
    /// 映射范围的长度（字节）。
    pub length: u32,
    /// The starting subflow-sequence number.
    /// 起始子流序列号。
    pub subflow_sequence: u32,
}

impl Mapping {
    /// Creates a new mapping.
    /// 创建一个新映射。
    pub fn new(data_sequence: u64, length: u32, subflow_sequence: u32) -> Self {
        debug_assert!(length > 0);
        Self {
            data_sequence,
            length,
            subflow_sequence,
        }
    }

    /// The subflow-sequence number just past the mapped range.
    /// 刚好越过映射范围的子流序列号。
    pub fn subflow_end(&self) -> u32 {
        self.subflow_sequence + self.length
    }

    /// The data-sequence number just past the mapped range.
    /// 刚好越过映射范围的数据序列号。
    pub fn data_end(&self) -> u64 {
        self.data_sequence + self.length as u64
    }

    /// Checks whether the subflow-sequence ranges of two mappings intersect.
    /// 检查两个映射的子流序列号范围是否相交。
    pub fn overlaps(&self, other: &Mapping) -> bool {
        self.subflow_sequence < other.subflow_end() && other.subflow_sequence < self.subflow_end()
    }
}

/// An ordered collection of mappings for one direction (send or receive).
///
/// On the receive side the table also accumulates the payload bytes arriving
/// for each mapping, so a mapping can be extracted only once its declared
/// range is fully covered.
///
/// 单个方向（发送或接收）的有序映射集合。
///
/// 在接收侧，表还会累积每个映射到达的载荷字节，
/// 因此只有在声明的范围被完全覆盖后才能提取映射。
#[derive(Debug, Default)]
pub struct MappingTable {
    /// Mappings keyed by their starting subflow-sequence number.
    /// 以起始子流序列号为键的映射。
    mappings: BTreeMap<u32, Mapping>,
    /// Received payload chunks keyed by subflow-sequence number
    /// (receive side only).
    /// 以子流序列号为键的已接收载荷块（仅接收侧）。
    payloads: BTreeMap<u32, Bytes>,
    /// Everything below this subflow-sequence number has been extracted.
    /// 低于此子流序列号的数据均已被提取。
    delivered: u32,
}

impl MappingTable {
    /// Creates an empty table.
    /// 创建一个空表。
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mapping, preserving subflow-sequence order.
    ///
    /// Re-inserting an identical mapping is a no-op so retransmitted
    /// segments re-announcing their mapping are harmless. Any partial
    /// intersection fails with [`Error::MappingConflict`] and leaves the
    /// table unchanged.
    ///
    /// 插入一个映射，保持子流序列号有序。
    ///
    /// 重复插入完全相同的映射是无操作，因此重传报文段重新声明其映射无害。
    /// 任何部分相交都会以 [`Error::MappingConflict`] 失败且不改变表。
    pub fn insert(&mut self, mapping: Mapping) -> Result<()> {
        if let Some(existing) = self.mappings.get(&mapping.subflow_sequence) {
            if *existing == mapping {
                return Ok(());
            }
            return Err(Error::MappingConflict);
        }
        if let Some((_, prev)) = self
            .mappings
            .range(..mapping.subflow_sequence)
            .next_back()
        {
            if prev.overlaps(&mapping) {
                return Err(Error::MappingConflict);
            }
        }
        if let Some((_, next)) = self.mappings.range(mapping.subflow_sequence..).next() {
            if next.overlaps(&mapping) {
                return Err(Error::MappingConflict);
            }
        }
        trace!(
            dsn = mapping.data_sequence,
            ssn = mapping.subflow_sequence,
            len = mapping.length,
            "mapping registered"
        );
        self.mappings.insert(mapping.subflow_sequence, mapping);
        Ok(())
    }

    /// Records a received payload chunk at the given subflow-sequence
    /// number. Returns `true` if the chunk was accepted, `false` if it was
    /// a duplicate or already delivered.
    ///
    /// 在给定子流序列号处记录一个已接收的载荷块。
    /// 若被接受返回 `true`，重复或已交付则返回 `false`。
    pub fn push_payload(&mut self, subflow_sequence: u32, data: Bytes) -> bool {
        if data.is_empty() || subflow_sequence < self.delivered {
            return false;
        }
        match self.payloads.entry(subflow_sequence) {
            Entry::Vacant(entry) => {
                entry.insert(data);
                true
            }
            // Retransmitted chunk, ignore.
            Entry::Occupied(_) => false,
        }
    }

    /// Selects the earliest mapping whose payload is ready and extracts at
    /// most one mapping's worth of bytes.
    ///
    /// With `only_full_mappings` set, nothing is returned until the
    /// mapping's full declared length is buffered (and fits in `max_size`);
    /// this is backpressure, not an error — the caller re-invokes when more
    /// data arrives. On success the mapping's starting data-sequence number
    /// is written to `dsn_out` and the mapping is removed or shrunk.
    ///
    /// 选择最早的载荷就绪的映射，最多提取一个映射的数据。
    ///
    /// 设置 `only_full_mappings` 时，在映射声明的完整长度缓冲完毕
    /// （且能放入 `max_size`）之前不返回任何内容；这是背压而非错误 ——
    /// 调用方在更多数据到达时重新调用。成功时映射的起始数据序列号
    /// 写入 `dsn_out`，映射随之被移除或收缩。
    pub fn extract_at_most_one(
        &mut self,
        max_size: usize,
        only_full_mappings: bool,
        dsn_out: &mut u64,
    ) -> Option<Bytes> {
        let mapping = *self.mappings.values().next()?;

        // Contiguous bytes buffered from the start of the mapping.
        let mut available: u32 = 0;
        let mut cursor = mapping.subflow_sequence;
        for (&chunk_start, chunk) in self.payloads.range(mapping.subflow_sequence..) {
            if chunk_start != cursor {
                break;
            }
            available += chunk.len() as u32;
            cursor += chunk.len() as u32;
            if available >= mapping.length {
                break;
            }
        }
        available = available.min(mapping.length);

        let take = if only_full_mappings {
            if available < mapping.length || mapping.length as usize > max_size {
                return None;
            }
            mapping.length
        } else {
            let room = u32::try_from(max_size).unwrap_or(u32::MAX);
            let take = available.min(room);
            if take == 0 {
                return None;
            }
            take
        };

        let mut out = BytesMut::with_capacity(take as usize);
        let mut cursor = mapping.subflow_sequence;
        while (out.len() as u32) < take {
            let Some(mut chunk) = self.payloads.remove(&cursor) else {
                // Contiguity was established above.
                break;
            };
            let need = take as usize - out.len();
            if chunk.len() > need {
                out.extend_from_slice(&chunk.split_to(need));
                cursor += need as u32;
                self.payloads.insert(cursor, chunk);
            } else {
                cursor += chunk.len() as u32;
                out.extend_from_slice(&chunk);
            }
        }
        self.delivered = cursor;

        *dsn_out = mapping.data_sequence;
        self.mappings.remove(&mapping.subflow_sequence);
        if take < mapping.length {
            let rest = Mapping::new(
                mapping.data_sequence + take as u64,
                mapping.length - take,
                mapping.subflow_sequence + take,
            );
            self.mappings.insert(rest.subflow_sequence, rest);
        }
        trace!(
            dsn = mapping.data_sequence,
            taken = take,
            remaining = mapping.length - take,
            "mapping extracted"
        );
        Some(out.freeze())
    }

    /// Drops mappings fully covered by a newly acknowledged subflow-sequence
    /// prefix. Called from ACK processing on the send side.
    ///
    /// 丢弃被新确认的子流序列号前缀完全覆盖的映射。
    /// 在发送侧的ACK处理中调用。
    pub fn remove_acked(&mut self, subflow_seq_up_to: u32) {
        while let Some((&start, mapping)) = self.mappings.first_key_value() {
            if mapping.subflow_end() <= subflow_seq_up_to {
                self.mappings.remove(&start);
            } else {
                break;
            }
        }
    }

    /// The earliest mapping in the table, if any.
    /// 表中最早的映射（如果存在）。
    pub fn first(&self) -> Option<&Mapping> {
        self.mappings.values().next()
    }

    /// The number of mappings in the table.
    /// 表中的映射数量。
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Checks whether the table holds no mappings.
    /// 检查表中是否没有映射。
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Discards all mappings and buffered payload.
    /// 丢弃所有映射和缓冲的载荷。
    pub fn clear(&mut self) {
        self.mappings.clear();
        self.payloads.clear();
    }
}
