//! 元连接注册表：子流通过不透明标识符反向引用其元连接。
//! The meta-connection registry: subflows back-reference their
//! meta-connection through an opaque identifier.
//!
//! A subflow never owns its meta-connection. It carries a [`MetaId`] and the
//! aggregator resolves it here — to find the token a joining peer must
//! present, or to route an inbound join to the right meta-connection.
//!
//! 子流从不拥有其元连接。它携带一个 [`MetaId`]，由聚合器在此解析 ——
//! 用于查找加入方必须出示的令牌，或将入站加入路由到正确的元连接。

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// An opaque handle to a meta-connection. Only the registry can resolve it.
/// 元连接的不透明句柄。只有注册表能解析它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetaId(u64);

/// The identity a subflow carries for its whole lifetime. Everything here
/// is fixed by the handshake except the backup flag, which a priority
/// signal may flip.
///
/// 子流在整个生命周期中携带的身份。除了优先级信号可以翻转的备份标志外,
/// 这里的一切都由握手确定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubflowIdentity {
    /// The meta-connection this subflow belongs to.
    /// 此子流所属的元连接。
    pub meta: MetaId,
    /// The subflow's position among its meta-connection's subflows, assigned
    /// at attach time; the master is route 0.
    /// 此子流在其元连接的子流中的位置，附着时分配；主子流为路由0。
    pub route_id: u16,
    /// Whether this is the meta-connection's master subflow.
    /// 是否为元连接的主子流。
    pub is_master: bool,
    /// Whether this subflow is currently a backup path.
    /// 此子流当前是否为备份路径。
    pub is_backup: bool,
    /// The meta-connection token established by the handshake.
    /// 握手建立的元连接令牌。
    pub token: u32,
}

/// Bookkeeping the registry holds per meta-connection.
/// 注册表为每个元连接保存的记录。
#[derive(Debug, Clone, Copy)]
struct MetaEntry {
    token: u32,
    subflows: usize,
    /// The next route to hand out; routes of departed subflows are not
    /// reused.
    /// 下一个待分配的路由号；离开子流的路由号不复用。
    next_route: u16,
}

/// A concurrent registry mapping opaque identifiers to meta-connection
/// tokens, and tokens back to identifiers for inbound joins.
///
/// 并发注册表：将不透明标识符映射到元连接令牌，
/// 并将令牌反向映射到标识符以处理入站加入。
#[derive(Debug, Default)]
pub struct MetaRegistry {
    entries: DashMap<MetaId, MetaEntry>,
    by_token: DashMap<u32, MetaId>,
    next_id: AtomicU64,
}

impl MetaRegistry {
    /// Creates an empty registry.
    /// 创建一个空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly established meta-connection under its token and
    /// returns its opaque identifier. The registering master subflow holds
    /// route 0.
    ///
    /// 以其令牌注册一个新建立的元连接，返回其不透明标识符。
    /// 注册的主子流持有路由0。
    pub fn register(&self, token: u32) -> MetaId {
        let id = MetaId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(
            id,
            MetaEntry {
                token,
                subflows: 1,
                next_route: 1,
            },
        );
        self.by_token.insert(token, id);
        debug!(?id, token = format_args!("{token:#010x}"), "meta-connection registered");
        id
    }

    /// Resolves an identifier to the meta-connection's token.
    /// 将标识符解析为元连接的令牌。
    pub fn token_of(&self, id: MetaId) -> Result<u32> {
        self.entries
            .get(&id)
            .map(|entry| entry.token)
            .ok_or(Error::UnknownMeta)
    }

    /// Finds the meta-connection an inbound join with this token targets.
    /// 查找携带此令牌的入站加入所指向的元连接。
    pub fn resolve_token(&self, token: u32) -> Option<MetaId> {
        self.by_token.get(&token).map(|id| *id)
    }

    /// Records one more subflow attached to the meta-connection and returns
    /// the route assigned to it.
    /// 记录元连接上新增的一个子流，并返回为其分配的路由号。
    pub fn attach_subflow(&self, id: MetaId) -> Result<u16> {
        let mut entry = self.entries.get_mut(&id).ok_or(Error::UnknownMeta)?;
        entry.subflows += 1;
        let route = entry.next_route;
        entry.next_route = entry.next_route.wrapping_add(1);
        Ok(route)
    }

    /// Records a subflow's departure. The meta-connection is deregistered
    /// once its last subflow detaches.
    ///
    /// 记录一个子流的离开。最后一个子流离开后元连接即被注销。
    pub fn detach_subflow(&self, id: MetaId) -> Result<()> {
        let remaining = {
            let mut entry = self.entries.get_mut(&id).ok_or(Error::UnknownMeta)?;
            entry.subflows = entry.subflows.saturating_sub(1);
            entry.subflows
        };
        if remaining == 0 {
            if let Some((_, entry)) = self.entries.remove(&id) {
                self.by_token.remove(&entry.token);
                debug!(?id, "meta-connection deregistered");
            }
        }
        Ok(())
    }

    /// The number of subflows currently attached.
    /// 当前附着的子流数量。
    pub fn subflow_count(&self, id: MetaId) -> Result<usize> {
        self.entries
            .get(&id)
            .map(|entry| entry.subflows)
            .ok_or(Error::UnknownMeta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = MetaRegistry::new();
        let id = registry.register(0xacc8_ab6b);

        assert_eq!(registry.token_of(id), Ok(0xacc8_ab6b));
        assert_eq!(registry.resolve_token(0xacc8_ab6b), Some(id));
        assert_eq!(registry.resolve_token(0xdead_beef), None);
    }

    #[test]
    fn test_unknown_identifier_is_an_error() {
        let registry = MetaRegistry::new();
        let id = registry.register(1);
        registry.detach_subflow(id).unwrap();

        assert_eq!(registry.token_of(id), Err(Error::UnknownMeta));
        assert_eq!(registry.attach_subflow(id), Err(Error::UnknownMeta));
    }

    #[test]
    fn test_last_detach_deregisters() {
        let registry = MetaRegistry::new();
        let id = registry.register(42);
        registry.attach_subflow(id).unwrap();
        assert_eq!(registry.subflow_count(id), Ok(2));

        registry.detach_subflow(id).unwrap();
        assert_eq!(registry.subflow_count(id), Ok(1));
        assert_eq!(registry.resolve_token(42), Some(id));

        registry.detach_subflow(id).unwrap();
        assert_eq!(registry.resolve_token(42), None);
        assert_eq!(registry.token_of(id), Err(Error::UnknownMeta));
    }

    #[test]
    fn test_routes_assigned_in_attach_order() {
        let registry = MetaRegistry::new();
        let id = registry.register(9);

        // Route 0 belongs to the registering master.
        assert_eq!(registry.attach_subflow(id), Ok(1));
        assert_eq!(registry.attach_subflow(id), Ok(2));

        // A departed subflow's route is not handed out again.
        registry.detach_subflow(id).unwrap();
        assert_eq!(registry.attach_subflow(id), Ok(3));
    }

    #[test]
    fn test_identifiers_are_unique() {
        let registry = MetaRegistry::new();
        let a = registry.register(1);
        let b = registry.register(2);
        assert_ne!(a, b);
    }
}
