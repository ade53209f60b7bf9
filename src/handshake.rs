//! 连接建立：角色确定、令牌推导和加入验证。
//! Connection establishment: role determination, token derivation and
//! join validation.
//!
//! The first subflow of a meta-connection is the master and exchanges keys;
//! every later subflow joins by presenting the token derived from the
//! master's key. The engine here is purely computational — the subflow state
//! machine decides when each option is sent and consumed.
//!
//! 元连接的第一个子流是主子流，负责交换密钥；
//! 之后的每个子流通过出示由主密钥推导的令牌来加入。
//! 这里的引擎是纯计算的 —— 每个选项何时发送和消费由子流状态机决定。

use crate::{
    error::{Error, Result},
    option::{
        MpOption,
        handshake::{Capable, Join},
    },
};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Derives the meta-connection token from an 8-byte key: the
/// most-significant 32 bits of the SHA-1 digest of the key's big-endian
/// encoding.
///
/// 从8字节密钥推导元连接令牌：密钥大端编码的SHA-1摘要的最高32位。
pub fn generate_token(key: u64) -> u32 {
    let digest = Sha1::digest(key.to_be_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// The role a subflow plays within its meta-connection, fixed at creation.
/// 子流在其元连接中扮演的角色，在创建时确定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// The first subflow; establishes the meta-connection by exchanging keys.
    /// 第一个子流；通过交换密钥建立元连接。
    Master,
    /// A later subflow; joins an existing meta-connection by token.
    /// 之后的子流；通过令牌加入已存在的元连接。
    Joined {
        /// The token of the meta-connection being joined.
        /// 所加入元连接的令牌。
        token: u32,
    },
}

/// Per-subflow handshake state: the local key or nonce, and the
/// meta-connection token once it is fixed.
///
/// The token is fixed exactly once. For a master it is derived from the
/// initiator's key when the peer's capability option arrives; for a joined
/// subflow it is known up front and only validated.
///
/// 每个子流的握手状态：本地密钥或随机数，以及确定后的元连接令牌。
///
/// 令牌只确定一次。对主子流，它在对端能力选项到达时由发起方的密钥推导；
/// 对加入的子流，它事先已知且仅需验证。
#[derive(Debug)]
pub struct HandshakeEngine {
    role: ConnectionRole,
    /// The local connection key (meaningful for the master role).
    /// 本地连接密钥（对主角色有意义）。
    local_key: u64,
    /// The local random nonce carried in join options.
    /// 加入选项中携带的本地随机数。
    local_nonce: u32,
    /// The peer's nonce, recorded when its join option is validated.
    /// 对端的随机数，在其加入选项验证通过时记录。
    remote_nonce: Option<u32>,
    /// The meta-connection token, once fixed.
    /// 确定后的元连接令牌。
    token: Option<u32>,
}

impl HandshakeEngine {
    /// Creates the handshake state for a master subflow with a fresh
    /// random key.
    /// 为主子流创建握手状态，使用新生成的随机密钥。
    pub fn master() -> Self {
        Self {
            role: ConnectionRole::Master,
            local_key: rand::random(),
            local_nonce: rand::random(),
            remote_nonce: None,
            token: None,
        }
    }

    /// Creates the handshake state for a subflow joining the
    /// meta-connection identified by `token`.
    /// 为加入由 `token` 标识的元连接的子流创建握手状态。
    pub fn joined(token: u32) -> Self {
        Self {
            role: ConnectionRole::Joined { token },
            local_key: 0,
            local_nonce: rand::random(),
            remote_nonce: None,
            token: Some(token),
        }
    }

    /// The subflow's role.
    /// 子流的角色。
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Whether this is the master subflow.
    /// 是否为主子流。
    pub fn is_master(&self) -> bool {
        matches!(self.role, ConnectionRole::Master)
    }

    /// The local connection key.
    /// 本地连接密钥。
    pub fn local_key(&self) -> u64 {
        self.local_key
    }

    /// The local nonce.
    /// 本地随机数。
    pub fn local_nonce(&self) -> u32 {
        self.local_nonce
    }

    /// The peer's nonce, once its join option has been validated.
    /// 对端的随机数（其加入选项验证通过后可用）。
    pub fn remote_nonce(&self) -> Option<u32> {
        self.remote_nonce
    }

    /// The meta-connection token, once fixed.
    /// 确定后的元连接令牌。
    pub fn token(&self) -> Option<u32> {
        self.token
    }

    /// Builds the establishment option this subflow sends on its SYN (and
    /// echoes on its SYN-ACK): a capability option for the master, a join
    /// option for everyone else.
    ///
    /// 构造此子流在SYN上发送（并在SYN-ACK上回显）的建立选项：
    /// 主子流为能力选项，其余为加入选项。
    pub fn establishment_option(&self) -> MpOption {
        match self.role {
            ConnectionRole::Master => MpOption::Capable(Capable {
                key: self.local_key,
            }),
            ConnectionRole::Joined { token } => MpOption::Join(Join {
                token,
                nonce: self.local_nonce,
            }),
        }
    }

    /// Completes a master handshake with the peer's capability option.
    ///
    /// The token derives from the initiator's key, so both ends fix the same
    /// value: the initiator uses its own key, the responder the key just
    /// received. Fails if this subflow is not a master or if its identity
    /// was already fixed.
    ///
    /// 用对端的能力选项完成主子流握手。
    ///
    /// 令牌由发起方的密钥推导，因此两端确定相同的值：
    /// 发起方用自己的密钥，响应方用刚收到的密钥。
    /// 若此子流不是主子流或其身份已确定则失败。
    pub fn complete_master(&mut self, peer: &Capable, locally_initiated: bool) -> Result<u32> {
        if !self.is_master() {
            return Err(Error::HandshakeInvalid(
                "capability option on a joined subflow",
            ));
        }
        if self.token.is_some() {
            return Err(Error::HandshakeInvalid("establishment already completed"));
        }
        let initiator_key = if locally_initiated {
            self.local_key
        } else {
            peer.key
        };
        let token = generate_token(initiator_key);
        self.token = Some(token);
        debug!(token = format_args!("{token:#010x}"), "master handshake completed");
        Ok(token)
    }

    /// Validates a peer's join option against the established token and
    /// records the peer's nonce.
    ///
    /// 根据已建立的令牌验证对端的加入选项，并记录对端的随机数。
    pub fn validate_join(&mut self, expected_token: u32, join: &Join) -> Result<()> {
        if join.token != expected_token {
            warn!(
                expected = format_args!("{expected_token:#010x}"),
                presented = format_args!("{:#010x}", join.token),
                "join token mismatch"
            );
            return Err(Error::TokenMismatch {
                expected: expected_token,
                presented: join.token,
            });
        }
        self.remote_nonce = Some(join.nonce);
        self.token = Some(expected_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_derivation_vectors() {
        // SHA-1 over the big-endian 8-byte key, truncated to the top 32 bits.
        assert_eq!(generate_token(0x0), 0x05fe4057);
        assert_eq!(generate_token(0x1), 0xcb473678);
        assert_eq!(generate_token(0x2a), 0xacc8ab6b);
        assert_eq!(generate_token(0xdead_beef_cafe_babe), 0x9f48de0e);
        assert_eq!(generate_token(0x0123_4567_89ab_cdef), 0x0ca2eadb);
    }

    #[test]
    fn test_both_ends_fix_the_same_token() {
        let mut initiator = HandshakeEngine::master();
        let mut responder = HandshakeEngine::master();

        let MpOption::Capable(initiator_capable) = initiator.establishment_option() else {
            panic!("master must send a capability option");
        };
        let MpOption::Capable(responder_capable) = responder.establishment_option() else {
            panic!("master must send a capability option");
        };

        let token_at_responder = responder
            .complete_master(&initiator_capable, false)
            .unwrap();
        let token_at_initiator = initiator
            .complete_master(&responder_capable, true)
            .unwrap();

        assert_eq!(token_at_initiator, token_at_responder);
        assert_eq!(token_at_initiator, generate_token(initiator.local_key()));
    }

    #[test]
    fn test_identity_fixed_exactly_once() {
        let mut engine = HandshakeEngine::master();
        let peer = Capable { key: 7 };
        engine.complete_master(&peer, false).unwrap();
        assert_eq!(
            engine.complete_master(&peer, false),
            Err(Error::HandshakeInvalid("establishment already completed"))
        );
    }

    #[test]
    fn test_capable_rejected_on_joined_subflow() {
        let mut engine = HandshakeEngine::joined(0x1234);
        assert_eq!(
            engine.complete_master(&Capable { key: 7 }, false),
            Err(Error::HandshakeInvalid(
                "capability option on a joined subflow"
            ))
        );
    }

    #[test]
    fn test_join_validation() {
        let token = generate_token(0x2a);
        let mut joiner = HandshakeEngine::joined(token);
        let MpOption::Join(join) = joiner.establishment_option() else {
            panic!("joined subflow must send a join option");
        };
        assert_eq!(join.token, token);

        // The accepting side validates against its own meta token.
        let mut acceptor = HandshakeEngine::joined(token);
        acceptor.validate_join(token, &join).unwrap();
        assert_eq!(acceptor.remote_nonce(), Some(join.nonce));

        // A stale or forged token is refused with both values reported.
        let bogus = Join {
            token: 0xdead_0000,
            nonce: 1,
        };
        assert_eq!(
            acceptor.validate_join(token, &bogus),
            Err(Error::TokenMismatch {
                expected: token,
                presented: 0xdead_0000,
            })
        );
    }
}
