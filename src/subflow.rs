//! 子流状态机：将入站报文段分派给握手、映射、拥塞和重传组件，
//! 并驱动发送路径。
//! The subflow state machine: dispatches inbound segments to the handshake,
//! mapping, congestion and retransmission components, and drives the send
//! path.
//!
//! The machine is synchronous and never blocks. Every input returns the
//! segments to transmit plus events for the aggregator; deadlines are
//! exposed through [`Subflow::next_timeout`] and delivered back via
//! [`Subflow::on_timeout`].
//!
//! 状态机是同步的，从不阻塞。每个输入返回待发送的报文段
//! 和给聚合器的事件；截止时间通过 [`Subflow::next_timeout`] 暴露，
//! 并经由 [`Subflow::on_timeout`] 送回。

pub mod state;


use crate::{
    config::Config,
    congestion::{CongestionController, CwndPolicy, reno::Reno},
    error::{Error, Result},
    handshake::{ConnectionRole, HandshakeEngine},
    mapping::{Mapping, MappingTable},
    meta::{MetaId, SubflowIdentity},
    option::{
        MpOption,
        address::{AddAddress, Priority, RemoveAddress},
        dss::Dss,
    },
    reliability::retransmission::RetransmissionManager,
    segment::{Segment, SegmentFlags},
};
use bytes::Bytes;
use state::SubflowState;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::Ipv4Addr;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// An event the subflow reports to its aggregator.
/// 子流向其聚合器报告的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubflowEvent {
    /// The handshake completed; data may flow.
    /// 握手完成；数据可以流动。
    Established,
    /// New payload was buffered; the aggregator may extract a mapping.
    /// 有新载荷被缓冲；聚合器可以提取映射。
    DataReady,
    /// The peer finished its send side.
    /// 对端结束了其发送侧。
    PeerFin,
    /// The subflow finished its lifecycle and was torn down.
    /// 子流结束了其生命周期并已销毁。
    Closed,
    /// The subflow failed and was torn down.
    /// 子流失败并已销毁。
    ConnectionFailed(Error),
    /// The peer advertised an additional address.
    /// 对端通告了一个额外地址。
    AddressAdvertised(AddAddress),
    /// The peer withdrew a previously advertised address.
    /// 对端撤回了先前通告的地址。
    AddressWithdrawn(RemoveAddress),
    /// The peer changed this subflow's backup priority.
    /// 对端改变了此子流的备份优先级。
    PriorityChanged {
        /// The new backup flag.
        /// 新的备份标志。
        backup: bool,
    },
}

/// What one input to the state machine produced: segments to transmit and
/// events for the aggregator.
/// 状态机一次输入的产出：待发送的报文段和给聚合器的事件。
#[derive(Debug, Default)]
pub struct SubflowOutput {
    /// Segments to hand to the lower layer, in order.
    /// 按顺序交给下层的报文段。
    pub segments: Vec<Segment>,
    /// Events for the aggregator, in order.
    /// 按顺序交给聚合器的事件。
    pub events: Vec<SubflowEvent>,
}

/// A transmitted segment awaiting acknowledgment.
/// 等待确认的已发送报文段。
#[derive(Debug)]
struct InFlightSegment {
    segment: Segment,
    sent_at: Instant,
    /// Set once retransmitted; such segments never yield RTT samples.
    /// 重传后置位；此类报文段不再产生RTT样本。
    retransmitted: bool,
}

impl InFlightSegment {
    /// Sequence numbers the segment occupies: payload bytes plus one each
    /// for SYN and FIN.
    /// 报文段占用的序列号数：载荷字节加上SYN和FIN各一。
    fn span(&self) -> u32 {
        let mut span = self.segment.payload.len() as u32;
        if self.segment.flags.contains(SegmentFlags::SYN) {
            span += 1;
        }
        if self.segment.flags.contains(SegmentFlags::FIN) {
            span += 1;
        }
        span
    }

    fn end(&self) -> u32 {
        self.segment.sequence + self.span()
    }
}

/// One path-specific transport connection contributing to a meta-connection.
///
/// Owns its mapping tables, congestion controller and retransmission state;
/// holds only an opaque back-reference to the meta-connection.
///
/// 为元连接贡献带宽的单条路径传输连接。
///
/// 拥有自己的映射表、拥塞控制器和重传状态；
/// 对元连接仅持有一个不透明的反向引用。
#[derive(Debug)]
pub struct Subflow {
    config: Config,
    state: SubflowState,
    handshake: HandshakeEngine,
    /// Opaque back-reference to the owning meta-connection, if attached.
    /// 指向所属元连接的不透明反向引用（如已附着）。
    meta: Option<MetaId>,
    /// The route assigned when the subflow was attached; the master is 0.
    /// 附着时分配的路由号；主子流为0。
    route_id: u16,
    is_backup: bool,

    /// The peer sent its FIN; remembered apart from the base state so the
    /// move toward Closing waits for the local send side to drain.
    /// 对端已发送FIN；与基础状态分开记录，
    /// 以便向Closing的迁移等待本地发送侧排空。
    got_fin: bool,
    /// The sequence number the peer's FIN occupies. A FIN reordered ahead
    /// of its data is folded into `rcv_nxt` only once every byte before it
    /// has arrived.
    /// 对端FIN占用的序列号。先于其数据到达的FIN
    /// 只有在其之前的所有字节到齐后才并入 `rcv_nxt`。
    peer_fin_sequence: Option<u32>,
    /// The local side asked to close; the FIN goes out once drained.
    /// 本地已请求关闭；排空后发送FIN。
    fin_requested: bool,
    /// The sequence number the local FIN occupies, once sent.
    /// 本地FIN发送后占用的序列号。
    fin_sequence: Option<u32>,
    fin_acked: bool,

    snd_una: u32,
    snd_nxt: u32,
    /// One past the highest sequence number ever transmitted.
    /// 迄今发送过的最高序列号再加一。
    highest_sent: u32,
    rcv_nxt: u32,
    /// The peer's advertised receive window, in bytes.
    /// 对端通告的接收窗口（字节）。
    peer_window: u32,
    bytes_in_flight: u32,
    /// The subflow-sequence number the next queued mapping starts at.
    /// 下一个排队映射的起始子流序列号。
    next_tx_sequence: u32,
    violations: u32,

    tx_mappings: MappingTable,
    rx_mappings: MappingTable,
    /// Queued mappings not yet (fully) transmitted.
    /// 尚未（完全）发送的排队映射。
    tx_queue: VecDeque<(Mapping, Bytes)>,
    in_flight: BTreeMap<u32, InFlightSegment>,
    /// Out-of-order received ranges past the ack point: start → end.
    /// 确认点之后乱序到达的范围：起点 → 终点。
    received: BTreeMap<u32, u32>,

    congestion: CongestionController,
    retransmission: RetransmissionManager,

    /// Addresses this side has advertised, by identifier.
    /// 本侧已通告的地址（按标识符）。
    advertised: HashMap<u8, (Ipv4Addr, u16)>,
    time_wait_deadline: Option<Instant>,
}

impl Subflow {
    /// Creates a subflow with an explicit handshake role and congestion
    /// policy.
    /// 以显式的握手角色和拥塞策略创建子流。
    pub fn new(config: Config, handshake: HandshakeEngine, policy: Box<dyn CwndPolicy>) -> Self {
        let congestion = CongestionController::new(&config.congestion, policy);
        let retransmission = RetransmissionManager::new(config.clone());
        let is_backup = config.subflow.backup;
        Self {
            config,
            state: SubflowState::Closed,
            handshake,
            meta: None,
            route_id: 0,
            is_backup,
            got_fin: false,
            peer_fin_sequence: None,
            fin_requested: false,
            fin_sequence: None,
            fin_acked: false,
            snd_una: 0,
            snd_nxt: 0,
            highest_sent: 0,
            rcv_nxt: 0,
            peer_window: 0,
            bytes_in_flight: 0,
            next_tx_sequence: 1,
            violations: 0,
            tx_mappings: MappingTable::new(),
            rx_mappings: MappingTable::new(),
            tx_queue: VecDeque::new(),
            in_flight: BTreeMap::new(),
            received: BTreeMap::new(),
            congestion,
            retransmission,
            advertised: HashMap::new(),
            time_wait_deadline: None,
        }
    }

    /// Creates the master subflow of a new meta-connection.
    /// 创建新元连接的主子流。
    pub fn new_master(config: Config) -> Self {
        Self::new(config, HandshakeEngine::master(), Box::new(Reno))
    }

    /// Creates a subflow joining the meta-connection identified by `token`.
    /// 创建加入由 `token` 标识的元连接的子流。
    pub fn new_joined(config: Config, token: u32) -> Self {
        Self::new(config, HandshakeEngine::joined(token), Box::new(Reno))
    }

    // --- Lifecycle inputs ---

    /// Active open: emits the SYN carrying this subflow's establishment
    /// option and arms the retransmission timer for it.
    ///
    /// 主动打开：发送携带本子流建立选项的SYN，并为其设置重传定时器。
    pub fn connect(&mut self, now: Instant) -> Result<SubflowOutput> {
        if self.state != SubflowState::Closed {
            return Err(Error::ProtocolViolation("connect on a non-closed subflow"));
        }
        let syn = Segment::new_syn(
            self.snd_nxt,
            self.window_to_advertise(),
            self.handshake.establishment_option(),
        );
        self.track_sent(syn.clone(), now);
        self.state = SubflowState::SynSent;
        debug!(role = ?self.handshake.role(), "active open");
        Ok(SubflowOutput {
            segments: vec![syn],
            events: Vec::new(),
        })
    }

    /// Passive open: the subflow waits for a peer's SYN.
    /// 被动打开：子流等待对端的SYN。
    pub fn listen(&mut self) -> Result<()> {
        if self.state != SubflowState::Closed {
            return Err(Error::ProtocolViolation("listen on a non-closed subflow"));
        }
        self.state = SubflowState::Listen;
        Ok(())
    }

    /// Processes one inbound segment.
    ///
    /// Handshake failures are returned as errors (the failed-connect result);
    /// everything else, including protocol violations, is absorbed into the
    /// returned output.
    ///
    /// 处理一个入站报文段。
    ///
    /// 握手失败作为错误返回（连接失败的结果）；
    /// 其余一切（包括协议违规）都被吸收进返回的输出中。
    pub fn on_segment(&mut self, segment: Segment, now: Instant) -> Result<SubflowOutput> {
        if !self.state.accepts_segments() {
            return Err(Error::SubflowClosed);
        }
        let mut out = SubflowOutput::default();
        if segment.flags.contains(SegmentFlags::RST) {
            warn!(state = %self.state, "reset received");
            // A reset before the handshake completed is a refused connect.
            let event = if matches!(
                self.state,
                SubflowState::SynSent | SubflowState::SynReceived
            ) {
                SubflowEvent::ConnectionFailed(Error::HandshakeInvalid(
                    "connection reset by peer",
                ))
            } else {
                SubflowEvent::Closed
            };
            self.terminate(&mut out, Some(event));
            return Ok(out);
        }
        match self.state {
            SubflowState::Listen => self.on_listen(&segment, now, &mut out)?,
            SubflowState::SynSent => self.on_syn_sent(&segment, now, &mut out)?,
            SubflowState::SynReceived => self.on_syn_received(&segment, now, &mut out),
            SubflowState::Established | SubflowState::FinWait | SubflowState::Closing => {
                self.on_established(&segment, now, &mut out);
            }
            SubflowState::TimeWait => {
                // Stray segments get a fresh ACK until the drain elapses.
                out.segments.push(Segment::new_ack(
                    self.snd_nxt,
                    self.rcv_nxt,
                    self.window_to_advertise(),
                ));
            }
            SubflowState::Closed | SubflowState::Terminated => {}
        }
        Ok(out)
    }

    /// Delivers an expired deadline back to the machine. Retransmits on an
    /// RTO, tears the subflow down once TimeWait drains or retransmission is
    /// exhausted.
    ///
    /// 将到期的截止时间送回状态机。RTO时重传；
    /// TimeWait排空或重传耗尽后销毁子流。
    pub fn on_timeout(&mut self, now: Instant) -> Result<SubflowOutput> {
        let mut out = SubflowOutput::default();
        if let Some(deadline) = self.time_wait_deadline {
            if now >= deadline {
                self.terminate(&mut out, Some(SubflowEvent::Closed));
                return Ok(out);
            }
        }
        if let Some(deadline) = self.retransmission.next_deadline() {
            if now >= deadline {
                match self.retransmission.on_timeout(now) {
                    Ok(()) => {
                        self.congestion.on_timeout();
                        if let Some(segment) = self.retransmit_first(now) {
                            out.segments.push(segment);
                        }
                    }
                    Err(error) => {
                        warn!("retransmission exhausted, closing");
                        self.terminate(&mut out, Some(SubflowEvent::ConnectionFailed(error)));
                    }
                }
            }
        }
        Ok(out)
    }

    /// The earliest pending deadline, if any.
    /// 最早的待定截止时间（如果存在）。
    pub fn next_timeout(&self) -> Option<Instant> {
        match (self.retransmission.next_deadline(), self.time_wait_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Requests a close of the local send side. The FIN is emitted only once
    /// all queued data has been transmitted and acknowledged.
    ///
    /// 请求关闭本地发送侧。只有所有排队数据都已发送并确认后才发送FIN。
    pub fn close(&mut self, now: Instant) -> Result<SubflowOutput> {
        let mut out = SubflowOutput::default();
        match self.state {
            SubflowState::Established => {
                self.fin_requested = true;
                self.pump(now, &mut out);
                Ok(out)
            }
            SubflowState::FinWait | SubflowState::Closing | SubflowState::TimeWait => Ok(out),
            SubflowState::Listen | SubflowState::SynSent | SubflowState::SynReceived => {
                self.terminate(&mut out, Some(SubflowEvent::Closed));
                Ok(out)
            }
            SubflowState::Closed | SubflowState::Terminated => Err(Error::SubflowClosed),
        }
    }

    // --- Send path ---

    /// Queues one mapping's worth of meta-connection data on this subflow.
    ///
    /// The subflow allocates the mapping's subflow-sequence range and
    /// registers it in the send-side table; [`Subflow::fill_window`] turns
    /// the queue into segments.
    ///
    /// 在此子流上排队一个映射的元连接数据。
    ///
    /// 子流分配该映射的子流序列号范围并登记到发送侧表中；
    /// [`Subflow::fill_window`] 将队列转化为报文段。
    pub fn send_mapping(&mut self, data_sequence: u64, payload: Bytes) -> Result<()> {
        if !self.state.can_send_data() || self.fin_requested {
            return Err(if self.state.is_terminal() {
                Error::SubflowClosed
            } else {
                Error::NotEstablished
            });
        }
        if payload.is_empty() {
            return Err(Error::ProtocolViolation("empty mapping"));
        }
        if payload.len() > u16::MAX as usize {
            return Err(Error::ProtocolViolation(
                "mapping exceeds the data-level length field",
            ));
        }
        let mapping = Mapping::new(data_sequence, payload.len() as u32, self.next_tx_sequence);
        self.tx_mappings.insert(mapping)?;
        self.next_tx_sequence += payload.len() as u32;
        self.tx_queue.push_back((mapping, payload));
        trace!(
            dsn = data_sequence,
            ssn = mapping.subflow_sequence,
            len = mapping.length,
            "mapping queued"
        );
        Ok(())
    }

    /// Emits as many queued data segments as the congestion and peer windows
    /// allow, followed by the FIN if a close is pending and the queue
    /// drained.
    ///
    /// 在拥塞窗口和对端窗口允许的范围内发送尽可能多的排队数据报文段；
    /// 若关闭待定且队列已排空，则随后发送FIN。
    pub fn fill_window(&mut self, now: Instant) -> Result<Vec<Segment>> {
        if !matches!(
            self.state,
            SubflowState::Established | SubflowState::FinWait | SubflowState::Closing
        ) {
            return Err(Error::NotEstablished);
        }
        let mut out = SubflowOutput::default();
        self.pump(now, &mut out);
        Ok(out.segments)
    }

    /// Extracts at most one receive-side mapping's worth of contiguous
    /// bytes; see [`MappingTable::extract_at_most_one`].
    ///
    /// 最多提取接收侧一个映射的连续字节；
    /// 见 [`MappingTable::extract_at_most_one`]。
    pub fn extract_at_most_one(
        &mut self,
        max_size: usize,
        only_full_mappings: bool,
        dsn_out: &mut u64,
    ) -> Option<Bytes> {
        self.rx_mappings
            .extract_at_most_one(max_size, only_full_mappings, dsn_out)
    }

    // --- Address and priority signalling ---

    /// Advertises an additional local address to the peer. Re-advertising an
    /// identifier overwrites the previous note.
    ///
    /// 向对端通告一个额外的本地地址。重复通告同一标识符会覆盖先前的记录。
    pub fn advertise_address(
        &mut self,
        address_id: u8,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<Segment> {
        if self.state != SubflowState::Established {
            return Err(Error::NotEstablished);
        }
        self.advertised.insert(address_id, (address, port));
        Ok(Segment::new_control(
            self.snd_nxt,
            self.rcv_nxt,
            self.window_to_advertise(),
            MpOption::AddAddress(AddAddress {
                address_id,
                address,
                port,
            }),
        ))
    }

    /// Withdraws a previously advertised address. Returns `None` when the
    /// identifier was never advertised.
    ///
    /// 撤回先前通告的地址。若该标识符从未通告过则返回 `None`。
    pub fn stop_advertising_address(&mut self, address_id: u8) -> Result<Option<Segment>> {
        if self.state != SubflowState::Established {
            return Err(Error::NotEstablished);
        }
        if self.advertised.remove(&address_id).is_none() {
            return Ok(None);
        }
        Ok(Some(Segment::new_control(
            self.snd_nxt,
            self.rcv_nxt,
            self.window_to_advertise(),
            MpOption::RemoveAddress(RemoveAddress { address_id }),
        )))
    }

    /// Changes this subflow's backup priority and signals it to the peer.
    /// Returns `None` when the flag is unchanged.
    ///
    /// 改变此子流的备份优先级并向对端发出信号。标志未变时返回 `None`。
    pub fn set_backup(&mut self, backup: bool) -> Result<Option<Segment>> {
        if self.state != SubflowState::Established {
            return Err(Error::NotEstablished);
        }
        if self.is_backup == backup {
            return Ok(None);
        }
        self.is_backup = backup;
        debug!(backup, "backup priority changed locally");
        Ok(Some(Segment::new_control(
            self.snd_nxt,
            self.rcv_nxt,
            self.window_to_advertise(),
            MpOption::Priority(Priority { backup }),
        )))
    }

    // --- Accessors ---

    /// The current lifecycle state.
    /// 当前的生命周期状态。
    pub fn state(&self) -> SubflowState {
        self.state
    }

    /// The subflow's role within its meta-connection.
    /// 子流在其元连接中的角色。
    pub fn role(&self) -> ConnectionRole {
        self.handshake.role()
    }

    /// The meta-connection token, once the handshake fixed it.
    /// 握手确定后的元连接令牌。
    pub fn token(&self) -> Option<u32> {
        self.handshake.token()
    }

    /// The local connection key (meaningful for the master role).
    /// 本地连接密钥（对主角色有意义）。
    pub fn local_key(&self) -> u64 {
        self.handshake.local_key()
    }

    /// Whether this subflow is currently a backup path.
    /// 此子流当前是否为备份路径。
    pub fn is_backup(&self) -> bool {
        self.is_backup
    }

    /// Whether the peer's FIN has arrived.
    /// 对端的FIN是否已到达。
    pub fn got_fin(&self) -> bool {
        self.got_fin
    }

    /// Attaches the opaque identifier of the owning meta-connection and the
    /// route assigned by its registry.
    /// 附着所属元连接的不透明标识符及其注册表分配的路由号。
    pub fn attach_meta(&mut self, meta: MetaId, route_id: u16) {
        self.meta = Some(meta);
        self.route_id = route_id;
    }

    /// The attached meta-connection identifier, if any.
    /// 已附着的元连接标识符（如果存在）。
    pub fn meta(&self) -> Option<MetaId> {
        self.meta
    }

    /// The subflow's identity, available once the handshake fixed the token
    /// and a meta-connection was attached.
    ///
    /// 子流的身份，在握手确定令牌且元连接已附着后可用。
    pub fn identity(&self) -> Option<SubflowIdentity> {
        Some(SubflowIdentity {
            meta: self.meta?,
            route_id: self.route_id,
            is_master: self.handshake.is_master(),
            is_backup: self.is_backup,
            token: self.handshake.token()?,
        })
    }

    /// Unacknowledged payload bytes in flight on this subflow.
    /// 此子流上在途的未确认载荷字节数。
    pub fn bytes_in_flight(&self) -> u32 {
        self.bytes_in_flight
    }

    /// The current congestion window, in bytes.
    /// 当前拥塞窗口（字节）。
    pub fn congestion_window(&self) -> u32 {
        self.congestion.window()
    }

    /// The congestion controller, for inspection.
    /// 拥塞控制器（用于检视）。
    pub fn congestion(&self) -> &CongestionController {
        &self.congestion
    }

    /// The peer's last advertised receive window, in bytes.
    /// 对端最近通告的接收窗口（字节）。
    pub fn remote_window(&self) -> u32 {
        self.peer_window
    }

    /// Bytes this subflow may still put in flight: the lesser of the
    /// congestion and peer windows, minus what is outstanding.
    ///
    /// 此子流还能投入在途的字节数：拥塞窗口与对端窗口的较小者减去在途量。
    pub fn available_window(&self) -> u32 {
        self.congestion
            .window()
            .min(self.peer_window)
            .saturating_sub(self.bytes_in_flight)
    }

    // --- State handlers ---

    fn on_listen(&mut self, segment: &Segment, now: Instant, out: &mut SubflowOutput) -> Result<()> {
        if !segment.flags.contains(SegmentFlags::SYN) {
            self.count_violation(out, "non-SYN segment while listening");
            return Ok(());
        }
        self.validate_establishment(segment, false)?;
        self.peer_window = segment.window;
        self.rcv_nxt = segment.sequence.wrapping_add(1);
        let syn_ack = Segment::new_syn_ack(
            self.snd_nxt,
            self.rcv_nxt,
            self.window_to_advertise(),
            self.handshake.establishment_option(),
        );
        self.track_sent(syn_ack.clone(), now);
        self.state = SubflowState::SynReceived;
        debug!(role = ?self.handshake.role(), "SYN accepted");
        out.segments.push(syn_ack);
        Ok(())
    }

    fn on_syn_sent(
        &mut self,
        segment: &Segment,
        now: Instant,
        out: &mut SubflowOutput,
    ) -> Result<()> {
        if !segment.flags.contains(SegmentFlags::SYN) || !segment.flags.contains(SegmentFlags::ACK)
        {
            self.count_violation(out, "expected a SYN-ACK");
            return Ok(());
        }
        self.validate_establishment(segment, true)?;
        self.process_ack(segment, now, out);
        self.rcv_nxt = segment.sequence.wrapping_add(1);
        self.state = SubflowState::Established;
        debug!(token = ?self.handshake.token(), "subflow established (active)");
        out.events.push(SubflowEvent::Established);
        out.segments.push(Segment::new_ack(
            self.snd_nxt,
            self.rcv_nxt,
            self.window_to_advertise(),
        ));
        Ok(())
    }

    fn on_syn_received(&mut self, segment: &Segment, now: Instant, out: &mut SubflowOutput) {
        if !segment.flags.contains(SegmentFlags::ACK) {
            // A retransmitted SYN: the SYN-ACK got lost, resend it.
            if segment.flags.contains(SegmentFlags::SYN) {
                if let Some(syn_ack) = self.retransmit_first(now) {
                    out.segments.push(syn_ack);
                }
                return;
            }
            self.count_violation(out, "segment without ACK while half-open");
            return;
        }
        self.process_ack(segment, now, out);
        if self.snd_una == self.snd_nxt {
            self.state = SubflowState::Established;
            debug!(token = ?self.handshake.token(), "subflow established (passive)");
            out.events.push(SubflowEvent::Established);
            // The final handshake ACK may already carry data or a FIN.
            if !segment.payload.is_empty() || segment.flags.contains(SegmentFlags::FIN) {
                self.on_established(segment, now, out);
            }
        }
    }

    fn on_established(&mut self, segment: &Segment, now: Instant, out: &mut SubflowOutput) {
        self.process_ack(segment, now, out);
        self.process_control_options(segment, out);
        let mut should_ack = false;
        if !segment.payload.is_empty() {
            should_ack = true;
            self.process_data(segment, out);
        }
        if segment.flags.contains(SegmentFlags::FIN) && self.state.accepts_segments() {
            should_ack = true;
            self.on_peer_fin(segment, now, out);
        }
        if should_ack && self.state.accepts_segments() {
            out.segments.push(Segment::new_ack(
                self.snd_nxt,
                self.rcv_nxt,
                self.window_to_advertise(),
            ));
        }
        // The ACK may have opened the window, and a drained send side may
        // owe the peer a FIN.
        if self.state.accepts_segments() {
            self.pump(now, out);
        }
    }

    // --- Inbound processing helpers ---

    /// Checks and consumes the establishment option expected in the current
    /// role, failing the connect on a mismatch.
    ///
    /// 检查并消费当前角色所期望的建立选项，不匹配时令连接失败。
    fn validate_establishment(&mut self, segment: &Segment, locally_initiated: bool) -> Result<()> {
        let result = match self.handshake.role() {
            ConnectionRole::Master => match segment.capable() {
                Some(capable) => self
                    .handshake
                    .complete_master(capable, locally_initiated)
                    .map(|_| ()),
                None => Err(Error::HandshakeInvalid("capability option missing")),
            },
            ConnectionRole::Joined { token } => match segment.join() {
                Some(join) => self.handshake.validate_join(token, join),
                None => Err(Error::HandshakeInvalid("join option missing")),
            },
        };
        result.map_err(|error| {
            warn!(%error, "handshake failed, subflow closed");
            self.state = SubflowState::Closed;
            error
        })
    }

    /// Cumulative-ACK bookkeeping: advances the ack point, feeds the RTT
    /// estimator (Karn's rule), drives the congestion controller, and runs
    /// fast retransmit or limited transmit on duplicates.
    ///
    /// 累积ACK记账：推进确认点、为RTT估算器供样本（Karn规则）、
    /// 驱动拥塞控制器，并在重复ACK时执行快速重传或受限传输。
    fn process_ack(&mut self, segment: &Segment, now: Instant, out: &mut SubflowOutput) {
        if !segment.flags.contains(SegmentFlags::ACK) {
            return;
        }
        let window_updated = segment.window != self.peer_window;
        self.peer_window = segment.window;
        let ack = segment.ack;

        if ack > self.snd_una {
            self.snd_una = ack;
            let mut acked_bytes: u32 = 0;
            let mut sample = None;
            while self
                .in_flight
                .first_key_value()
                .is_some_and(|(_, entry)| entry.end() <= ack)
            {
                let Some((_, entry)) = self.in_flight.pop_first() else {
                    break;
                };
                acked_bytes += entry.segment.payload.len() as u32;
                if !entry.retransmitted {
                    sample = Some(now.saturating_duration_since(entry.sent_at));
                }
                if entry.segment.flags.contains(SegmentFlags::FIN) {
                    self.fin_acked = true;
                }
            }
            self.bytes_in_flight = self.bytes_in_flight.saturating_sub(acked_bytes);
            self.tx_mappings.remove_acked(ack);
            self.retransmission
                .on_ack_advanced(sample, now, !self.in_flight.is_empty());
            self.congestion.on_new_ack(acked_bytes, ack);
            trace!(ack, acked_bytes, "ack advanced");
            if self.fin_acked {
                self.on_fin_acked(now);
            }
        } else if ack == self.snd_una
            && !self.in_flight.is_empty()
            && segment.payload.is_empty()
            && !segment.flags.intersects(SegmentFlags::SYN | SegmentFlags::FIN)
            && !window_updated
        {
            let count = self.retransmission.on_duplicate_ack();
            let entered = self.congestion.on_duplicate_ack(
                count,
                self.config.congestion.dup_ack_threshold,
                self.highest_sent.saturating_sub(1),
            );
            if entered {
                debug!(ack, count, "fast retransmit");
                if let Some(segment) = self.retransmit_first(now) {
                    out.segments.push(segment);
                }
            } else if self.retransmission.take_limited_transmit() {
                // One new segment per early duplicate ACK keeps the ACK
                // clock running, gated by the peer window only.
                if let Some(segment) = self.emit_next_chunk(now, true) {
                    out.segments.push(segment);
                }
            }
        }
    }

    /// Registers the segment's mapping and buffers its payload chunk.
    /// 登记报文段的映射并缓冲其载荷块。
    fn process_data(&mut self, segment: &Segment, out: &mut SubflowOutput) {
        let end = segment.sequence_end();
        if end <= self.rcv_nxt {
            trace!(seq = segment.sequence, "duplicate payload re-acked");
            return;
        }
        if let Some(fin_at) = self.peer_fin_sequence {
            if end > fin_at {
                self.count_violation(out, "payload past the peer's FIN");
                return;
            }
        }
        if segment.sequence < self.rcv_nxt
            || segment.sequence
                > self.rcv_nxt.saturating_add(self.config.subflow.advertised_window)
        {
            self.count_violation(out, "payload outside the receive window");
            return;
        }
        let Some(dss) = segment.dss() else {
            self.count_violation(out, "payload without a mapping");
            return;
        };
        // The checksum, when present, is carried for the lower layer and
        // not validated here.
        if self.rx_mappings.insert(dss.to_mapping()).is_err() {
            self.count_violation(out, "conflicting mapping");
            return;
        }
        if self.rx_mappings.push_payload(segment.sequence, segment.payload.clone()) {
            self.record_received(segment.sequence, end);
            self.consume_peer_fin();
            out.events.push(SubflowEvent::DataReady);
        }
    }

    fn on_peer_fin(&mut self, segment: &Segment, now: Instant, out: &mut SubflowOutput) {
        if self.got_fin {
            return;
        }
        self.got_fin = true;
        self.peer_fin_sequence = Some(segment.sequence_end());
        self.consume_peer_fin();
        debug!(state = %self.state, "peer FIN received");
        out.events.push(SubflowEvent::PeerFin);
        if self.state == SubflowState::FinWait {
            if self.fin_acked {
                self.enter_time_wait(now);
            } else {
                self.state = SubflowState::Closing;
            }
        }
        // In Established the base state holds until the local side closes
        // and its send queue drains.
    }

    fn process_control_options(&mut self, segment: &Segment, out: &mut SubflowOutput) {
        for option in &segment.options {
            match option {
                MpOption::AddAddress(add) => {
                    out.events.push(SubflowEvent::AddressAdvertised(*add));
                }
                MpOption::RemoveAddress(remove) => {
                    out.events.push(SubflowEvent::AddressWithdrawn(*remove));
                }
                MpOption::Priority(priority) => {
                    if self.is_backup != priority.backup {
                        self.is_backup = priority.backup;
                        debug!(backup = priority.backup, "backup priority changed by peer");
                        out.events.push(SubflowEvent::PriorityChanged {
                            backup: priority.backup,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    /// Merges a received range into the out-of-order set and advances the
    /// ack point over any contiguous prefix.
    ///
    /// 将已接收范围合并进乱序集合，并将确认点推进过所有连续前缀。
    fn record_received(&mut self, start: u32, end: u32) {
        let mut start = start;
        let mut end = end;
        if let Some((&prev_start, &prev_end)) = self.received.range(..=start).next_back() {
            if prev_end >= start {
                start = prev_start;
                end = end.max(prev_end);
                self.received.remove(&prev_start);
            }
        }
        while let Some((&next_start, &next_end)) = self.received.range(start..).next() {
            if next_start > end {
                break;
            }
            end = end.max(next_end);
            self.received.remove(&next_start);
        }
        self.received.insert(start, end);

        while let Some((&first_start, &first_end)) = self.received.first_key_value() {
            if first_start > self.rcv_nxt {
                break;
            }
            self.rcv_nxt = self.rcv_nxt.max(first_end);
            self.received.pop_first();
        }
    }

    /// Advances the ack point over the peer's FIN once every byte before it
    /// has arrived. A no-op while a gap remains or the FIN was already
    /// consumed.
    ///
    /// 在对端FIN之前的所有字节到齐后将确认点推进过该FIN。
    /// 仍有缺口或FIN已被消费时为无操作。
    fn consume_peer_fin(&mut self) {
        if self.got_fin && self.peer_fin_sequence == Some(self.rcv_nxt) {
            self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
        }
    }

    fn count_violation(&mut self, out: &mut SubflowOutput, reason: &'static str) {
        self.violations += 1;
        warn!(violations = self.violations, reason, "segment dropped");
        if self.violations > self.config.subflow.max_violations {
            out.segments.push(Segment::new_rst(self.snd_nxt));
            self.terminate(
                out,
                Some(SubflowEvent::ConnectionFailed(Error::ProtocolViolation(
                    reason,
                ))),
            );
        }
    }

    // --- Send-path helpers ---

    fn pump(&mut self, now: Instant, out: &mut SubflowOutput) {
        while let Some(segment) = self.emit_next_chunk(now, false) {
            out.segments.push(segment);
        }
        self.maybe_emit_fin(now, out);
    }

    /// Emits the next queued chunk if the window allows. With `limited` set
    /// only the peer window gates the transmission (limited transmit).
    ///
    /// 若窗口允许则发送下一个排队块。设置 `limited` 时
    /// 仅由对端窗口限制发送（受限传输）。
    fn emit_next_chunk(&mut self, now: Instant, limited: bool) -> Option<Segment> {
        let (mapping, remaining) = {
            let (mapping, payload) = self.tx_queue.front()?;
            (*mapping, payload.len())
        };
        let take = (remaining as u32).min(self.config.congestion.segment_size);
        let window = if limited {
            self.peer_window.saturating_sub(self.bytes_in_flight)
        } else {
            self.available_window()
        };
        if take == 0 || window < take {
            return None;
        }

        let sequence = self.snd_nxt;
        let chunk = {
            let front = self.tx_queue.front_mut()?;
            front.1.split_to(take as usize)
        };
        if self.tx_queue.front().is_some_and(|(_, payload)| payload.is_empty()) {
            self.tx_queue.pop_front();
        }
        let segment = Segment::new_data(
            sequence,
            self.rcv_nxt,
            self.window_to_advertise(),
            Dss::from_mapping(&mapping),
            chunk,
        );
        self.track_sent(segment.clone(), now);
        trace!(seq = sequence, len = take, limited, "data segment emitted");
        Some(segment)
    }

    /// Sends the pending FIN once every queued byte has been transmitted
    /// and acknowledged — data and close are never reordered.
    ///
    /// 在所有排队字节都已发送并确认后发送待定的FIN ——
    /// 数据和关闭从不乱序。
    fn maybe_emit_fin(&mut self, now: Instant, out: &mut SubflowOutput) {
        if !self.fin_requested
            || self.fin_sequence.is_some()
            || !self.tx_queue.is_empty()
            || !self.in_flight.is_empty()
        {
            return;
        }
        let sequence = self.snd_nxt;
        let fin = Segment::new_fin(sequence, self.rcv_nxt, self.window_to_advertise());
        self.fin_sequence = Some(sequence);
        self.track_sent(fin.clone(), now);
        self.state = if self.got_fin {
            SubflowState::Closing
        } else {
            SubflowState::FinWait
        };
        debug!(seq = sequence, state = %self.state, "FIN emitted");
        out.segments.push(fin);
    }

    fn on_fin_acked(&mut self, now: Instant) {
        if self.state == SubflowState::Closing {
            self.enter_time_wait(now);
        }
        // In FinWait the subflow lingers until the peer's FIN arrives.
    }

    fn enter_time_wait(&mut self, now: Instant) {
        self.state = SubflowState::TimeWait;
        self.time_wait_deadline = Some(now + self.config.subflow.time_wait);
        self.retransmission.cancel();
        debug!("entered TimeWait");
    }

    /// Records a freshly built segment in the in-flight store and arms the
    /// retransmission timer.
    /// 将新构造的报文段记入在途存储并设置重传定时器。
    fn track_sent(&mut self, segment: Segment, now: Instant) {
        let sequence = segment.sequence;
        self.bytes_in_flight += segment.payload.len() as u32;
        let entry = InFlightSegment {
            segment,
            sent_at: now,
            retransmitted: false,
        };
        let end = entry.end();
        self.in_flight.insert(sequence, entry);
        self.snd_nxt = self.snd_nxt.max(end);
        self.highest_sent = self.highest_sent.max(self.snd_nxt);
        self.retransmission.on_segment_sent(now, true);
    }

    /// Re-emits the oldest unacknowledged segment. Such a segment never
    /// contributes an RTT sample again.
    /// 重发最老的未确认报文段。该报文段不再贡献RTT样本。
    fn retransmit_first(&mut self, now: Instant) -> Option<Segment> {
        let entry = self.in_flight.values_mut().next()?;
        entry.retransmitted = true;
        entry.sent_at = now;
        let segment = entry.segment.clone();
        self.retransmission.on_segment_sent(now, false);
        trace!(seq = segment.sequence, "segment retransmitted");
        Some(segment)
    }

    fn terminate(&mut self, out: &mut SubflowOutput, event: Option<SubflowEvent>) {
        self.state = SubflowState::Terminated;
        self.retransmission.cancel();
        self.time_wait_deadline = None;
        self.tx_mappings.clear();
        self.rx_mappings.clear();
        self.tx_queue.clear();
        self.in_flight.clear();
        self.received.clear();
        self.bytes_in_flight = 0;
        if let Some(event) = event {
            out.events.push(event);
        }
        debug!("subflow terminated");
    }

    fn window_to_advertise(&self) -> u32 {
        self.config.subflow.advertised_window
    }
}
