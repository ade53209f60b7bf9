//! 跨子流集成测试：一个元连接横跨主子流和加入子流，
//! 数据分摊到两条路径并按数据序列号重组。
//! Cross-subflow integration: one meta-connection spanning a master and a
//! joined subflow, with data striped over both paths and reassembled by
//! data-sequence number.

use bytes::Bytes;
use petrel_multipath::{
    config::Config,
    meta::MetaRegistry,
    subflow::{Subflow, SubflowEvent, state::SubflowState},
};
use std::collections::BTreeMap;
use tokio::time::Instant;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> Config {
    let mut config = Config::default();
    config.congestion.segment_size = 1000;
    config.congestion.initial_cwnd_segments = 10;
    config
}

/// Drives the three-way handshake between an active and a passive subflow.
fn establish(initiator: &mut Subflow, responder: &mut Subflow, now: Instant) {
    responder.listen().unwrap();
    let syn = initiator.connect(now).unwrap().segments.remove(0);
    let syn_ack = responder.on_segment(syn, now).unwrap().segments.remove(0);
    let mut out = initiator.on_segment(syn_ack, now).unwrap();
    assert!(out.events.contains(&SubflowEvent::Established));
    let ack = out.segments.remove(0);
    let out = responder.on_segment(ack, now).unwrap();
    assert!(out.events.contains(&SubflowEvent::Established));
}

#[test]
fn test_meta_connection_spans_master_and_joined_subflows() {
    init_tracing();
    let now = Instant::now();
    // The registry on the accepting host resolves inbound joins.
    let registry = MetaRegistry::new();

    let mut master_a = Subflow::new_master(config());
    let mut master_b = Subflow::new_master(config());
    establish(&mut master_a, &mut master_b, now);

    let token = master_b.token().unwrap();
    assert_eq!(master_a.token(), Some(token));
    let meta = registry.register(token);
    master_b.attach_meta(meta, 0);
    let identity = master_b.identity().unwrap();
    assert!(identity.is_master);
    assert_eq!(identity.route_id, 0);
    assert_eq!(identity.token, token);

    // The initiating host opens a second path by presenting the token.
    let mut join_a = Subflow::new_joined(config(), token);
    let syn = join_a.connect(now).unwrap().segments.remove(0);

    // The accepting host routes the join through its registry.
    let presented = syn.join().unwrap().token;
    let target = registry.resolve_token(presented).unwrap();
    let mut join_b = Subflow::new_joined(config(), registry.token_of(target).unwrap());
    join_b.listen().unwrap();
    let syn_ack = join_b.on_segment(syn, now).unwrap().segments.remove(0);
    let mut out = join_a.on_segment(syn_ack, now).unwrap();
    assert!(out.events.contains(&SubflowEvent::Established));
    let ack = out.segments.remove(0);
    join_b.on_segment(ack, now).unwrap();
    let route = registry.attach_subflow(target).unwrap();
    join_b.attach_meta(target, route);
    assert_eq!(registry.subflow_count(target).unwrap(), 2);
    let identity = join_b.identity().unwrap();
    assert!(!identity.is_master);
    assert_eq!(identity.route_id, 1);

    // Stripe one 4000-byte stream across the two paths.
    let stream: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 256) as u8).collect();
    master_a
        .send_mapping(0, Bytes::copy_from_slice(&stream[..2000]))
        .unwrap();
    join_a
        .send_mapping(2000, Bytes::copy_from_slice(&stream[2000..]))
        .unwrap();

    // Deliver every segment in reverse, both within and across paths.
    let mut arrivals = Vec::new();
    for segment in master_a.fill_window(now).unwrap() {
        arrivals.push((0u8, segment));
    }
    for segment in join_a.fill_window(now).unwrap() {
        arrivals.push((1u8, segment));
    }
    arrivals.reverse();
    for (path, segment) in arrivals {
        let subflow = if path == 0 { &mut master_b } else { &mut join_b };
        let out = subflow.on_segment(segment, now).unwrap();
        assert!(out.events.contains(&SubflowEvent::DataReady));
    }

    // Reassemble the meta-level stream by data-sequence number.
    let mut chunks = BTreeMap::new();
    let mut dsn = 0u64;
    while let Some(chunk) = master_b.extract_at_most_one(4096, true, &mut dsn) {
        chunks.insert(dsn, chunk);
    }
    while let Some(chunk) = join_b.extract_at_most_one(4096, true, &mut dsn) {
        chunks.insert(dsn, chunk);
    }
    let mut reassembled = Vec::new();
    let mut expected_dsn = 0u64;
    for (start, chunk) in chunks {
        assert_eq!(start, expected_dsn, "contiguous data-sequence coverage");
        expected_dsn += chunk.len() as u64;
        reassembled.extend_from_slice(&chunk);
    }
    assert_eq!(reassembled, stream);

    // Departing subflows detach until the meta-connection disappears.
    registry.detach_subflow(target).unwrap();
    assert_eq!(registry.subflow_count(target).unwrap(), 1);
    registry.detach_subflow(target).unwrap();
    assert!(registry.resolve_token(token).is_none());
}

#[test]
fn test_unknown_token_cannot_be_routed() {
    init_tracing();
    let now = Instant::now();
    let registry = MetaRegistry::new();

    let mut master_a = Subflow::new_master(config());
    let mut master_b = Subflow::new_master(config());
    establish(&mut master_a, &mut master_b, now);
    registry.register(master_b.token().unwrap());

    // A join presenting a token no meta-connection owns is unroutable; the
    // accepting host never builds a subflow for it.
    let mut stranger = Subflow::new_joined(config(), 0xdead_beef);
    let syn = stranger.connect(now).unwrap().segments.remove(0);
    assert!(registry.resolve_token(syn.join().unwrap().token).is_none());
    assert_eq!(stranger.state(), SubflowState::SynSent);
}
