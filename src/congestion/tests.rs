use super::{CongestionController, CongestionPhase, reno::Reno};
use crate::config::CongestionConfig;

const MSS: u32 = 1000;

fn config(initial_segments: u32, ssthresh: u32) -> CongestionConfig {
    CongestionConfig {
        segment_size: MSS,
        initial_cwnd_segments: initial_segments,
        initial_ssthresh: ssthresh,
        dup_ack_threshold: 3,
        limited_transmit: true,
    }
}

fn controller(initial_segments: u32, ssthresh: u32) -> CongestionController {
    CongestionController::new(&config(initial_segments, ssthresh), Box::new(Reno))
}

#[test]
fn test_slow_start_doubles_per_acked_byte() {
    let mut cc = controller(1, u32::MAX);
    assert_eq!(cc.window(), MSS);
    assert_eq!(cc.phase(), CongestionPhase::SlowStart);

    cc.on_new_ack(MSS, 1000);
    assert_eq!(cc.window(), 2 * MSS);
    cc.on_new_ack(2 * MSS, 3000);
    assert_eq!(cc.window(), 4 * MSS);
    assert_eq!(cc.phase(), CongestionPhase::SlowStart);
}

#[test]
fn test_slow_start_exits_at_threshold() {
    let mut cc = controller(1, 3 * MSS);
    cc.on_new_ack(MSS, 1000);
    assert_eq!(cc.phase(), CongestionPhase::SlowStart);
    cc.on_new_ack(MSS, 2000);
    // cwnd reached ssthresh exactly.
    assert_eq!(cc.window(), 3 * MSS);
    assert_eq!(cc.phase(), CongestionPhase::CongestionAvoidance);
}

#[test]
fn test_congestion_avoidance_grows_one_segment_per_rtt() {
    let mut cc = controller(4, 4 * MSS);
    // Already at the threshold: first ACK flips to congestion avoidance.
    cc.on_new_ack(MSS, 1000);
    assert_eq!(cc.phase(), CongestionPhase::CongestionAvoidance);
    let before = cc.window();

    // A full window of ACKs should add roughly one segment in total.
    let acks = before / MSS;
    for i in 0..acks {
        cc.on_new_ack(MSS, 2000 + i);
    }
    let grown = cc.window() - before;
    assert!(grown >= MSS / 2 && grown <= MSS + MSS / 2, "grew {grown}");
}

#[test]
fn test_fast_recovery_entry_halves_threshold() {
    let mut cc = controller(10, u32::MAX);
    let cwnd_before = cc.window();

    assert!(!cc.on_duplicate_ack(1, 3, 50_000));
    assert!(!cc.on_duplicate_ack(2, 3, 50_000));
    // Third duplicate ACK crosses the threshold.
    assert!(cc.on_duplicate_ack(3, 3, 50_000));

    assert_eq!(cc.phase(), CongestionPhase::FastRecovery);
    assert_eq!(cc.ssthresh(), cwnd_before / 2);
    assert_eq!(cc.window(), cwnd_before / 2 + 3 * MSS);
    assert_eq!(cc.recover(), 50_000);
}

#[test]
fn test_fast_recovery_inflates_then_deflates_to_threshold() {
    let mut cc = controller(10, u32::MAX);
    assert!(cc.on_duplicate_ack(3, 3, 50_000));
    let ssthresh = cc.ssthresh();

    // Further duplicate ACKs inflate the window.
    assert!(!cc.on_duplicate_ack(4, 3, 50_000));
    assert_eq!(cc.window(), ssthresh + 4 * MSS);

    // A partial ACK below the recovery point keeps fast recovery.
    cc.on_new_ack(MSS, 40_000);
    assert_eq!(cc.phase(), CongestionPhase::FastRecovery);

    // An ACK beyond the recovery point restores the window to ssthresh
    // exactly and resumes congestion avoidance.
    cc.on_new_ack(MSS, 50_001);
    assert_eq!(cc.window(), ssthresh);
    assert_eq!(cc.phase(), CongestionPhase::CongestionAvoidance);
}

#[test]
fn test_timeout_resets_to_slow_start() {
    let mut cc = controller(4, u32::MAX);
    cc.on_new_ack(4 * MSS, 4000);
    let cwnd_before = cc.window();

    cc.on_timeout();
    assert_eq!(cc.ssthresh(), cwnd_before / 2);
    assert_eq!(cc.window(), 4 * MSS); // back to the initial window
    assert_eq!(cc.phase(), CongestionPhase::SlowStart);
}

#[test]
fn test_timeout_overrides_fast_recovery() {
    let mut cc = controller(10, u32::MAX);
    assert!(cc.on_duplicate_ack(3, 3, 50_000));
    assert_eq!(cc.phase(), CongestionPhase::FastRecovery);

    cc.on_timeout();
    assert_eq!(cc.phase(), CongestionPhase::SlowStart);
    assert_eq!(cc.window(), 10 * MSS);
}

#[test]
fn test_window_never_below_one_segment() {
    let mut cc = controller(1, u32::MAX);
    // Repeated timeouts keep halving the threshold; the window must stay
    // clamped at one segment.
    for _ in 0..10 {
        cc.on_timeout();
    }
    assert!(cc.window() >= MSS);

    let mut cc = controller(1, u32::MAX);
    assert!(cc.on_duplicate_ack(3, 3, 100));
    assert!(cc.window() >= MSS);
}
