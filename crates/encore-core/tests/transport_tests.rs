use encore_core::{Transport, TransportError, TransportState, TRANSPORT_PPQ};
use pretty_assertions::assert_eq;

fn payloads<E: Clone>(due: &[encore_core::Due<E>]) -> Vec<E> {
    due.iter().map(|entry| entry.payload.clone()).collect()
}

#[test]
fn idle_transport_does_not_move() {
    let mut transport: Transport<&str> = Transport::new(120.0, 0.1);
    transport.schedule(0.0, "a");

    assert!(transport.advance(1.0).is_empty());
    assert_eq!(transport.position_seconds(), 0.0);
    assert_eq!(transport.state(), TransportState::Idle);
}

#[test]
fn entries_fire_in_time_order_and_ties_keep_schedule_order() {
    let mut transport = Transport::new(120.0, 0.1);
    transport.schedule(1.0, "late");
    transport.schedule(0.5, "first");
    transport.schedule(0.5, "second");
    transport.start().unwrap();

    let due = transport.advance(0.5);
    assert_eq!(payloads(&due), vec!["first", "second"]);
    assert_eq!(due[0].time, 0.5);

    let due = transport.advance(0.5);
    assert_eq!(payloads(&due), vec!["late"]);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn due_time_is_interpolated_within_the_step() {
    let mut transport = Transport::new(120.0, 0.1);
    transport.schedule(0.25, ());
    transport.start().unwrap();

    let due = transport.advance(1.0);
    assert_eq!(due.len(), 1);
    assert!((due[0].time - 0.25).abs() < 1e-9);
}

#[test]
fn position_is_tracked_in_ticks() {
    let mut transport: Transport<()> = Transport::new(120.0, 0.1);
    transport.start().unwrap();
    transport.advance(0.5);

    assert_eq!(transport.position_ticks(), TRANSPORT_PPQ);
}

#[test]
fn start_twice_is_rejected() {
    let mut transport: Transport<()> = Transport::default();
    transport.start().unwrap();
    assert_eq!(transport.start(), Err(TransportError::AlreadyRunning));

    transport.reset();
    assert!(transport.start().is_ok());
}

#[test]
fn reset_clears_pending_and_rewinds() {
    let mut transport = Transport::new(120.0, 0.1);
    transport.schedule(0.0, 1);
    transport.schedule(5.0, 2);
    transport.start().unwrap();
    transport.advance(1.0);

    transport.reset();

    assert_eq!(transport.state(), TransportState::Idle);
    assert_eq!(transport.position_seconds(), 0.0);
    assert_eq!(transport.position_ticks(), 0.0);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn cancelled_entries_never_fire() {
    let mut transport = Transport::new(120.0, 0.1);
    let keep = transport.schedule(0.1, "keep");
    let drop = transport.schedule(0.2, "drop");
    transport.start().unwrap();

    assert_eq!(transport.cancel(drop), Some("drop"));
    assert_eq!(transport.cancel(drop), None);

    let due = transport.advance(1.0);
    assert_eq!(payloads(&due), vec!["keep"]);
    assert_eq!(due[0].id, keep);
}

#[test]
fn invalid_tempo_means_120() {
    let mut transport: Transport<()> = Transport::new(f64::NAN, 0.1);
    assert_eq!(transport.bpm(), 120.0);
    assert_eq!(transport.set_tempo(0.0), 120.0);
    assert_eq!(transport.set_tempo(-1.0), 120.0);
    assert_eq!(transport.set_tempo(f64::INFINITY), 120.0);
}

#[test]
fn tempo_change_while_idle_is_immediate() {
    let mut transport: Transport<()> = Transport::new(120.0, 0.1);
    transport.set_tempo(60.0);
    assert_eq!(transport.current_bpm(), 60.0);
    assert_eq!(transport.bpm(), 60.0);
}

#[test]
fn tempo_change_while_running_ramps() {
    let mut transport: Transport<()> = Transport::new(120.0, 0.1);
    transport.start().unwrap();
    transport.set_tempo(240.0);

    assert_eq!(transport.current_bpm(), 120.0);
    assert_eq!(transport.bpm(), 240.0);

    transport.advance(0.05);
    assert!((transport.current_bpm() - 180.0).abs() < 1e-9);

    transport.advance(0.05);
    assert_eq!(transport.current_bpm(), 240.0);

    // 0.1 s averaging 180 bpm, then 0.9 s at 240 bpm.
    transport.advance(0.9);
    let expected_beats = 180.0 * 0.1 / 60.0 + 240.0 * 0.9 / 60.0;
    assert!((transport.position_ticks() - expected_beats * TRANSPORT_PPQ).abs() < 1e-6);
    assert!((transport.position_seconds() - 1.0).abs() < 1e-9);
}

#[test]
fn ramp_is_continuous_across_step_sizes() {
    let mut coarse: Transport<()> = Transport::new(100.0, 0.1);
    let mut fine: Transport<()> = Transport::new(100.0, 0.1);
    coarse.start().unwrap();
    fine.start().unwrap();
    coarse.set_tempo(50.0);
    fine.set_tempo(50.0);

    coarse.advance(0.5);
    for _ in 0..50 {
        fine.advance(0.01);
    }

    assert!((coarse.position_ticks() - fine.position_ticks()).abs() < 1e-6);
}

#[test]
fn later_tempo_moves_pending_entries() {
    let mut transport = Transport::new(120.0, 0.0);
    transport.schedule(2.0, "bar two");
    transport.start().unwrap();
    transport.set_tempo(60.0);

    assert!(transport.advance(2.0).is_empty());
    assert_eq!(payloads(&transport.advance(2.0)), vec!["bar two"]);
}
