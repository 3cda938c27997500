//! Two-station scenarios driven entirely in memory: no sound hardware, no vendor modem
//! library. Mirrors the original system's own regression scenarios for the ARQ engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arq_core::{AudioRing, Callsign, Mode};
use arq_modem::{EngineConfig, EngineEvent, LoopbackChannel, ModemCodec, SoftModemCodec, Station};

fn recv_payload(events: &Receiver<EngineEvent>, timeout: Duration) -> Option<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match events.recv_timeout(remaining) {
            Ok(EngineEvent::RxPayload(payload)) => return Some(payload),
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn has_event(
    events: &Receiver<EngineEvent>,
    timeout: Duration,
    matches: impl Fn(&EngineEvent) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match events.recv_timeout(remaining) {
            Ok(event) if matches(&event) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
}

/// Forwards all samples from `from` to `to` as they arrive, at a fast poll interval; no
/// real-time pacing since this is a test double, not a simulation of a sound device.
fn forward_all(from: Arc<AudioRing>, to: Arc<AudioRing>, stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(5));
            let n = from.available();
            if n > 0 {
                let samples = from.pop(n);
                let _ = to.push(&samples);
            }
        }
    });
}

/// Like `forward_all`, but drops the `drop_index`-th (0-based) `chunk`-sized group that
/// passes through, simulating a single lost burst on an otherwise perfect channel.
fn forward_dropping_one_burst(
    from: Arc<AudioRing>,
    to: Arc<AudioRing>,
    chunk: usize,
    drop_index: usize,
    stop: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        let mut seen = 0usize;
        while !stop.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(5));
            while from.available() >= chunk {
                let samples = from.pop(chunk);
                if seen != drop_index {
                    let _ = to.push(&samples);
                }
                seen += 1;
            }
        }
    });
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        sample_rate: 8000,
        arq_wait_time: Duration::from_millis(500),
        retransmit_wait_time: Duration::from_millis(500),
        retransmit_request_retries: 2,
        max_arq_rounds: 8,
    }
}

/// Scenario 1: a single short payload makes a complete round trip over a perfect channel.
#[test]
fn single_frame_round_trip() {
    let a_rx = Arc::new(AudioRing::default());
    let a_tx = Arc::new(AudioRing::default());
    let b_rx = Arc::new(AudioRing::default());
    let b_tx = Arc::new(AudioRing::default());

    let _channel = LoopbackChannel::connect(a_tx.clone(), a_rx.clone(), b_tx.clone(), b_rx.clone());

    let (station_a, _events_a) = Station::start_with_rings(
        a_rx,
        a_tx,
        Callsign::new("KO4VMI").unwrap(),
        fast_config(),
    );
    let (station_b, events_b) = Station::start_with_rings(
        b_rx,
        b_tx,
        Callsign::new("VK7XT").unwrap(),
        fast_config(),
    );

    station_a.submit_payload(b"hello".to_vec()).unwrap();

    let payload = recv_payload(&events_b, Duration::from_secs(5)).expect("payload not received");
    let mut expected = b"hello".to_vec();
    expected.resize(113, 0);
    assert_eq!(payload, expected);

    let _ = station_a.stop();
    let _ = station_b.stop();
}

/// Scenario 2: one of four frames is lost in transit; the receiver detects the gap after
/// the quiet threshold, requests a retransmit, and completes the session.
#[test]
fn multi_frame_loss_is_recovered_via_retransmit_request() {
    let forward_burst_len = SoftModemCodec::new(Mode::Forward).samples_per_burst();

    let a_rx = Arc::new(AudioRing::default());
    let a_tx = Arc::new(AudioRing::default());
    let b_rx = Arc::new(AudioRing::default());
    let b_tx = Arc::new(AudioRing::default());

    let stop = Arc::new(AtomicBool::new(false));
    forward_dropping_one_burst(a_tx.clone(), b_rx.clone(), forward_burst_len, 2, stop.clone());
    forward_all(b_tx.clone(), a_rx.clone(), stop.clone());

    // arq_wait_time must comfortably exceed the 5 s quiet threshold the receiver waits
    // out before declaring a gap, so the sender is still listening when the request lands.
    let config = EngineConfig {
        sample_rate: 8000,
        arq_wait_time: Duration::from_secs(9),
        retransmit_wait_time: Duration::from_secs(3),
        retransmit_request_retries: 2,
        max_arq_rounds: 8,
    };

    let (station_a, _events_a) =
        Station::start_with_rings(a_rx, a_tx, Callsign::new("KO4VMI").unwrap(), config);
    let (station_b, events_b) =
        Station::start_with_rings(b_rx, b_tx, Callsign::new("VK7XT").unwrap(), config);

    let data = vec![0x42u8; 340];
    station_a.submit_payload(data.clone()).unwrap();

    // Let the burst train land (frame 2 dropped) and the quiet window elapse.
    thread::sleep(Duration::from_secs(6));
    station_b.submit_retransmit_request().unwrap();

    let payload =
        recv_payload(&events_b, Duration::from_secs(5)).expect("payload not recovered after retransmit");
    let mut expected = data;
    expected.resize(4 * 113, 0);
    assert_eq!(payload, expected);

    stop.store(true, Ordering::Release);
    let _ = station_a.stop();
    let _ = station_b.stop();
}

/// Scenario 5: halting mid-transmission drains the TX ring and skips the ARQ wait.
#[test]
fn halted_transmission_is_not_followed_by_arq_wait() {
    let config = EngineConfig {
        // If the halt check were skipped, the test would hang for this long instead of
        // returning almost immediately.
        arq_wait_time: Duration::from_secs(60),
        ..fast_config()
    };

    let (station, _events) = Station::start_with_rings(
        Arc::new(AudioRing::default()),
        Arc::new(AudioRing::default()),
        Callsign::new("KO4VMI").unwrap(),
        config,
    );

    station.submit_payload(vec![0x7Eu8; 10 * 113]).unwrap();
    // Give the engine a moment to start modulating before halting mid-stream.
    thread::sleep(Duration::from_millis(20));
    let started = Instant::now();
    station.halt_tx();

    // The transmit call should return (and the engine fall back to idle receive polling)
    // well before the 60 s ARQ wait would have elapsed.
    thread::sleep(Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(5));

    let _ = station.stop();
}

/// Scenario 6: a control-mode test burst is invisible to a forward-mode demodulator,
/// since the two modes are bound to independent codec instances.
#[test]
fn test_frame_is_not_seen_by_forward_mode_demod() {
    let bytes = arq_core::pack_test_frame(Callsign::new("KO4VMI").unwrap());
    let samples = SoftModemCodec::new(Mode::Control).modulate_burst(&bytes);

    let mut forward_demod = SoftModemCodec::new(Mode::Forward);
    let (_, payload) = forward_demod.demodulate(&samples);
    assert!(payload.is_empty());

    let mut control_demod = SoftModemCodec::new(Mode::Control);
    let (_, payload) = control_demod.demodulate(&samples);
    assert_eq!(payload, bytes);
}

/// `TransmitActive` is posted around a real payload burst but not around a test frame,
/// since only `transmit()` toggles `is_transmitting`.
#[test]
fn transmit_active_event_brackets_a_payload_burst() {
    let (station, events) = Station::start_with_rings(
        Arc::new(AudioRing::default()),
        Arc::new(AudioRing::default()),
        Callsign::new("KO4VMI").unwrap(),
        fast_config(),
    );

    station.submit_payload(b"hi".to_vec()).unwrap();
    assert!(has_event(&events, Duration::from_secs(2), |e| matches!(
        e,
        EngineEvent::TransmitActive(true)
    )));
    assert!(has_event(&events, Duration::from_secs(2), |e| matches!(
        e,
        EngineEvent::TransmitActive(false)
    )));

    let _ = station.stop();
}
