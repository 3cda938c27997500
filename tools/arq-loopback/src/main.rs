//! Runs two stations wired to each other through an in-memory `LoopbackChannel`
//! instead of real sound devices, for exercising the ARQ engine without hardware.

use std::sync::Arc;
use std::time::Duration;

use arq_core::{AudioRing, Callsign};
use arq_modem::{EngineConfig, EngineEvent, LoopbackChannel, Station};
use log::info;

fn main() {
    env_logger::builder()
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();

    let a_rx = Arc::new(AudioRing::default());
    let a_tx = Arc::new(AudioRing::default());
    let b_rx = Arc::new(AudioRing::default());
    let b_tx = Arc::new(AudioRing::default());

    let _channel = LoopbackChannel::connect(a_tx.clone(), a_rx.clone(), b_tx.clone(), b_rx.clone());

    let (station_a, events_a) = Station::start_with_rings(
        a_rx,
        a_tx,
        Callsign::new("ALPHA").unwrap(),
        EngineConfig::default(),
    );
    let (station_b, events_b) = Station::start_with_rings(
        b_rx,
        b_tx,
        Callsign::new("BRAVO").unwrap(),
        EngineConfig::default(),
    );

    std::thread::spawn(move || {
        for event in events_b {
            if let EngineEvent::RxPayload(payload) = event {
                info!("bravo received: {}", String::from_utf8_lossy(&payload));
            }
        }
    });
    std::thread::spawn(move || {
        for event in events_a {
            if let EngineEvent::RxPayload(payload) = event {
                info!("alpha received: {}", String::from_utf8_lossy(&payload));
            }
        }
    });

    station_a
        .submit_payload(b"hello from alpha".to_vec())
        .unwrap();
    std::thread::sleep(Duration::from_secs(2));

    let _ = station_a.stop();
    let _ = station_b.stop();
}
