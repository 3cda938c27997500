//! An in-memory audio channel bridging two stations' rings, standing in for a real
//! soundcard and radio path. Grounded in the teacher's `NullInputSource`/`NullOutputSink`:
//! a background thread moves samples at a fixed cadence instead of a device callback,
//! so tests and the `arq-loopback` tool can run two engines back to back without any
//! hardware or the vendor modem library.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arq_core::AudioRing;

const TICK: Duration = Duration::from_millis(25);
/// Samples per tick at the system's fixed 8 kHz sample rate.
const SAMPLES_PER_TICK: usize = 200;

/// Continuously pumps samples from each side's TX ring into the other's RX ring until
/// dropped. The channel is lossless and has no simulated latency beyond the tick period.
pub struct LoopbackChannel {
    stop: Arc<AtomicBool>,
}

impl LoopbackChannel {
    pub fn connect(
        a_tx: Arc<AudioRing>,
        a_rx: Arc<AudioRing>,
        b_tx: Arc<AudioRing>,
        b_rx: Arc<AudioRing>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        spawn_pump(a_tx, b_rx, stop.clone());
        spawn_pump(b_tx, a_rx, stop.clone());
        Self { stop }
    }
}

impl Drop for LoopbackChannel {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn spawn_pump(from: Arc<AudioRing>, to: Arc<AudioRing>, stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut next_tick = Instant::now() + TICK;
        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(next_tick - now);
            }
            next_tick += TICK;
            let available = from.available().min(SAMPLES_PER_TICK);
            if available > 0 {
                let samples = from.pop(available);
                let _ = to.push(&samples);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_flow_in_both_directions() {
        let a_tx = Arc::new(AudioRing::new(10_000));
        let a_rx = Arc::new(AudioRing::new(10_000));
        let b_tx = Arc::new(AudioRing::new(10_000));
        let b_rx = Arc::new(AudioRing::new(10_000));

        let _channel = LoopbackChannel::connect(a_tx.clone(), a_rx.clone(), b_tx.clone(), b_rx.clone());

        a_tx.push(&[1, 2, 3, 4, 5]).unwrap();
        b_tx.push(&[6, 7, 8]).unwrap();

        // Give the pump threads a few ticks to move the samples across.
        thread::sleep(TICK * 4);

        assert_eq!(b_rx.pop(5), vec![1, 2, 3, 4, 5]);
        assert_eq!(a_rx.pop(3), vec![6, 7, 8]);
    }
}
