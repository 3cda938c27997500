//! Top-level station handle: wires together soundcard I/O, the engine worker thread,
//! and the caller's command submission / event stream (§2, §6.3).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use arq_core::frame::FORWARD_PAYLOAD_LEN;
use arq_core::{ArqError, AudioRing, Callsign, Mode};

use crate::codec::SoftModemCodec;
use crate::engine::{ArqEngine, EngineCommand, EngineConfig, EngineEvent};
use crate::error::StationError;
use crate::soundcard::Soundcard;

/// Default depth of the event channel the engine posts to; emissions beyond this are
/// dropped with a log line rather than blocking the engine (§4.6).
const EVENT_CHANNEL_DEPTH: usize = 64;
const COMMAND_CHANNEL_DEPTH: usize = 16;

/// Caller-facing handle. Submitting commands never blocks on the engine worker; events
/// arrive on the `Receiver<EngineEvent>` returned alongside the station.
pub struct Station {
    cmd_tx: SyncSender<EngineCommand>,
    tx_volume: Arc<AtomicU8>,
    halted_tx: Arc<AtomicBool>,
    tx_ring: Arc<AudioRing>,
    mode: Arc<AtomicU8>,
    soundcard: Option<Soundcard>,
    worker: Option<JoinHandle<()>>,
}

impl Station {
    /// Open real sound devices by cpal name and start the engine worker. Uses the
    /// software reference codec (`SoftModemCodec`) for both modes; a production build
    /// would substitute a real FFI binding behind the same `ModemCodec` trait (§4.2).
    pub fn start(
        input_device: &str,
        output_device: &str,
        callsign: Callsign,
        config: EngineConfig,
    ) -> Result<(Self, Receiver<EngineEvent>), StationError> {
        let rx_ring = Arc::new(AudioRing::default());
        let tx_ring = Arc::new(AudioRing::default());
        let is_transmitting = Arc::new(AtomicBool::new(false));

        let soundcard = Soundcard::open(
            input_device,
            output_device,
            rx_ring.clone(),
            tx_ring.clone(),
            is_transmitting.clone(),
        )?;

        let (station, event_rx) =
            Self::build(rx_ring, tx_ring, is_transmitting, callsign, config, Some(soundcard));
        Ok((station, event_rx))
    }

    /// Wire the engine directly to caller-supplied rings instead of a real sound
    /// device: used by integration tests and the `arq-loopback` tool, which bridge two
    /// stations' rings with an in-memory channel instead of real hardware.
    pub fn start_with_rings(
        rx_ring: Arc<AudioRing>,
        tx_ring: Arc<AudioRing>,
        callsign: Callsign,
        config: EngineConfig,
    ) -> (Self, Receiver<EngineEvent>) {
        let is_transmitting = Arc::new(AtomicBool::new(false));
        Self::build(rx_ring, tx_ring, is_transmitting, callsign, config, None)
    }

    fn build(
        rx_ring: Arc<AudioRing>,
        tx_ring: Arc<AudioRing>,
        is_transmitting: Arc<AtomicBool>,
        callsign: Callsign,
        config: EngineConfig,
        soundcard: Option<Soundcard>,
    ) -> (Self, Receiver<EngineEvent>) {
        let halted_tx = Arc::new(AtomicBool::new(false));
        let mode = Arc::new(AtomicU8::new(0));
        let tx_volume = Arc::new(AtomicU8::new(100));

        let (cmd_tx, cmd_rx) = sync_channel(COMMAND_CHANNEL_DEPTH);
        let (event_tx, event_rx) = sync_channel(EVENT_CHANNEL_DEPTH);

        let engine = ArqEngine::new(
            callsign,
            config,
            rx_ring,
            tx_ring.clone(),
            Box::new(SoftModemCodec::new(Mode::Forward)),
            Box::new(SoftModemCodec::new(Mode::Control)),
            mode.clone(),
            is_transmitting,
            halted_tx.clone(),
            tx_volume.clone(),
            event_tx,
            cmd_rx,
        );
        let worker = std::thread::spawn(move || engine.run());

        (
            Self {
                cmd_tx,
                tx_volume,
                halted_tx,
                tx_ring,
                mode,
                soundcard,
                worker: Some(worker),
            },
            event_rx,
        )
    }

    /// Fails immediately with `StationError::Protocol(ArqError::PayloadTooLarge { .. })`
    /// if `data` needs more than 255 forward frames, instead of handing it to the engine
    /// to discover and drop (§7).
    pub fn submit_payload(&self, data: Vec<u8>) -> Result<(), StationError> {
        let capacity = FORWARD_PAYLOAD_LEN * 255;
        if data.len() > capacity {
            return Err(StationError::Protocol(ArqError::PayloadTooLarge {
                provided: data.len(),
                capacity,
            }));
        }
        self.cmd_tx
            .send(EngineCommand::Transmit(data))
            .map_err(|_| StationError::EngineGone)
    }

    pub fn submit_retransmit_request(&self) -> Result<(), StationError> {
        self.cmd_tx
            .send(EngineCommand::RequestRetransmit)
            .map_err(|_| StationError::EngineGone)
    }

    pub fn submit_test_frame(&self) -> Result<(), StationError> {
        self.cmd_tx
            .send(EngineCommand::TransmitTest)
            .map_err(|_| StationError::EngineGone)
    }

    /// Clamped to 0..=100.
    pub fn set_tx_volume(&self, percent: u8) {
        self.tx_volume.store(percent.min(100), Ordering::Release);
    }

    /// Drain the TX ring immediately and mark the in-flight transmission as halted; the
    /// send path checks this after its drain loop unblocks and skips the ARQ wait
    /// (§4.5.1, §5 cancellation).
    pub fn halt_tx(&self) {
        self.tx_ring.drain();
        self.halted_tx.store(true, Ordering::Release);
    }

    pub fn current_mode(&self) -> Mode {
        match self.mode.load(Ordering::Acquire) {
            0 => Mode::Forward,
            _ => Mode::Control,
        }
    }

    /// Signal the engine worker to exit and close the sound device, if any. Blocks
    /// until the worker thread has joined.
    pub fn stop(mut self) -> Result<(), StationError> {
        let _ = self.cmd_tx.send(EngineCommand::Stop);
        if let Some(soundcard) = self.soundcard.take() {
            soundcard.close();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        Ok(())
    }
}
