//! ARQ engine: the state machine coordinating burst transmission, ARQ waits, gap
//! detection, and retransmit requests (§4.5, §4.6).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arq_core::{
    pack_burst, pack_test_frame, ArqError, AudioRing, Callsign, ControlFrame, ForwardFrame,
    MissedFrames, Mode, ReceiverSession, SenderSession,
};
use log::{debug, warn};

use crate::codec::ModemCodec;

/// Timing constants and device parameters, collected into one struct for testability
/// (the underlying numbers are the ones fixed by the reference design).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub arq_wait_time: Duration,
    pub retransmit_wait_time: Duration,
    pub retransmit_request_retries: u8,
    pub max_arq_rounds: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            arq_wait_time: Duration::from_secs(15),
            retransmit_wait_time: Duration::from_secs(7),
            retransmit_request_retries: 2,
            max_arq_rounds: 8,
        }
    }
}

/// Events posted upward to the station's caller.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TransmitActive(bool),
    RxCallsign(Callsign),
    RxPayload(Vec<u8>),
    RetransmitFailed,
    /// `submit_payload` was given data that needs more than 255 forward frames (§7).
    PayloadTooLarge(ArqError),
}

/// Commands accepted from the station handle.
pub enum EngineCommand {
    Transmit(Vec<u8>),
    RequestRetransmit,
    TransmitTest,
    Stop,
}

const FORWARD_MODE_CODE: u8 = 0;
const CONTROL_MODE_CODE: u8 = 1;

fn mode_code(mode: Mode) -> u8 {
    match mode {
        Mode::Forward => FORWARD_MODE_CODE,
        Mode::Control => CONTROL_MODE_CODE,
    }
}

const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// The state machine itself. Owns both per-mode codec instances and the two audio
/// rings; runs on a single dedicated worker thread via `run`.
pub struct ArqEngine {
    callsign: Callsign,
    config: EngineConfig,
    rx_ring: Arc<AudioRing>,
    tx_ring: Arc<AudioRing>,
    forward_codec: Box<dyn ModemCodec + Send>,
    control_codec: Box<dyn ModemCodec + Send>,
    sender: SenderSession,
    receiver: ReceiverSession,
    mode: Arc<AtomicU8>,
    is_transmitting: Arc<AtomicBool>,
    halted_tx: Arc<AtomicBool>,
    tx_volume: Arc<AtomicU8>,
    event_tx: SyncSender<EngineEvent>,
    cmd_rx: Receiver<EngineCommand>,
}

#[allow(clippy::too_many_arguments)]
impl ArqEngine {
    pub fn new(
        callsign: Callsign,
        config: EngineConfig,
        rx_ring: Arc<AudioRing>,
        tx_ring: Arc<AudioRing>,
        forward_codec: Box<dyn ModemCodec + Send>,
        control_codec: Box<dyn ModemCodec + Send>,
        mode: Arc<AtomicU8>,
        is_transmitting: Arc<AtomicBool>,
        halted_tx: Arc<AtomicBool>,
        tx_volume: Arc<AtomicU8>,
        event_tx: SyncSender<EngineEvent>,
        cmd_rx: Receiver<EngineCommand>,
    ) -> Self {
        Self {
            callsign,
            config,
            rx_ring,
            tx_ring,
            forward_codec,
            control_codec,
            sender: SenderSession::new(),
            receiver: ReceiverSession::new(),
            mode,
            is_transmitting,
            halted_tx,
            tx_volume,
            event_tx,
            cmd_rx,
        }
    }

    /// Drive the engine loop until a `Stop` command arrives or the command channel is
    /// dropped. Intended to be the body of a dedicated worker thread (§4.6).
    pub fn run(mut self) {
        let mut pending_test = false;
        let mut pending_retransmit = false;
        let mut pending_transmit: Option<Vec<u8>> = None;

        'outer: loop {
            loop {
                match self.cmd_rx.try_recv() {
                    Ok(EngineCommand::TransmitTest) => pending_test = true,
                    Ok(EngineCommand::RequestRetransmit) => pending_retransmit = true,
                    Ok(EngineCommand::Transmit(data)) => pending_transmit = Some(data),
                    Ok(EngineCommand::Stop) => break 'outer,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'outer,
                }
            }

            if pending_test {
                pending_test = false;
                self.transmit_test();
            } else if pending_retransmit {
                pending_retransmit = false;
                self.request_retransmit();
            } else if let Some(data) = pending_transmit.take() {
                self.transmit(&data);
            } else if !self.receive_tick() {
                thread::sleep(IDLE_SLEEP);
            }
        }

        self.rx_ring.drain();
        self.tx_ring.drain();
        debug!("engine worker stopped");
    }

    fn set_mode(&self, mode: Mode) {
        self.mode.store(mode_code(mode), Ordering::Release);
    }

    fn codec_for_mut(&mut self, mode: Mode) -> &mut (dyn ModemCodec + Send) {
        match mode {
            Mode::Forward => self.forward_codec.as_mut(),
            Mode::Control => self.control_codec.as_mut(),
        }
    }

    fn push_modulated(&self, samples: Vec<i16>) {
        let volume = self.tx_volume.load(Ordering::Acquire) as i32;
        let scaled: Vec<i16> = samples
            .iter()
            .map(|s| ((*s as i32 * volume) / 100) as i16)
            .collect();
        if let Err(e) = self.tx_ring.push(&scaled) {
            warn!("tx ring overflow: {e}");
        }
    }

    fn wait_for_tx_drain(&self) {
        while self.tx_ring.available() > 0 {
            thread::sleep(IDLE_SLEEP);
        }
    }

    /// Pop `nin()` samples for `mode`'s codec if available and demodulate them. Returns
    /// the decoded payload (CRC already stripped), or `None` if nothing completed this
    /// tick. Updates the receiver session's liveness timestamp on nonzero sync in
    /// forward mode, per §4.4 step 4.
    fn demod_once(&mut self, mode: Mode) -> Option<Vec<u8>> {
        let want = self.codec_for_mut(mode).nin();
        if self.rx_ring.available() < want {
            return None;
        }
        let samples = self.rx_ring.pop(want);
        let (sync, payload) = self.codec_for_mut(mode).demodulate(&samples);
        if sync != 0 && mode == Mode::Forward {
            self.receiver.note_sync(Instant::now());
        }
        if payload.is_empty() {
            None
        } else {
            Some(payload)
        }
    }

    /// §4.5.1 send path.
    fn transmit(&mut self, data: &[u8]) {
        let frames = match pack_burst(data, self.callsign, self.sender.tx_id) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("cannot transmit payload: {e}");
                let _ = self.event_tx.try_send(EngineEvent::PayloadTooLarge(e));
                return;
            }
        };
        self.sender.frames = frames.clone();

        self.set_mode(Mode::Forward);
        self.is_transmitting.store(true, Ordering::Release);
        let _ = self.event_tx.try_send(EngineEvent::TransmitActive(true));

        for frame in &frames {
            let samples = self.forward_codec.modulate_burst(&frame.pack());
            self.push_modulated(samples);
        }
        self.wait_for_tx_drain();

        self.is_transmitting.store(false, Ordering::Release);
        let _ = self.event_tx.try_send(EngineEvent::TransmitActive(false));

        if self.halted_tx.swap(false, Ordering::AcqRel) {
            debug!("transmission halted by user; skipping ARQ wait");
            return;
        }

        self.set_mode(Mode::Control);
        self.run_arq_wait();
        self.sender.advance_tx_id();
    }

    /// §4.5.3 bounded ARQ wait, run after the sender's burst train has drained.
    fn run_arq_wait(&mut self) {
        for round in 0..self.config.max_arq_rounds {
            match self.wait_for_control_frame(self.config.arq_wait_time) {
                Some(control) => {
                    self.sender.last_arq_peer = Some(control.callsign);
                    debug!(
                        "arq round {round}: retransmit request for frame {}",
                        control.retransmit_id
                    );
                    self.retransmit_one_frame(control.retransmit_id);
                    self.set_mode(Mode::Control);
                }
                None => {
                    debug!("arq wait complete after {round} round(s)");
                    return;
                }
            }
        }
        warn!(
            "arq wait hit max_arq_rounds ({}); treating train as acknowledged",
            self.config.max_arq_rounds
        );
    }

    fn wait_for_control_frame(&mut self, timeout: Duration) -> Option<ControlFrame> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.demod_once(Mode::Control) {
                Some(payload) => {
                    if let Ok(control) = ControlFrame::unpack(&payload) {
                        return Some(control);
                    }
                }
                None => thread::sleep(IDLE_SLEEP),
            }
        }
        None
    }

    fn retransmit_one_frame(&mut self, frame_id: u8) {
        let Some(frame) = self.sender.frame(frame_id).cloned() else {
            warn!("retransmit request for unknown frame_id {frame_id}");
            return;
        };
        self.set_mode(Mode::Forward);
        let samples = self.forward_codec.modulate_burst(&frame.pack());
        self.push_modulated(samples);
        self.wait_for_tx_drain();
    }

    /// §4.5.2 receive path. Returns whether it made progress (a complete or partial
    /// frame arrived), used by the engine loop to decide whether to yield.
    fn receive_tick(&mut self) -> bool {
        self.set_mode(Mode::Forward);
        let Some(payload) = self.demod_once(Mode::Forward) else {
            return false;
        };
        let Ok(frame) = ForwardFrame::unpack(&payload) else {
            debug!("dropped malformed forward frame");
            return true;
        };
        self.handle_received_forward_frame(frame);
        true
    }

    fn handle_received_forward_frame(&mut self, frame: ForwardFrame) {
        let peer = frame.callsign;
        self.receiver.handle_frame(&frame, Instant::now());
        let _ = self.event_tx.try_send(EngineEvent::RxCallsign(peer));
        if let Some(complete) = self.receiver.take_payload() {
            let _ = self.event_tx.try_send(EngineEvent::RxPayload(complete));
        }
    }

    /// §4.6 step 1: send a control-mode test burst.
    fn transmit_test(&mut self) {
        self.set_mode(Mode::Control);
        let bytes = pack_test_frame(self.callsign);
        let samples = self.control_codec.modulate_burst(&bytes);
        self.push_modulated(samples);
        self.wait_for_tx_drain();
    }

    /// §4.5.4 retransmit request, run on explicit user command.
    fn request_retransmit(&mut self) {
        for round in 0..self.config.max_arq_rounds {
            let missing = match self.receiver.check_missed_frames(Instant::now()) {
                MissedFrames::Missing(ids) if !ids.is_empty() => ids,
                _ => {
                    debug!("nothing to retransmit (round {round})");
                    return;
                }
            };
            for frame_id in missing {
                if !self.request_one_retransmit(frame_id) {
                    warn!("retransmit failed for frame {frame_id} after all retries");
                    let _ = self.event_tx.try_send(EngineEvent::RetransmitFailed);
                    return;
                }
            }
        }
        warn!(
            "retransmit request hit max_arq_rounds ({}) without closing all gaps",
            self.config.max_arq_rounds
        );
    }

    fn request_one_retransmit(&mut self, frame_id: u8) -> bool {
        let Some(peer) = self.receiver.peer_callsign() else {
            return false;
        };
        for attempt in 0..self.config.retransmit_request_retries {
            self.set_mode(Mode::Control);
            let control = ControlFrame {
                callsign: peer,
                retransmit_id: frame_id,
            };
            let samples = self.control_codec.modulate_burst(&control.pack());
            self.push_modulated(samples);
            self.wait_for_tx_drain();

            self.set_mode(Mode::Forward);
            if self.wait_for_retransmit(self.config.retransmit_wait_time) {
                return true;
            }
            debug!("retransmit attempt {attempt} for frame {frame_id} timed out");
        }
        false
    }

    fn wait_for_retransmit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.demod_once(Mode::Forward) {
                Some(payload) => {
                    if let Ok(frame) = ForwardFrame::unpack(&payload) {
                        self.handle_received_forward_frame(frame);
                        return true;
                    }
                }
                None => thread::sleep(IDLE_SLEEP),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SoftModemCodec;
    use std::sync::mpsc::sync_channel;

    fn make_engine(
        callsign: &str,
    ) -> (
        ArqEngine,
        Arc<AudioRing>,
        Arc<AudioRing>,
        SyncSender<EngineCommand>,
        Receiver<EngineEvent>,
    ) {
        let rx_ring = Arc::new(AudioRing::new(1_000_000));
        let tx_ring = Arc::new(AudioRing::new(1_000_000));
        let (cmd_tx, cmd_rx) = sync_channel(16);
        let (event_tx, event_rx) = sync_channel(16);
        let engine = ArqEngine::new(
            Callsign::new(callsign).unwrap(),
            EngineConfig::default(),
            rx_ring.clone(),
            tx_ring.clone(),
            Box::new(SoftModemCodec::new(Mode::Forward)),
            Box::new(SoftModemCodec::new(Mode::Control)),
            Arc::new(AtomicU8::new(0)),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU8::new(100)),
            event_tx,
            cmd_rx,
        );
        (engine, rx_ring, tx_ring, cmd_tx, event_rx)
    }

    #[test]
    fn transmit_test_frame_fills_tx_ring() {
        let (mut engine, _rx, tx_ring, _cmd_tx, _events) = make_engine("KO4VMI");
        let stop = Arc::new(AtomicBool::new(false));
        let drained = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let drain = {
            let tx_ring = tx_ring.clone();
            let stop = stop.clone();
            let drained = drained.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(1));
                    let n = tx_ring.available();
                    if n > 0 {
                        tx_ring.pop(n);
                        drained.fetch_add(n, Ordering::AcqRel);
                    }
                }
            })
        };
        engine.transmit_test();
        stop.store(true, Ordering::Release);
        drain.join().unwrap();
        assert!(drained.load(Ordering::Acquire) > 0);
    }

    #[test]
    fn volume_scaling_halves_amplitude() {
        let (engine, _rx, tx_ring, _cmd_tx, _events) = make_engine("KO4VMI");
        engine.tx_volume.store(50, Ordering::Release);
        engine.push_modulated(vec![1000, -1000, 2000]);
        let samples = tx_ring.pop(3);
        assert_eq!(samples, vec![500, -500, 1000]);
    }

    #[test]
    fn transmit_does_not_advance_tx_id_when_halted() {
        let (mut engine, _rx, tx_ring, _cmd_tx, _events) = make_engine("KO4VMI");
        engine.halted_tx.store(true, Ordering::Release);
        // Drain the tx ring as the real-time audio callback would, so wait_for_tx_drain
        // returns promptly instead of spinning against a full buffer in this test.
        let stop = Arc::new(AtomicBool::new(false));
        let drain = {
            let tx_ring = tx_ring.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(1));
                    let n = tx_ring.available();
                    if n > 0 {
                        tx_ring.pop(n);
                    }
                }
            })
        };
        engine.transmit(b"hello");
        stop.store(true, Ordering::Release);
        drain.join().unwrap();
        assert_eq!(engine.sender.tx_id, 0);
    }
}
