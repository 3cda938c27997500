//! Per-direction protocol state: the sender's last burst-train frames, and the receiver's
//! per-(callsign, tx_id) frame map with gap detection.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::callsign::Callsign;
use crate::frame::{ForwardFrame, FORWARD_PAYLOAD_LEN};

/// How long after the last sync we keep waiting before declaring missing frames (§4.4).
pub const QUIET_THRESHOLD: Duration = Duration::from_secs(5);
/// How long a session can go without activity before it is considered abandoned (§9).
pub const SESSION_STALENESS: Duration = Duration::from_secs(60);

/// The sender's view of the burst train it most recently transmitted.
///
/// `frames` is rebuilt from scratch at the start of every `transmit`; any control-mode
/// retransmit request indexes into it by `frame_id`.
#[derive(Debug, Default)]
pub struct SenderSession {
    pub frames: Vec<ForwardFrame>,
    pub tx_id: u8,
    /// Last peer callsign observed acknowledging or requesting retransmission. Diagnostics
    /// only — nothing in the engine currently branches on this, mirroring the reference
    /// implementation.
    pub last_arq_peer: Option<Callsign>,
}

impl SenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self, frame_id: u8) -> Option<&ForwardFrame> {
        self.frames.get(frame_id as usize)
    }

    /// Advance to the next tx_id, wrapping from 255 back to 0.
    pub fn advance_tx_id(&mut self) {
        self.tx_id = self.tx_id.wrapping_add(1);
    }
}

/// Result of `ReceiverSession::check_missed_frames`.
///
/// The reference implementation conflates "still within the quiet window" and "nothing to
/// check" with the list of missing frame ids by returning `None`/`False`/`list`; this keeps
/// the three cases distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissedFrames {
    /// No session has ever seen sync.
    NoSession,
    /// Still within `QUIET_THRESHOLD` of the last sync; the rest of the train may still land.
    StillReceiving,
    /// Past the quiet window: these frame ids (possibly empty) are missing.
    Missing(Vec<u8>),
}

/// The receiver's view of at most one active burst train.
#[derive(Debug, Default)]
pub struct ReceiverSession {
    callsign: Option<Callsign>,
    tx_id: Option<u8>,
    num_frames: Option<u8>,
    frames: HashMap<u8, [u8; FORWARD_PAYLOAD_LEN]>,
    last_sync: Option<Instant>,
}

impl ReceiverSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_callsign(&self) -> Option<Callsign> {
        self.callsign
    }

    /// Record a decoded frame. If it belongs to a different `(callsign, tx_id)` than the
    /// current session, or the current session has gone stale, prior frames are discarded
    /// first.
    pub fn handle_frame(&mut self, frame: &ForwardFrame, now: Instant) {
        let is_new_session = self.callsign != Some(frame.callsign)
            || self.tx_id != Some(frame.tx_id)
            || self.is_stale(now);
        if is_new_session {
            self.frames.clear();
        }
        self.frames.insert(frame.frame_id, frame.payload);
        self.callsign = Some(frame.callsign);
        self.tx_id = Some(frame.tx_id);
        self.num_frames = Some(frame.num_frames);
        self.last_sync = Some(now);
    }

    /// Update the liveness timestamp whenever the demodulator reports sync, whether or not a
    /// full frame completed on this tick.
    pub fn note_sync(&mut self, now: Instant) {
        self.last_sync = Some(now);
    }

    fn is_stale(&self, now: Instant) -> bool {
        match self.last_sync {
            Some(last) => now.duration_since(last) > SESSION_STALENESS,
            None => false,
        }
    }

    pub fn check_missed_frames(&self, now: Instant) -> MissedFrames {
        let (Some(last_sync), Some(num_frames)) = (self.last_sync, self.num_frames) else {
            return MissedFrames::NoSession;
        };
        if now.duration_since(last_sync) <= QUIET_THRESHOLD {
            return MissedFrames::StillReceiving;
        }
        let missing: Vec<u8> = (0..num_frames)
            .filter(|id| !self.frames.contains_key(id))
            .collect();
        MissedFrames::Missing(missing)
    }

    /// If every frame_id in `[0, num_frames)` is present, concatenate them in order, clear
    /// the session, and return the assembled payload. Otherwise leave the session untouched.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        let num_frames = self.num_frames?;
        for id in 0..num_frames {
            self.frames.get(&id)?;
        }
        let mut out = Vec::with_capacity(num_frames as usize * FORWARD_PAYLOAD_LEN);
        for id in 0..num_frames {
            out.extend_from_slice(&self.frames[&id]);
        }
        self.num_frames = None;
        self.frames.clear();
        Some(out)
    }
}
