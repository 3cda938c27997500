//! Packing and unpacking of forward- and control-mode frames.

use crate::callsign::{Callsign, CALLSIGN_BYTES};
use crate::error::ArqError;

pub const FORWARD_FRAME_LEN: usize = 126;
pub const CONTROL_FRAME_LEN: usize = 14;

const TX_ID_OFFSET: usize = CALLSIGN_BYTES;
const FRAME_ID_OFFSET: usize = TX_ID_OFFSET + 1;
const NUM_FRAMES_OFFSET: usize = FRAME_ID_OFFSET + 1;
const PAYLOAD_OFFSET: usize = NUM_FRAMES_OFFSET + 1;

/// Header overhead in every forward frame: callsign(10) || tx_id(1) || frame_id(1) || num_frames(1).
pub const FORWARD_HEADER_LEN: usize = PAYLOAD_OFFSET;
/// Application bytes carried per forward frame after the header.
pub const FORWARD_PAYLOAD_LEN: usize = FORWARD_FRAME_LEN - FORWARD_HEADER_LEN;

const RETRANSMIT_ID_OFFSET: usize = CALLSIGN_BYTES;

/// A decoded forward-mode frame, one burst's worth of application payload plus its ARQ header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardFrame {
    pub callsign: Callsign,
    pub tx_id: u8,
    pub frame_id: u8,
    pub num_frames: u8,
    pub payload: [u8; FORWARD_PAYLOAD_LEN],
}

impl ForwardFrame {
    pub fn pack(&self) -> [u8; FORWARD_FRAME_LEN] {
        let mut out = [0u8; FORWARD_FRAME_LEN];
        out[0..CALLSIGN_BYTES].copy_from_slice(self.callsign.as_bytes());
        out[TX_ID_OFFSET] = self.tx_id;
        out[FRAME_ID_OFFSET] = self.frame_id;
        out[NUM_FRAMES_OFFSET] = self.num_frames;
        out[PAYLOAD_OFFSET..].copy_from_slice(&self.payload);
        out
    }

    /// Unpack a raw 126-byte frame as delivered by the codec (CRC already stripped).
    pub fn unpack(bytes: &[u8]) -> Result<Self, ArqError> {
        if bytes.len() != FORWARD_FRAME_LEN {
            return Err(ArqError::WrongFrameLength(bytes.len(), FORWARD_FRAME_LEN));
        }
        let mut callsign_bytes = [0u8; CALLSIGN_BYTES];
        callsign_bytes.copy_from_slice(&bytes[0..CALLSIGN_BYTES]);
        let mut payload = [0u8; FORWARD_PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[PAYLOAD_OFFSET..]);
        Ok(Self {
            callsign: Callsign::from_padded_bytes(callsign_bytes),
            tx_id: bytes[TX_ID_OFFSET],
            frame_id: bytes[FRAME_ID_OFFSET],
            num_frames: bytes[NUM_FRAMES_OFFSET],
            payload,
        })
    }
}

/// A control-mode frame: either a retransmit request or (by convention) a test frame whose
/// payload happens to read "TEST".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub callsign: Callsign,
    pub retransmit_id: u8,
}

impl ControlFrame {
    pub fn pack(&self) -> [u8; CONTROL_FRAME_LEN] {
        let mut out = [0u8; CONTROL_FRAME_LEN];
        out[0..CALLSIGN_BYTES].copy_from_slice(self.callsign.as_bytes());
        out[RETRANSMIT_ID_OFFSET] = self.retransmit_id;
        out
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self, ArqError> {
        if bytes.len() != CONTROL_FRAME_LEN {
            return Err(ArqError::WrongFrameLength(bytes.len(), CONTROL_FRAME_LEN));
        }
        let mut callsign_bytes = [0u8; CALLSIGN_BYTES];
        callsign_bytes.copy_from_slice(&bytes[0..CALLSIGN_BYTES]);
        Ok(Self {
            callsign: Callsign::from_padded_bytes(callsign_bytes),
            retransmit_id: bytes[RETRANSMIT_ID_OFFSET],
        })
    }
}

/// Builds the control-mode test-frame burst: `callsign(10) || "TEST"`, in place of the usual
/// `retransmit_id(1) || reserved(3)` fields. There is no separate frame-type tag; a station
/// distinguishes a test burst from a retransmit request only by context (it sent one on
/// purpose and isn't expecting a reply).
pub fn pack_test_frame(callsign: Callsign) -> [u8; CONTROL_FRAME_LEN] {
    let mut out = [0u8; CONTROL_FRAME_LEN];
    out[0..CALLSIGN_BYTES].copy_from_slice(callsign.as_bytes());
    out[RETRANSMIT_ID_OFFSET..RETRANSMIT_ID_OFFSET + 4].copy_from_slice(b"TEST");
    out
}

/// Splits application bytes into the forward frames of one burst train.
///
/// Empty `data` still produces a single frame with `num_frames = 1` (see design notes):
/// that keeps "nothing transmitted" out of the receiver's gap-detection logic, which would
/// otherwise need to special-case `num_frames == 0` as trivially complete.
pub fn pack_burst(
    data: &[u8],
    callsign: Callsign,
    tx_id: u8,
) -> Result<Vec<ForwardFrame>, ArqError> {
    let max_bytes = FORWARD_PAYLOAD_LEN * 255;
    if data.len() > max_bytes {
        return Err(ArqError::PayloadTooLarge {
            provided: data.len(),
            capacity: max_bytes,
        });
    }

    let num_frames = if data.is_empty() {
        1
    } else {
        data.len().div_ceil(FORWARD_PAYLOAD_LEN) as u8
    };

    let mut frames = Vec::with_capacity(num_frames as usize);
    for frame_id in 0..num_frames {
        let start = frame_id as usize * FORWARD_PAYLOAD_LEN;
        let end = (start + FORWARD_PAYLOAD_LEN).min(data.len());
        let mut payload = [0u8; FORWARD_PAYLOAD_LEN];
        if start < data.len() {
            payload[0..(end - start)].copy_from_slice(&data[start..end]);
        }
        frames.push(ForwardFrame {
            callsign,
            tx_id,
            frame_id,
            num_frames,
            payload,
        });
    }
    debug_assert_eq!(frames.len(), num_frames as usize);
    Ok(frames)
}
