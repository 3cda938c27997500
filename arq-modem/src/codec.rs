//! Modem codec binding (§4.2, §6.2 of the design): the per-mode modulator/demodulator
//! boundary the engine treats as a black box.
//!
//! The real narrowband modem library is a native dependency outside this repository's
//! reach, so this module defines the `ModemCodec` trait the engine actually programs
//! against and ships `SoftModemCodec`, a software reference implementation built on a
//! simple line code and preamble correlation, in the spirit of `m17core::modem`'s
//! `SoftDemodulator`/`SoftModulator` pair. A production build swaps in a real FFI binding
//! behind the same trait.

use arq_core::crc::gen_crc16;
use arq_core::mode::Mode;

/// Peak sample amplitude used by the line code.
const AMPLITUDE: i16 = 16000;
/// Samples per line-code symbol.
const SAMPLES_PER_SYMBOL: usize = 10;
/// 50 ms of post-burst silence at 8 kHz, per §4.2.
const SILENCE_SAMPLES: usize = 400;
/// A fixed alternating bit pattern used as a correlation target for burst sync.
const PREAMBLE: [u8; 32] = [
    0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1,
];
/// Fixed bit pattern trailing every frame, giving the filter state somewhere to settle.
const POSTAMBLE: [u8; 8] = [1, 1, 0, 0, 1, 1, 0, 0];

/// The contract the engine programs against for one mode instance. One instance exists
/// per `Mode`; the two are otherwise fully independent.
pub trait ModemCodec {
    /// Total samples for one burst: preamble, one frame, postamble, and trailing silence.
    /// Used to size output buffers.
    fn samples_per_burst(&self) -> usize;

    /// How many input samples the demodulator wants on the next call. Must be re-read
    /// after every `demodulate` call.
    fn nin(&self) -> usize;

    /// Modulate one already-CRC-free frame (callsign/header/payload, without the trailing
    /// CRC-16) into preamble || frame || postamble || silence. The codec appends the CRC
    /// internally.
    fn modulate_burst(&self, frame_bytes: &[u8]) -> Vec<i16>;

    /// Feed exactly `nin()` samples. Returns `(sync_status, payload)`; `sync_status` is
    /// nonzero when the demodulator is locked to a signal. An empty payload means no frame
    /// completed on this tick.
    fn demodulate(&mut self, samples: &[i16]) -> (u32, Vec<u8>);
}

/// Software reference `ModemCodec`. Deterministic and lossless by construction: it is
/// meant for loopback testing and development without a sound card or the vendor
/// library, not for use over a real noisy channel.
pub struct SoftModemCodec {
    mode: Mode,
    buffer: Vec<i16>,
}

impl SoftModemCodec {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
        }
    }

    fn bits_per_frame(&self) -> usize {
        (self.mode.frame_bytes() + 2) * 8
    }

    fn frame_samples(&self) -> usize {
        self.bits_per_frame() * SAMPLES_PER_SYMBOL
    }

    fn preamble_samples(&self) -> usize {
        PREAMBLE.len() * SAMPLES_PER_SYMBOL
    }

    fn postamble_samples(&self) -> usize {
        POSTAMBLE.len() * SAMPLES_PER_SYMBOL
    }
}

fn symbol_sample(bit: u8) -> i16 {
    if bit != 0 {
        AMPLITUDE
    } else {
        -AMPLITUDE
    }
}

fn push_symbols(out: &mut Vec<i16>, bits: &[u8]) {
    for &bit in bits {
        let sample = symbol_sample(bit);
        for _ in 0..SAMPLES_PER_SYMBOL {
            out.push(sample);
        }
    }
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}

/// Majority-vote a run of `SAMPLES_PER_SYMBOL` samples back to a bit.
fn decode_symbol(samples: &[i16]) -> u8 {
    let positive = samples.iter().filter(|s| **s >= 0).count();
    if positive * 2 >= samples.len() {
        1
    } else {
        0
    }
}

fn decode_symbols(samples: &[i16]) -> Vec<u8> {
    samples
        .chunks(SAMPLES_PER_SYMBOL)
        .map(decode_symbol)
        .collect()
}

fn preamble_matches(window: &[i16]) -> bool {
    decode_symbols(window) == PREAMBLE
}

impl ModemCodec for SoftModemCodec {
    fn samples_per_burst(&self) -> usize {
        self.preamble_samples() + self.frame_samples() + self.postamble_samples() + SILENCE_SAMPLES
    }

    fn nin(&self) -> usize {
        let needed = self.preamble_samples() + self.frame_samples();
        needed.saturating_sub(self.buffer.len()).max(SAMPLES_PER_SYMBOL)
    }

    fn modulate_burst(&self, frame_bytes: &[u8]) -> Vec<i16> {
        debug_assert_eq!(frame_bytes.len(), self.mode.frame_bytes());
        let crc = gen_crc16(frame_bytes);
        let mut with_crc = Vec::with_capacity(frame_bytes.len() + 2);
        with_crc.extend_from_slice(frame_bytes);
        with_crc.extend_from_slice(&crc.to_be_bytes());

        let mut out = Vec::with_capacity(self.samples_per_burst());
        push_symbols(&mut out, &PREAMBLE);
        push_symbols(&mut out, &bytes_to_bits(&with_crc));
        push_symbols(&mut out, &POSTAMBLE);
        out.resize(out.len() + SILENCE_SAMPLES, 0);
        out
    }

    fn demodulate(&mut self, samples: &[i16]) -> (u32, Vec<u8>) {
        self.buffer.extend_from_slice(samples);
        let preamble_samples = self.preamble_samples();
        let frame_samples = self.frame_samples();
        let needed = preamble_samples + frame_samples;

        loop {
            if self.buffer.len() < needed {
                return (0, Vec::new());
            }
            if preamble_matches(&self.buffer[0..preamble_samples]) {
                let frame_window = &self.buffer[preamble_samples..needed];
                let bits = decode_symbols(frame_window);
                let with_crc = bits_to_bytes(&bits);
                self.buffer.drain(0..needed);

                let payload_len = self.mode.frame_bytes();
                let (payload, crc_bytes) = with_crc.split_at(payload_len);
                let expected = gen_crc16(payload);
                let actual = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
                if actual != expected {
                    return (1, Vec::new());
                }
                return (1, payload.to_vec());
            }
            self.buffer.remove(0);
        }
    }
}
