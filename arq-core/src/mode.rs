/// The two modem configurations multiplexed over a single audio pipe.
///
/// A station transmits and receives in exactly one mode at a time; the two codec
/// instances behind them are otherwise fully independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// High-throughput mode carrying application payload, 126-byte frames.
    Forward,
    /// Low-rate mode carrying retransmit requests and test frames, 14-byte frames.
    Control,
}

impl Mode {
    /// Total frame size in bytes, including the ARQ header, as delivered by the codec
    /// after it has stripped the CRC-16.
    pub const fn frame_bytes(self) -> usize {
        match self {
            Mode::Forward => 126,
            Mode::Control => 14,
        }
    }
}
