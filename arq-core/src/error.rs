use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ArqError {
    #[error("push into audio ring would exceed its capacity")]
    AudioOverflow,

    #[error("payload needs more than 255 forward frames: provided {provided} bytes, capacity {capacity} bytes across 255 frames")]
    PayloadTooLarge { provided: usize, capacity: usize },

    #[error("callsign contains a non-ASCII byte")]
    InvalidCallsignCharacters,

    #[error("callsign is {0} bytes long; maximum is 10")]
    CallsignTooLong(usize),

    #[error("frame is {0} bytes long, expected {1}")]
    WrongFrameLength(usize, usize),
}
