pub mod audio_ring;
pub mod callsign;
pub mod crc;
pub mod error;
pub mod frame;
pub mod mode;
pub mod session;

pub use audio_ring::AudioRing;
pub use callsign::Callsign;
pub use error::ArqError;
pub use frame::{pack_burst, pack_test_frame, ControlFrame, ForwardFrame};
pub use mode::Mode;
pub use session::{MissedFrames, ReceiverSession, SenderSession};
