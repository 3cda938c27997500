pub mod codec;
pub mod engine;
pub mod error;
pub mod loopback;
pub mod soundcard;
pub mod station;

pub use codec::{ModemCodec, SoftModemCodec};
pub use engine::{ArqEngine, EngineCommand, EngineConfig, EngineEvent};
pub use error::StationError;
pub use loopback::LoopbackChannel;
pub use soundcard::{supported_input_cards, supported_output_cards, Soundcard, SoundcardError};
pub use station::Station;
