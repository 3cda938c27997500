use thiserror::Error;

use crate::soundcard::SoundcardError;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("station is already started")]
    AlreadyStarted,

    #[error("station has not been started")]
    NotStarted,

    #[error(transparent)]
    Protocol(#[from] arq_core::ArqError),

    #[error("sound device error: {0}")]
    Device(#[from] SoundcardError),

    #[error("engine worker has shut down; command was dropped")]
    EngineGone,
}
