pub mod codec;
pub mod error;

pub use codec::{decode, decode_as, encode, DEFAULT_QUALITY};
pub use error::ImageCodecError;
