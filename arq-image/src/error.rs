use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageCodecError {
    #[error("failed to decode image bytes: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}
