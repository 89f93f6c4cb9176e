use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("max_colors must be at least 1, got {0}")]
    InvalidMaxColors(u32),

    #[error("max_iterations must be at least 1, got {0}")]
    InvalidMaxIterations(u32),

    #[error("pixel input is empty")]
    EmptyInput,

    #[error("pixel input contains no fully opaque pixels")]
    NoOpaquePixels,

    #[error("pixel buffer length {len} is not a multiple of {channels} channels")]
    BufferLength { len: usize, channels: usize },
}
