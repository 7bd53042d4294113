//! Error types for the editing pipeline.
//!
//! Each stage has its own error so callers can tell a bad upload from a bad
//! selection from a failed export; [`Error`] wraps them for `?` across stages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty audio input")]
    Empty,

    #[error("unrecognized audio format: {0}")]
    Unsupported(String),

    #[error("no default audio track")]
    NoTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("decoder: {0}")]
    Codec(String),

    #[error("read audio: {0}")]
    Io(#[from] std::io::Error),
}

/// Selection, crop, trim or fade bounds that do not fit the buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("range {start}..{end} s outside 0..{duration} s")]
    Bounds { start: f64, end: f64, duration: f64 },

    #[error("range {start}..{end} s maps to no samples")]
    Empty { start: f64, end: f64 },

    #[error("pixel width must be positive")]
    ZeroWidth,

    #[error("invalid buffer: {0}")]
    Buffer(&'static str),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("no channels to encode")]
    NoChannels,

    #[error("channel {index} has {len} samples, expected {expected}")]
    ChannelMismatch {
        index: usize,
        len: usize,
        expected: usize,
    },

    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("mp3: {0}")]
    Lame(String),

    #[error("encoder worker is gone")]
    WorkerGone,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unsupported mp3 bitrate: {0} kbps")]
    Bitrate(u32),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),

    #[error("no audio loaded")]
    NoBuffer,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
