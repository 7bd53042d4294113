pub mod audio;
pub mod audio_io;
pub mod buffer;
pub mod config;
pub mod edit;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod playback;
pub mod session;
pub mod wav;
pub mod wave;

pub use buffer::SampleBuffer;
pub use config::EditorConfig;
pub use error::{DecodeError, EncodeError, Error, RangeError, Result};
pub use playback::{LoopMode, PlaybackController, PlayerState, Selection};
pub use session::EditorSession;
