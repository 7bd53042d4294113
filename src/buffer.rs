use crate::error::RangeError;

/// Decoded multi-channel audio. Immutable once built; edits produce a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>, // per-channel samples in [-1, 1]
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, RangeError> {
        if channels.is_empty() {
            return Err(RangeError::Buffer("at least one channel required"));
        }
        if sample_rate == 0 {
            return Err(RangeError::Buffer("sample rate must be positive"));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(RangeError::Buffer("channels differ in length"));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn from_mono(mono: Vec<f32>, sample_rate: u32) -> Result<Self, RangeError> {
        Self::from_channels(vec![mono], sample_rate)
    }

    /// `frames` of silence on every channel.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Result<Self, RangeError> {
        Self::from_channels(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Always derived from the frame count; never cached.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Builds a sibling buffer with the same rate; used by the transforms.
    pub(crate) fn with_channels(&self, channels: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(channels.len(), self.channels.len());
        Self {
            channels,
            sample_rate: self.sample_rate,
        }
    }
}
