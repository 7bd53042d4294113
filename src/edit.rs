//! Copy-on-write edits over a [`SampleBuffer`].
//!
//! Every transform maps times to sample indices once and applies the same
//! indices to all channels, so channels can never drift apart.

use crate::buffer::SampleBuffer;
use crate::error::RangeError;

/// Half-open sample range `[start, end)` shared by every channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRange {
    pub start: usize,
    pub end: usize,
}

impl SampleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// `floor(t / duration * frames)`, clamped so rounding never passes `frames`.
pub fn time_to_sample(t: f64, duration: f64, frames: usize) -> usize {
    if duration <= 0.0 || frames == 0 {
        return 0;
    }
    let idx = (t / duration * frames as f64).floor();
    if idx <= 0.0 {
        0
    } else {
        (idx as usize).min(frames)
    }
}

/// Validates `0 <= start < end <= duration` and maps it onto sample indices.
pub fn sample_range(buffer: &SampleBuffer, start: f64, end: f64) -> Result<SampleRange, RangeError> {
    let duration = buffer.duration();
    let in_bounds = start.is_finite()
        && end.is_finite()
        && start >= 0.0
        && start < end
        && end <= duration;
    if !in_bounds {
        return Err(RangeError::Bounds {
            start,
            end,
            duration,
        });
    }
    let frames = buffer.frame_count();
    let range = SampleRange {
        start: time_to_sample(start, duration, frames),
        end: time_to_sample(end, duration, frames),
    };
    if range.is_empty() {
        return Err(RangeError::Empty { start, end });
    }
    Ok(range)
}

/// Keeps only `[start, end)` seconds.
pub fn crop(buffer: &SampleBuffer, start: f64, end: f64) -> Result<SampleBuffer, RangeError> {
    let range = sample_range(buffer, start, end)?;
    let channels = buffer
        .channels()
        .iter()
        .map(|ch| ch[range.start..range.end].to_vec())
        .collect();
    tracing::debug!(start = range.start, end = range.end, "crop");
    Ok(buffer.with_channels(channels))
}

/// Removes `[start, end)` seconds and joins what is left on either side.
pub fn trim(buffer: &SampleBuffer, start: f64, end: f64) -> Result<SampleBuffer, RangeError> {
    let range = sample_range(buffer, start, end)?;
    let keep = buffer.frame_count() - range.len();
    let channels = buffer
        .channels()
        .iter()
        .map(|ch| {
            let mut out = Vec::with_capacity(keep);
            out.extend_from_slice(&ch[..range.start]);
            out.extend_from_slice(&ch[range.end..]);
            out
        })
        .collect();
    tracing::debug!(start = range.start, end = range.end, "trim");
    Ok(buffer.with_channels(channels))
}

fn fade_samples(secs: f64, sample_rate: u32, frames: usize) -> Option<usize> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let n = (secs * sample_rate as f64).floor() as usize;
    Some(n.min(frames))
}

/// Linear fade-in over the first `fade_in` seconds and fade-out over the last
/// `fade_out` seconds. When the ramps overlap both gains apply to the shared
/// samples.
pub fn fade(buffer: &SampleBuffer, fade_in: f64, fade_out: f64) -> Result<SampleBuffer, RangeError> {
    let frames = buffer.frame_count();
    let bounds = || RangeError::Bounds {
        start: fade_in,
        end: fade_out,
        duration: buffer.duration(),
    };
    let fade_in_samples = fade_samples(fade_in, buffer.sample_rate(), frames).ok_or_else(bounds)?;
    let fade_out_samples = fade_samples(fade_out, buffer.sample_rate(), frames).ok_or_else(bounds)?;

    let mut channels = buffer.channels().to_vec();
    for ch in channels.iter_mut() {
        let len = ch.len();
        for (i, v) in ch.iter_mut().take(fade_in_samples).enumerate() {
            *v *= i as f32 / fade_in_samples as f32;
        }
        for i in len - fade_out_samples..len {
            ch[i] *= (len - i) as f32 / fade_out_samples as f32;
        }
    }
    tracing::debug!(fade_in_samples, fade_out_samples, "fade");
    Ok(buffer.with_channels(channels))
}
