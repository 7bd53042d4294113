use crate::buffer::SampleBuffer;
use crate::error::RangeError;
use crate::playback::Selection;

/// Min/max of one pixel column. `min > max` means the column saw no samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Column {
    pub min: f32,
    pub max: f32,
}

impl Column {
    const EMPTY: Column = Column { min: 1.0, max: -1.0 };

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Vertical extent `(y_top, y_bottom)` in a lane of `height` pixels.
    /// Empty columns collapse to a flat line through the middle.
    pub fn span(&self, height: f32) -> (f32, f32) {
        let amp = height / 2.0;
        if self.is_empty() {
            return (amp, amp);
        }
        ((1.0 + self.min) * amp, (1.0 + self.max) * amp)
    }
}

/// Lazy per-column envelope over channel 0. Cheap to clone and iterate again.
#[derive(Clone, Debug)]
pub struct Envelope<'a> {
    samples: &'a [f32],
    width: usize,
    step: usize,
}

impl<'a> Envelope<'a> {
    pub fn new(buffer: &'a SampleBuffer, width: usize) -> Result<Self, RangeError> {
        if width == 0 {
            return Err(RangeError::ZeroWidth);
        }
        let samples = buffer.channel(0).unwrap_or(&[]);
        let step = samples.len().div_ceil(width);
        Ok(Self {
            samples,
            width,
            step,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Samples scanned per column (`ceil(frames / width)`).
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn column(&self, i: usize) -> Option<Column> {
        if i >= self.width {
            return None;
        }
        let len = self.samples.len();
        let start = (i * self.step).min(len);
        let end = (start + self.step).min(len);
        let mut col = Column::EMPTY;
        for &v in &self.samples[start..end] {
            if v < col.min {
                col.min = v;
            }
            if v > col.max {
                col.max = v;
            }
        }
        Some(col)
    }

    pub fn iter(&self) -> Columns<'a> {
        Columns {
            envelope: self.clone(),
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &Envelope<'a> {
    type Item = Column;
    type IntoIter = Columns<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug)]
pub struct Columns<'a> {
    envelope: Envelope<'a>,
    next: usize,
}

impl Iterator for Columns<'_> {
    type Item = Column;

    fn next(&mut self) -> Option<Column> {
        let col = self.envelope.column(self.next)?;
        self.next += 1;
        Some(col)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.envelope.width.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Columns<'_> {}

fn time_to_x(t: f64, duration: f64, width: usize) -> f32 {
    if duration <= 0.0 || !t.is_finite() {
        return 0.0;
    }
    ((t / duration) * width as f64) as f32
}

/// Pixel column back to seconds, for seek clicks and drag selection.
pub fn column_to_time(x: f32, width: usize, duration: f64) -> f64 {
    if width == 0 || !x.is_finite() {
        return 0.0;
    }
    let t = (x as f64 / width as f64) * duration;
    t.clamp(0.0, duration.max(0.0))
}

/// Playhead and selection positions in pixels. Drawn on top of the envelope,
/// never mixed into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlay {
    pub playhead_x: f32,
    pub selection: Option<(f32, f32)>,
}

impl Overlay {
    pub fn new(duration: f64, width: usize, current_time: f64, selection: Selection) -> Self {
        Self {
            playhead_x: time_to_x(current_time, duration, width),
            selection: selection
                .bounds()
                .map(|(s, e)| (time_to_x(s, duration, width), time_to_x(e, duration, width))),
        }
    }
}

/// One vertical stroke of the drawn waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnLine {
    pub x: usize,
    pub y_top: f32,
    pub y_bottom: f32,
    pub played: bool,
}

/// Everything a canvas needs for one redraw.
#[derive(Clone, Debug)]
pub struct Waveform<'a> {
    pub envelope: Envelope<'a>,
    pub overlay: Overlay,
}

impl<'a> Waveform<'a> {
    pub fn new(
        buffer: &'a SampleBuffer,
        width: usize,
        current_time: f64,
        selection: Selection,
    ) -> Result<Self, RangeError> {
        Ok(Self {
            envelope: Envelope::new(buffer, width)?,
            overlay: Overlay::new(buffer.duration(), width, current_time, selection),
        })
    }

    /// Column strokes, tagged with whether they sit left of the playhead.
    pub fn lines(&self, height: f32) -> impl Iterator<Item = ColumnLine> + 'a {
        let playhead = self.overlay.playhead_x;
        self.envelope.iter().enumerate().map(move |(x, col)| {
            let (y_top, y_bottom) = col.span(height);
            ColumnLine {
                x,
                y_top,
                y_bottom,
                played: (x as f32) < playhead,
            }
        })
    }
}

pub fn resample_linear(mono: &[f32], in_sr: u32, out_sr: u32) -> Vec<f32> {
    if in_sr == out_sr || mono.is_empty() {
        return mono.to_vec();
    }
    if in_sr == 0 || out_sr == 0 {
        return mono.to_vec();
    }
    let ratio = out_sr as f64 / in_sr as f64;
    let out_len = ((mono.len() as f64) * ratio).ceil() as usize;
    if out_len == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(out_len);
    let len = mono.len();
    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let i0 = src_pos.floor() as usize;
        if i0 >= len {
            out.push(mono[len - 1]);
            continue;
        }
        let i1 = (i0 + 1).min(len.saturating_sub(1));
        let t = (src_pos - i0 as f64).clamp(0.0, 1.0) as f32;
        let v = mono[i0] * (1.0 - t) + mono[i1] * t;
        out.push(v);
    }
    out
}
