use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use atomic_float::{AtomicF32, AtomicF64};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::buffer::SampleBuffer;

/// State shared between the owning thread and the output callback.
pub struct SharedAudio {
    pub samples: ArcSwapOption<SampleBuffer>,
    pub vol: AtomicF32, // 0.0..1.0 linear gain
    pub playing: AtomicBool,
    pub play_pos: AtomicUsize,
    pub play_pos_f: AtomicF64, // fractional source frame, for rate conversion
    pub out_channels: usize,
    pub out_sample_rate: u32,
}

impl SharedAudio {
    /// Fills one interleaved output block and advances the play position.
    /// Reaching the end of the buffer stops playback with the position parked
    /// at the last frame boundary.
    pub fn render<T>(&self, data: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = channels.max(1);
        let silence = |data: &mut [T]| {
            for s in data.iter_mut() {
                *s = T::from_sample(0.0);
            }
        };
        if !self.playing.load(Ordering::Relaxed) {
            silence(data);
            return;
        }
        let guard = self.samples.load();
        let Some(samples) = guard.as_ref() else {
            silence(data);
            return;
        };
        let len = samples.frame_count();
        let src_channels = samples.channel_count();
        let step = samples.sample_rate() as f64 / self.out_sample_rate.max(1) as f64;
        let vol = self.vol.load(Ordering::Relaxed);
        let start = self.play_pos_f.load(Ordering::Acquire);
        let mut pos_f = if start.is_finite() && start >= 0.0 { start } else { 0.0 };
        let mut reached_end = false;
        for frame in data.chunks_mut(channels) {
            let pos = pos_f.floor() as usize;
            if pos >= len {
                reached_end = true;
                pos_f = len as f64;
                for s in frame.iter_mut() {
                    *s = T::from_sample(0.0);
                }
                continue;
            }
            for (out_ch, out_sample) in frame.iter_mut().enumerate() {
                let src_ch = out_ch.min(src_channels - 1);
                let v = samples.channels()[src_ch][pos];
                *out_sample = T::from_sample((v * vol).clamp(-1.0, 1.0));
            }
            pos_f += step;
        }
        self.commit_position(start, pos_f, len, reached_end);
    }

    /// Publishes the position a callback advanced to, unless a seek replaced
    /// `start` meanwhile; the seek then wins and playback state is left alone.
    fn commit_position(&self, start: f64, end: f64, len: usize, reached_end: bool) -> bool {
        if self
            .play_pos_f
            .compare_exchange(start, end, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.play_pos
            .store((end.floor() as usize).min(len), Ordering::Relaxed);
        if reached_end {
            self.playing.store(false, Ordering::Relaxed);
        }
        true
    }
}

/// Output device plus the clock the playback controller polls.
pub struct AudioEngine {
    _stream: Option<cpal::Stream>,
    pub shared: Arc<SharedAudio>,
}

impl AudioEngine {
    fn new_shared(out_channels: usize, out_sample_rate: u32) -> Arc<SharedAudio> {
        Arc::new(SharedAudio {
            samples: ArcSwapOption::from(None),
            vol: AtomicF32::new(1.0),
            playing: AtomicBool::new(false),
            play_pos: AtomicUsize::new(0),
            play_pos_f: AtomicF64::new(0.0),
            out_channels,
            out_sample_rate,
        })
    }

    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device")?;
        let cfg = device
            .default_output_config()
            .context("No default output config")?;

        let shared = Self::new_shared(cfg.channels() as usize, cfg.sample_rate());

        let stream = match cfg.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &cfg.into(), shared.clone())?
            }
            _ => anyhow::bail!("Unsupported sample format"),
        };
        tracing::info!(
            channels = shared.out_channels,
            sample_rate = shared.out_sample_rate,
            "audio output opened"
        );

        Ok(Self {
            _stream: Some(stream),
            shared,
        })
    }

    /// Engine without a device. The clock only moves through [`AudioEngine::render`].
    pub fn headless(out_sample_rate: u32) -> Self {
        Self {
            _stream: None,
            shared: Self::new_shared(2, out_sample_rate),
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        shared: Arc<SharedAudio>,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = cfg.channels as usize;
        let err_fn = |e| tracing::warn!("cpal stream error: {e}");
        let stream = device.build_output_stream(
            cfg,
            move |data: &mut [T], _| shared.render(data, channels),
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    pub fn render<T>(&self, data: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        self.shared.render(data, channels);
    }

    /// Swaps in a new buffer and rewinds. Playback stops.
    pub fn set_buffer(&self, samples: Option<Arc<SampleBuffer>>) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.samples.store(samples);
        self.shared.play_pos.store(0, Ordering::Relaxed);
        self.shared.play_pos_f.store(0.0, Ordering::Relaxed);
    }

    pub fn has_buffer(&self) -> bool {
        self.shared.samples.load().is_some()
    }

    pub fn set_volume(&self, v: f32) {
        self.shared.vol.store(v.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn play(&self) {
        if !self.has_buffer() {
            return;
        }
        self.shared.playing.store(true, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.shared.playing.store(false, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// Current position in seconds of the loaded buffer.
    pub fn position_secs(&self) -> f64 {
        let guard = self.shared.samples.load();
        let Some(buf) = guard.as_ref() else {
            return 0.0;
        };
        let pos = self.shared.play_pos_f.load(Ordering::Relaxed);
        (pos / buf.sample_rate() as f64).clamp(0.0, buf.duration())
    }

    pub fn seek_secs(&self, t: f64) {
        let guard = self.shared.samples.load();
        if let Some(buf) = guard.as_ref() {
            let frames = buf.frame_count();
            let pos = (t.max(0.0) * buf.sample_rate() as f64).min(frames as f64);
            self.shared.play_pos_f.store(pos, Ordering::Release);
            self.shared
                .play_pos
                .store(pos.floor() as usize, Ordering::Relaxed);
        }
    }

    pub fn out_sample_rate(&self) -> u32 {
        self.shared.out_sample_rate
    }
}
