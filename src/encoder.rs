//! MP3 export on a dedicated worker thread.
//!
//! Callers hand a copy of the samples to the worker and get a one-shot handle
//! back. The worker runs each request to completion; dropping the handle only
//! discards the result.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use mp3lame_encoder::{
    max_required_buffer_size, Bitrate as Mp3Bitrate, Builder as Mp3Builder, DualPcm, FlushNoGap,
    MonoPcm, Quality as LameQuality,
};

use crate::buffer::SampleBuffer;
use crate::config::{Mp3Config, Mp3Quality};
use crate::error::EncodeError;
use crate::wave::resample_linear;

pub const MP3_MIME: &str = "audio/mp3";
/// Samples per MPEG-1 Layer III frame; input is fed to LAME in chunks of this size.
pub const CHUNK_FRAMES: usize = 1152;
/// Float-to-PCM scale. Kept at 32767.5 so output matches previously exported clips.
pub const PCM_SCALE: f32 = 32767.5;
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

#[derive(Clone, Debug)]
pub struct EncodeRequest {
    pub channel_count: usize,
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl EncodeRequest {
    pub fn from_buffer(buffer: &SampleBuffer) -> Self {
        Self {
            channel_count: buffer.channel_count(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels().to_vec(),
        }
    }

    fn validate(&self) -> Result<usize, EncodeError> {
        if self.channel_count == 0 || self.channels.len() < self.channel_count {
            return Err(EncodeError::NoChannels);
        }
        if self.sample_rate == 0 {
            return Err(EncodeError::ZeroSampleRate);
        }
        let frames = self.channels[0].len();
        for (index, ch) in self.channels.iter().enumerate().take(self.channel_count) {
            if ch.len() != frames {
                return Err(EncodeError::ChannelMismatch {
                    index,
                    len: ch.len(),
                    expected: frames,
                });
            }
        }
        Ok(frames)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodedBlob {
    pub data: Bytes,
    pub mime: &'static str,
}

impl EncodedBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub fn scale_to_i16(v: f32) -> i16 {
    // `as` saturates, so full-scale input cannot wrap
    (v * PCM_SCALE).round() as i16
}

fn scale_channel(ch: &[f32]) -> Vec<i16> {
    ch.iter().map(|&v| scale_to_i16(v)).collect()
}

fn lame_bitrate(kbps: u32) -> Result<Mp3Bitrate, EncodeError> {
    Ok(match kbps {
        8 => Mp3Bitrate::Kbps8,
        16 => Mp3Bitrate::Kbps16,
        24 => Mp3Bitrate::Kbps24,
        32 => Mp3Bitrate::Kbps32,
        40 => Mp3Bitrate::Kbps40,
        48 => Mp3Bitrate::Kbps48,
        64 => Mp3Bitrate::Kbps64,
        80 => Mp3Bitrate::Kbps80,
        96 => Mp3Bitrate::Kbps96,
        112 => Mp3Bitrate::Kbps112,
        128 => Mp3Bitrate::Kbps128,
        160 => Mp3Bitrate::Kbps160,
        192 => Mp3Bitrate::Kbps192,
        224 => Mp3Bitrate::Kbps224,
        256 => Mp3Bitrate::Kbps256,
        320 => Mp3Bitrate::Kbps320,
        other => return Err(EncodeError::Lame(format!("unsupported bitrate {other} kbps"))),
    })
}

fn lame_quality(q: Mp3Quality) -> LameQuality {
    match q {
        Mp3Quality::Best => LameQuality::Best,
        Mp3Quality::Good => LameQuality::Good,
        Mp3Quality::Fast => LameQuality::Ok,
    }
}

/// Encodes synchronously. This is what the worker runs per request.
pub fn encode_mp3(request: &EncodeRequest, config: &Mp3Config) -> Result<EncodedBlob, EncodeError> {
    request.validate()?;
    let lame = |what: &str| {
        let what = what.to_string();
        move |e: mp3lame_encoder::BuildError| EncodeError::Lame(format!("{what}: {e:?}"))
    };

    // at most two source channels; mono stays mono unless stereo is forced
    let mut chans: Vec<&[f32]> = request.channels[..request.channel_count.min(2)]
        .iter()
        .map(|c| c.as_slice())
        .collect();
    let resampled: Vec<Vec<f32>>;
    let mut sr = request.sample_rate;

    let mut builder = Mp3Builder::new().ok_or_else(|| EncodeError::Lame("init encoder".into()))?;
    let out_channels: u8 = if chans.len() > 1 || config.force_stereo { 2 } else { 1 };
    builder
        .set_num_channels(out_channels)
        .map_err(lame("channels"))?;
    if let Err(err) = builder.set_sample_rate(sr) {
        if matches!(err, mp3lame_encoder::BuildError::BadSampleFreq) {
            tracing::debug!(from = sr, to = FALLBACK_SAMPLE_RATE, "resampling for mp3");
            resampled = chans
                .iter()
                .map(|c| resample_linear(c, sr, FALLBACK_SAMPLE_RATE))
                .collect();
            chans = resampled.iter().map(|c| c.as_slice()).collect();
            sr = FALLBACK_SAMPLE_RATE;
            builder.set_sample_rate(sr).map_err(lame("sample rate"))?;
        } else {
            return Err(lame("sample rate")(err));
        }
    }
    builder
        .set_brate(lame_bitrate(config.bitrate_kbps)?)
        .map_err(lame("bitrate"))?;
    builder
        .set_quality(lame_quality(config.quality))
        .map_err(lame("quality"))?;
    let mut encoder = builder.build().map_err(lame("build"))?;

    let left = scale_channel(chans[0]);
    let right = chans.get(1).map(|ch| scale_channel(ch));
    let frames = left.len().min(right.as_ref().map(|r| r.len()).unwrap_or(usize::MAX));

    let mut out = Vec::with_capacity(max_required_buffer_size(frames.max(1)));
    let encode_err = |e: mp3lame_encoder::EncodeError| EncodeError::Lame(format!("encode: {e:?}"));
    let mut pos = 0usize;
    while pos < frames {
        let end = (pos + CHUNK_FRAMES).min(frames);
        let l = &left[pos..end];
        out.reserve(max_required_buffer_size(l.len()));
        match (out_channels, right.as_ref()) {
            (2, Some(r)) => encoder.encode_to_vec(DualPcm { left: l, right: &r[pos..end] }, &mut out),
            // mono source on a stereo stream: both sides carry channel 0
            (2, None) => encoder.encode_to_vec(DualPcm { left: l, right: l }, &mut out),
            _ => encoder.encode_to_vec(MonoPcm(l), &mut out),
        }
        .map_err(encode_err)?;
        pos = end;
    }
    out.reserve(max_required_buffer_size(CHUNK_FRAMES));
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(encode_err)?;

    Ok(EncodedBlob {
        data: Bytes::from(out),
        mime: MP3_MIME,
    })
}

struct Job {
    request: EncodeRequest,
    reply: SyncSender<Result<EncodedBlob, EncodeError>>,
}

/// One background encoder thread with a FIFO request queue.
pub struct EncoderWorker {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl EncoderWorker {
    pub fn spawn(config: Mp3Config) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("hornclip-encode".into())
            .spawn(move || {
                for job in rx {
                    let started = Instant::now();
                    let frames = job.request.channels.first().map(|c| c.len()).unwrap_or(0);
                    tracing::info!(
                        channels = job.request.channel_count,
                        sample_rate = job.request.sample_rate,
                        frames,
                        "mp3 encode start"
                    );
                    let result = encode_mp3(&job.request, &config);
                    match &result {
                        Ok(blob) => tracing::info!(
                            bytes = blob.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "mp3 encode done"
                        ),
                        Err(err) => tracing::warn!("mp3 encode failed: {err}"),
                    }
                    if job.reply.send(result).is_err() {
                        tracing::debug!("mp3 result discarded by caller");
                    }
                }
            })?;
        Ok(Self {
            jobs: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queues one request. The samples are moved to the worker.
    pub fn submit(&self, request: EncodeRequest) -> PendingEncode {
        let (reply, rx) = mpsc::sync_channel(1);
        if let Some(jobs) = self.jobs.as_ref() {
            // on failure the job, and with it `reply`, is dropped; the handle
            // then reports WorkerGone
            let _ = jobs.send(Job { request, reply });
        }
        PendingEncode { rx }
    }
}

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Result slot for one submitted request.
pub struct PendingEncode {
    rx: Receiver<Result<EncodedBlob, EncodeError>>,
}

impl PendingEncode {
    pub fn wait(self) -> Result<EncodedBlob, EncodeError> {
        self.rx.recv().map_err(|_| EncodeError::WorkerGone)?
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<EncodedBlob, EncodeError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(EncodeError::WorkerGone)),
        }
    }

    /// `None` while the worker is still busy.
    pub fn try_result(&self) -> Option<Result<EncodedBlob, EncodeError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(EncodeError::WorkerGone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_rounds_and_saturates() {
        assert_eq!(scale_to_i16(0.0), 0);
        assert_eq!(scale_to_i16(0.5), 16384);
        assert_eq!(scale_to_i16(1.0), i16::MAX);
        assert_eq!(scale_to_i16(-1.0), i16::MIN);
        assert_eq!(scale_to_i16(3.0), i16::MAX);
    }

    #[test]
    fn ragged_request_is_rejected() {
        let req = EncodeRequest {
            channel_count: 2,
            sample_rate: 44_100,
            channels: vec![vec![0.0; 10], vec![0.0; 9]],
        };
        assert!(matches!(
            encode_mp3(&req, &Mp3Config::default()),
            Err(EncodeError::ChannelMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn empty_request_is_rejected() {
        let req = EncodeRequest {
            channel_count: 0,
            sample_rate: 44_100,
            channels: Vec::new(),
        };
        assert!(matches!(
            encode_mp3(&req, &Mp3Config::default()),
            Err(EncodeError::NoChannels)
        ));
    }
}
