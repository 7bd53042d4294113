use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer as InterleavedBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::buffer::SampleBuffer;
use crate::error::DecodeError;

pub const SUPPORTED_EXTS: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac"];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub duration_secs: Option<f64>,
}

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

pub fn is_supported_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(is_supported_extension)
        .unwrap_or(false)
}

fn ext_hint(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

/// Format reader + decoder for one track. Dropped as soon as decoding ends.
struct OpenTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    codec: String,
}

fn probe(data: &Bytes, hint_ext: Option<&str>) -> Result<Box<dyn FormatReader>, DecodeError> {
    let probe_once = |hint_ext: Option<&str>| {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data.clone())), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = hint_ext {
            hint.with_extension(ext);
        }
        get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map(|probed| probed.format)
    };
    match probe_once(hint_ext) {
        Ok(format) => Ok(format),
        // a wrong extension should not hide a perfectly readable stream
        Err(first_err) if hint_ext.is_some() => probe_once(None).map_err(|_| {
            DecodeError::Unsupported(format!("{first_err} (also failed without hint)"))
        }),
        Err(err) => Err(DecodeError::Unsupported(err.to_string())),
    }
}

fn open_track(data: &Bytes, hint_ext: Option<&str>) -> Result<OpenTrack, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    let format = probe(data, hint_ext)?;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?.clone();
    let decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;
    Ok(OpenTrack {
        format,
        decoder,
        track_id: track.id,
        sample_rate: track.codec_params.sample_rate.unwrap_or(0),
        channels: track.codec_params.channels.map(|c| c.count()).unwrap_or(0),
        codec: format!("{:?}", track.codec_params.codec),
    })
}

fn decoded_bits_per_sample(decoded: &AudioBufferRef<'_>) -> u16 {
    match decoded {
        AudioBufferRef::U8(_) | AudioBufferRef::S8(_) => 8,
        AudioBufferRef::U16(_) | AudioBufferRef::S16(_) => 16,
        AudioBufferRef::U24(_) | AudioBufferRef::S24(_) => 24,
        AudioBufferRef::U32(_) | AudioBufferRef::S32(_) | AudioBufferRef::F32(_) => 32,
        AudioBufferRef::F64(_) => 64,
    }
}

fn sanitize_non_finite(channels: &mut [Vec<f32>]) -> usize {
    let mut replaced = 0usize;
    for ch in channels.iter_mut() {
        for v in ch.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
                replaced += 1;
            }
        }
    }
    replaced
}

/// Decodes a whole encoded stream (an upload) into a [`SampleBuffer`].
///
/// `hint_ext` is the file extension if known; probing retries without it.
pub fn decode_bytes(data: impl Into<Bytes>, hint_ext: Option<&str>) -> Result<SampleBuffer, DecodeError> {
    let data = data.into();
    let mut track = open_track(&data, hint_ext)?;
    let mut chans: Vec<Vec<f32>> = Vec::new();
    let mut sample_rate = track.sample_rate;
    let mut decode_errors = 0u32;
    loop {
        let packet = match track.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors = decode_errors.saturating_add(1);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };
        if packet.track_id() != track.track_id {
            continue;
        }
        let decoded = match track.decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors = decode_errors.saturating_add(1);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };
        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        let channels = decoded.spec().channels.count().max(1);
        if chans.is_empty() {
            chans = vec![Vec::new(); channels];
        }
        let mut buf = InterleavedBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks(channels) {
            for (ci, &v) in frame.iter().enumerate().take(chans.len()) {
                chans[ci].push(v);
            }
        }
    }
    if sample_rate == 0 {
        return Err(DecodeError::UnknownSampleRate);
    }
    if chans.is_empty() {
        // stream with a header but no audio packets
        chans = vec![Vec::new(); track.channels.max(1)];
    }
    let replaced = sanitize_non_finite(&mut chans);
    if replaced > 0 {
        tracing::warn!(replaced, "replaced non-finite decoded samples");
    }
    if decode_errors > 0 {
        tracing::warn!(decode_errors, codec = %track.codec, "skipped undecodable packets");
    }
    let buffer = SampleBuffer::from_channels(chans, sample_rate)
        .map_err(|e| DecodeError::Codec(e.to_string()))?;
    tracing::debug!(
        codec = %track.codec,
        sample_rate,
        channels = buffer.channel_count(),
        frames = buffer.frame_count(),
        "decoded audio"
    );
    Ok(buffer)
}

pub fn decode_path(path: &Path) -> Result<SampleBuffer, DecodeError> {
    let data = std::fs::read(path)?;
    decode_bytes(data, ext_hint(path))
}

/// Container-level facts, falling back to the first decoded packet for fields
/// the container leaves blank.
pub fn read_audio_info(data: impl Into<Bytes>, hint_ext: Option<&str>) -> Result<AudioInfo, DecodeError> {
    let data = data.into();
    let mut track = open_track(&data, hint_ext)?;
    let params = track.decoder.codec_params().clone();
    let mut channels = track.channels as u16;
    let mut sample_rate = track.sample_rate;
    let mut bits_per_sample = params.bits_per_sample.unwrap_or(0) as u16;
    let duration_secs = match (params.time_base, params.n_frames) {
        (Some(tb), Some(n)) => Some((n as f64) * (tb.numer as f64) / (tb.denom as f64)),
        (None, Some(n)) if sample_rate > 0 => Some(n as f64 / sample_rate as f64),
        _ => None,
    };
    if channels == 0 || sample_rate == 0 || bits_per_sample == 0 {
        loop {
            let packet = match track.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            };
            if packet.track_id() != track.track_id {
                continue;
            }
            let decoded = match track.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            };
            let spec = *decoded.spec();
            if channels == 0 {
                channels = spec.channels.count().max(1) as u16;
            }
            if sample_rate == 0 {
                sample_rate = spec.rate;
            }
            if bits_per_sample == 0 {
                bits_per_sample = decoded_bits_per_sample(&decoded).max(16);
            }
            break;
        }
    }
    if sample_rate == 0 {
        return Err(DecodeError::UnknownSampleRate);
    }
    Ok(AudioInfo {
        channels,
        sample_rate,
        bits_per_sample,
        duration_secs,
    })
}

pub fn read_audio_info_path(path: &Path) -> Result<AudioInfo, DecodeError> {
    let data = std::fs::read(path)?;
    read_audio_info(data, ext_hint(path))
}
