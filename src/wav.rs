//! 16-bit PCM WAV blobs for in-app preview.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use bytes::Bytes;

use crate::buffer::SampleBuffer;

/// Header size hound writes for mono and stereo 16-bit PCM.
pub const WAV_HEADER_LEN: usize = 44;
pub const WAV_MIME: &str = "audio/wav";

fn f32_to_i16(v: f32) -> i16 {
    let s = v.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

fn pcm16_spec(buffer: &SampleBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_frames<W: Write + Seek>(buffer: &SampleBuffer, out: W) -> hound::Result<()> {
    let mut writer = hound::WavWriter::new(out, pcm16_spec(buffer))?;
    for i in 0..buffer.frame_count() {
        for ch in buffer.channels() {
            writer.write_sample(f32_to_i16(ch[i]))?;
        }
    }
    writer.finalize()
}

/// RIFF/WAVE blob with interleaved little-endian samples.
pub fn encode_wav(buffer: &SampleBuffer) -> hound::Result<Bytes> {
    let data_len = buffer.frame_count() * buffer.channel_count() * 2;
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len));
    write_frames(buffer, &mut cursor)?;
    Ok(Bytes::from(cursor.into_inner()))
}

pub fn write_wav(buffer: &SampleBuffer, dst: &Path) -> hound::Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(dst)?);
    write_frames(buffer, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_conversion_is_asymmetric() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32768);
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(0.5), 16383);
    }

    #[test]
    fn header_is_canonical() {
        let buf = SampleBuffer::silent(2, 10, 8_000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN + 40);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 36 + 40);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes([wav[16], wav[17], wav[18], wav[19]]), 16);
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 2);
        assert_eq!(u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]), 32_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 40);
    }

    #[test]
    fn negative_full_scale_survives_the_writer() {
        let buf = SampleBuffer::from_channels(vec![vec![-1.0, 0.5], vec![1.0, -0.5]], 8_000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        let body: Vec<i16> = wav[WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(body, vec![-32768, 32767, 16383, -16384]);
    }
}
