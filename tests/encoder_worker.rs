use std::time::Duration;

use hornclip::audio_io;
use hornclip::config::Mp3Config;
use hornclip::encoder::{encode_mp3, EncodeRequest, EncoderWorker, MP3_MIME};
use hornclip::{EncodeError, SampleBuffer};

fn synth_stereo(sr: u32, secs: f32) -> SampleBuffer {
    let frames = ((sr as f32) * secs).max(1.0) as usize;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for i in 0..frames {
        let t = (i as f32) / (sr as f32);
        left.push((t * 440.0 * std::f32::consts::TAU).sin() * 0.25);
        right.push((t * 660.0 * std::f32::consts::TAU).sin() * 0.20);
    }
    SampleBuffer::from_channels(vec![left, right], sr).expect("build stereo buffer")
}

fn has_frame_sync(data: &[u8]) -> bool {
    data.windows(2).any(|w| w[0] == 0xFF && (w[1] & 0xE0) == 0xE0)
}

#[test]
fn silent_mono_second_encodes_to_mp3() {
    let worker = EncoderWorker::spawn(Mp3Config::default()).expect("spawn worker");
    let buf = SampleBuffer::silent(1, 44_100, 44_100).unwrap();
    let blob = worker
        .submit(EncodeRequest::from_buffer(&buf))
        .wait()
        .expect("encode");
    assert_eq!(blob.mime, MP3_MIME);
    assert!(!blob.is_empty());
    assert!(has_frame_sync(&blob.data));

    let decoded = audio_io::decode_bytes(blob.data.clone(), Some("mp3")).expect("decode mp3");
    assert_eq!(decoded.sample_rate(), 44_100);
    assert_eq!(decoded.channel_count(), 1);
    assert!(decoded.duration() > 0.9, "duration={}", decoded.duration());
}

#[test]
fn stereo_source_stays_stereo() {
    let buf = synth_stereo(48_000, 0.5);
    let blob = encode_mp3(&EncodeRequest::from_buffer(&buf), &Mp3Config::default()).expect("encode");
    let decoded = audio_io::decode_bytes(blob.data, Some("mp3")).expect("decode mp3");
    assert_eq!(decoded.channel_count(), 2);
    assert_eq!(decoded.sample_rate(), 48_000);
}

#[test]
fn forced_stereo_duplicates_mono() {
    let cfg = Mp3Config {
        force_stereo: true,
        ..Mp3Config::default()
    };
    let samples = (0..22_050)
        .map(|i| ((i as f32) / 22_050.0 * 300.0 * std::f32::consts::TAU).sin() * 0.5)
        .collect();
    let buf = SampleBuffer::from_mono(samples, 22_050).unwrap();
    let blob = encode_mp3(&EncodeRequest::from_buffer(&buf), &cfg).expect("encode");
    let decoded = audio_io::decode_bytes(blob.data, Some("mp3")).expect("decode mp3");
    assert_eq!(decoded.channel_count(), 2);
}

#[test]
fn frames_not_a_multiple_of_the_chunk_size_still_flush() {
    let buf = SampleBuffer::silent(2, 1_152 * 3 + 17, 44_100).unwrap();
    let blob = encode_mp3(&EncodeRequest::from_buffer(&buf), &Mp3Config::default()).expect("encode");
    assert!(has_frame_sync(&blob.data));
}

#[test]
fn worker_answers_requests_in_order() {
    let worker = EncoderWorker::spawn(Mp3Config::default()).expect("spawn worker");
    let short = SampleBuffer::silent(1, 4_410, 44_100).unwrap();
    let long = SampleBuffer::silent(1, 44_100 * 2, 44_100).unwrap();
    let first = worker.submit(EncodeRequest::from_buffer(&long));
    let second = worker.submit(EncodeRequest::from_buffer(&short));
    let second = second.wait().expect("short encode");
    // FIFO: the long job finished before the short one was answered
    let first = first.try_result().expect("long job done").expect("long encode");
    assert!(first.len() > second.len());
}

#[test]
fn dropped_handle_does_not_stall_the_worker() {
    let worker = EncoderWorker::spawn(Mp3Config::default()).expect("spawn worker");
    let buf = SampleBuffer::silent(1, 11_025, 44_100).unwrap();
    drop(worker.submit(EncodeRequest::from_buffer(&buf)));
    let pending = worker.submit(EncodeRequest::from_buffer(&buf));
    let result = pending
        .wait_timeout(Duration::from_secs(30))
        .expect("worker answered");
    assert!(result.is_ok());
}

#[test]
fn bad_request_comes_back_as_error() {
    let worker = EncoderWorker::spawn(Mp3Config::default()).expect("spawn worker");
    let req = EncodeRequest {
        channel_count: 2,
        sample_rate: 0,
        channels: vec![vec![0.0; 16], vec![0.0; 16]],
    };
    let err = worker.submit(req).wait().unwrap_err();
    assert!(matches!(err, EncodeError::ZeroSampleRate));
}

#[test]
fn unsupported_bitrate_is_reported() {
    let cfg = Mp3Config {
        bitrate_kbps: 100,
        ..Mp3Config::default()
    };
    let buf = SampleBuffer::silent(1, 1_152, 44_100).unwrap();
    assert!(matches!(
        encode_mp3(&EncodeRequest::from_buffer(&buf), &cfg),
        Err(EncodeError::Lame(_))
    ));
}
