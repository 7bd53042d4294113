use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::audio::AudioEngine;
use crate::audio_io;
use crate::buffer::SampleBuffer;
use crate::config::EditorConfig;
use crate::edit;
use crate::encoder::{EncodeRequest, EncoderWorker, PendingEncode};
use crate::error::{Error, RangeError, Result};
use crate::playback::{LoopMode, PlaybackController, PlaybackState, PlayerState, Selection};
use crate::wav;
use crate::wave::{self, Waveform};

/// One clip being edited: the current buffer, its transport, and the export
/// worker. Every mutation goes through these methods.
pub struct EditorSession {
    config: EditorConfig,
    player: PlaybackController,
    encoder: EncoderWorker,
}

impl EditorSession {
    pub fn new(config: EditorConfig, engine: AudioEngine) -> Result<Self> {
        config.validate()?;
        engine.set_volume(config.volume);
        let player = PlaybackController::new(engine, config.poll_interval());
        let encoder = EncoderWorker::spawn(config.mp3.clone())?;
        Ok(Self {
            config,
            player,
            encoder,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlaybackController {
        &mut self.player
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.player.buffer()
    }

    fn current(&self) -> Result<Arc<SampleBuffer>> {
        self.player.buffer().cloned().ok_or(Error::NoBuffer)
    }

    pub fn load_buffer(&mut self, buffer: SampleBuffer) {
        tracing::info!(
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            duration = buffer.duration(),
            "buffer loaded"
        );
        self.player.load_buffer(Arc::new(buffer));
    }

    pub fn load_bytes(&mut self, data: impl Into<Bytes>, hint_ext: Option<&str>) -> Result<()> {
        let buffer = audio_io::decode_bytes(data, hint_ext)?;
        self.load_buffer(buffer);
        Ok(())
    }

    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let buffer = audio_io::decode_path(path)?;
        self.load_buffer(buffer);
        Ok(())
    }

    fn replace(&mut self, next: SampleBuffer) {
        self.player.load_buffer(Arc::new(next));
    }

    pub fn crop(&mut self, start: f64, end: f64) -> Result<()> {
        let next = edit::crop(&*self.current()?, start, end)?;
        self.replace(next);
        Ok(())
    }

    pub fn trim(&mut self, start: f64, end: f64) -> Result<()> {
        let next = edit::trim(&*self.current()?, start, end)?;
        self.replace(next);
        Ok(())
    }

    fn selected(&self) -> Result<(f64, f64)> {
        let duration = self.player.duration();
        self.player.selection().bounds().ok_or(Error::Range(RangeError::Bounds {
            start: self.player.selection().start.unwrap_or(f64::NAN),
            end: self.player.selection().end.unwrap_or(f64::NAN),
            duration,
        }))
    }

    /// Keeps the selected region.
    pub fn crop_selection(&mut self) -> Result<()> {
        let (s, e) = self.selected()?;
        self.crop(s, e)
    }

    /// Cuts the selected region out.
    pub fn trim_selection(&mut self) -> Result<()> {
        let (s, e) = self.selected()?;
        self.trim(s, e)
    }

    pub fn fade(&mut self, fade_in: f64, fade_out: f64) -> Result<()> {
        let next = edit::fade(&*self.current()?, fade_in, fade_out)?;
        self.replace(next);
        Ok(())
    }

    pub fn play(&mut self) {
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn stop(&mut self) {
        self.player.stop();
    }

    pub fn play_pause(&mut self) {
        self.player.play_pause();
    }

    pub fn seek(&mut self, t: f64) {
        self.player.seek(t);
    }

    /// Seek from a click at pixel `x` on a waveform `width` pixels wide.
    pub fn seek_to_column(&mut self, x: f32, width: usize) {
        let t = wave::column_to_time(x, width, self.player.duration());
        self.player.seek(t);
    }

    pub fn set_selection_start(&mut self, value: Option<f64>) {
        self.player.set_selection_start(value);
    }

    pub fn set_selection_end(&mut self, value: Option<f64>) {
        self.player.set_selection_end(value);
    }

    pub fn begin_selection_drag(&mut self, x: f32, width: usize) {
        let t = wave::column_to_time(x, width, self.player.duration());
        self.player.begin_selection_drag(t);
    }

    pub fn end_selection_drag(&mut self, x: f32, width: usize) {
        let t = wave::column_to_time(x, width, self.player.duration());
        self.player.end_selection_drag(t);
    }

    pub fn selection(&self) -> Selection {
        self.player.selection()
    }

    pub fn toggle_loop_section(&mut self) {
        self.player.toggle_loop_section();
    }

    pub fn toggle_loop_track(&mut self) {
        self.player.toggle_loop_track();
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.player.loop_mode()
    }

    pub fn current_time(&self) -> f64 {
        self.player.current_time()
    }

    pub fn state(&self) -> PlayerState {
        self.player.state()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.playback_state()
    }

    /// Non-blocking; call from the host's update loop.
    pub fn poll(&mut self) -> bool {
        self.player.poll()
    }

    /// Envelope and overlay for a redraw at `width` columns.
    pub fn waveform(&self, width: usize) -> Result<Waveform<'_>> {
        let buffer = self.player.buffer().ok_or(Error::NoBuffer)?;
        Ok(Waveform::new(
            buffer,
            width,
            self.player.current_time(),
            self.player.selection(),
        )?)
    }

    pub fn preview_wav(&self) -> Result<Bytes> {
        Ok(wav::encode_wav(&*self.current()?)?)
    }

    /// Starts an MP3 export of the current buffer on the worker thread.
    pub fn export_mp3(&self) -> Result<PendingEncode> {
        let buffer = self.current()?;
        Ok(self.encoder.submit(EncodeRequest::from_buffer(&buffer)))
    }
}
