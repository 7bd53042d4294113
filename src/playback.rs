//! Transport and selection state for one loaded buffer.
//!
//! The controller owns the playback state and is the only thing that mutates
//! it. While playing it samples the engine clock on a fixed interval and
//! applies the loop rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::audio::AudioEngine;
use crate::buffer::SampleBuffer;

/// Upper bound on how stale `current_time` may get while playing.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    None,
    Section,
    Track,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Seeking,
}

/// Selected region in seconds. Either bound may be unset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Selection {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl Selection {
    pub const NONE: Selection = Selection {
        start: None,
        end: None,
    };

    /// Both bounds, when set and ordered.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s <= e => Some((s, e)),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_time: f64,
    pub is_playing: bool,
    pub loop_mode: LoopMode,
}

/// Background ticker. Dropping it cancels the interval.
struct Poller {
    stop: Arc<AtomicBool>,
    ticks: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    fn spawn(interval: Duration) -> Option<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        // one slot: an unpolled controller holds at most one pending tick
        let (tx, ticks) = mpsc::sync_channel(1);
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("hornclip-poll".into())
            .spawn(move || loop {
                std::thread::sleep(interval);
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                match tx.try_send(()) {
                    Ok(()) | Err(TrySendError::Full(())) => {}
                    Err(TrySendError::Disconnected(())) => break,
                }
            });
        match handle {
            Ok(handle) => Some(Self {
                stop,
                ticks,
                handle: Some(handle),
            }),
            Err(err) => {
                tracing::warn!("spawn poll thread failed: {err}");
                None
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct PlaybackController {
    engine: AudioEngine,
    buffer: Option<Arc<SampleBuffer>>,
    state: PlayerState,
    current_time: f64,
    loop_mode: LoopMode,
    selection: Selection,
    poll_interval: Duration,
    poller: Option<Poller>,
}

impl PlaybackController {
    pub fn new(engine: AudioEngine, poll_interval: Duration) -> Self {
        Self {
            engine,
            buffer: None,
            state: PlayerState::Stopped,
            current_time: 0.0,
            loop_mode: LoopMode::None,
            selection: Selection::NONE,
            poll_interval: poll_interval.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL),
            poller: None,
        }
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            current_time: self.current_time,
            is_playing: self.is_playing(),
            loop_mode: self.loop_mode,
        }
    }

    /// Replaces the buffer. Stops playback and drops the selection, whose
    /// times no longer mean anything.
    pub fn load_buffer(&mut self, buffer: Arc<SampleBuffer>) {
        self.halt();
        self.engine.set_buffer(Some(buffer.clone()));
        self.buffer = Some(buffer);
        self.current_time = 0.0;
        self.selection = Selection::NONE;
    }

    pub fn unload(&mut self) {
        self.halt();
        self.engine.set_buffer(None);
        self.buffer = None;
        self.current_time = 0.0;
        self.selection = Selection::NONE;
    }

    pub fn play(&mut self) {
        if self.buffer.is_none() || self.state == PlayerState::Playing {
            return;
        }
        if self.current_time >= self.duration() {
            self.current_time = 0.0;
        }
        self.engine.seek_secs(self.current_time);
        self.engine.play();
        self.poller = Poller::spawn(self.poll_interval);
        self.transition(PlayerState::Playing);
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        self.current_time = self.engine.position_secs().min(self.duration());
        self.halt();
    }

    /// Pauses and rewinds to the start.
    pub fn stop(&mut self) {
        self.halt();
        self.current_time = 0.0;
        self.engine.seek_secs(0.0);
    }

    pub fn play_pause(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves the playhead, then resumes whatever the transport was doing.
    pub fn seek(&mut self, t: f64) {
        if t.is_nan() || self.buffer.is_none() {
            return;
        }
        let prior = self.state;
        self.transition(PlayerState::Seeking);
        self.current_time = t.clamp(0.0, self.duration());
        self.engine.seek_secs(self.current_time);
        self.transition(prior);
    }

    fn in_range(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|v| (0.0..=self.duration()).contains(v))
    }

    /// Out-of-range values clear the bound instead of failing.
    pub fn set_selection_start(&mut self, value: Option<f64>) {
        self.selection.start = self.in_range(value);
    }

    pub fn set_selection_end(&mut self, value: Option<f64>) {
        self.selection.end = self.in_range(value);
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::NONE;
    }

    /// Pointer pressed on the waveform: new start, no end yet.
    pub fn begin_selection_drag(&mut self, t: f64) {
        self.set_selection_start(Some(t));
        self.selection.end = None;
    }

    /// Pointer released: sets the end, ordering the pair if dragged leftwards.
    pub fn end_selection_drag(&mut self, t: f64) {
        if self.selection.start.is_none() {
            return;
        }
        self.set_selection_end(Some(t));
        if let (Some(s), Some(e)) = (self.selection.start, self.selection.end) {
            if e < s {
                self.selection = Selection {
                    start: Some(e),
                    end: Some(s),
                };
            }
        }
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn toggle_loop_section(&mut self) {
        self.loop_mode = if self.loop_mode == LoopMode::Section {
            LoopMode::None
        } else {
            LoopMode::Section
        };
    }

    pub fn toggle_loop_track(&mut self) {
        self.loop_mode = if self.loop_mode == LoopMode::Track {
            LoopMode::None
        } else {
            LoopMode::Track
        };
    }

    /// Drains pending poll ticks without blocking; samples the clock if any
    /// arrived.
    pub fn poll(&mut self) -> bool {
        let mut due = false;
        if let Some(poller) = self.poller.as_ref() {
            while poller.ticks.try_recv().is_ok() {
                due = true;
            }
        }
        if due {
            self.tick();
        }
        due
    }

    /// Blocks for the next poll tick, up to `timeout`.
    pub fn wait_tick(&mut self, timeout: Duration) -> bool {
        let got = match self.poller.as_ref() {
            Some(poller) => match poller.ticks.recv_timeout(timeout) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
            },
            None => false,
        };
        if got {
            self.tick();
        }
        got
    }

    /// Samples the engine clock and applies the loop rules.
    pub fn tick(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        let duration = self.duration();
        let t = self.engine.position_secs().min(duration);
        let at_end = t >= duration || !self.engine.is_playing();
        let section = match (self.loop_mode, self.selection.bounds()) {
            (LoopMode::Section, Some((s, e))) if e > s => Some((s, e)),
            _ => None,
        };
        match (self.loop_mode, section) {
            (LoopMode::Section, Some((s, e))) if t >= e || at_end => self.wrap_to(s),
            (LoopMode::Section, None) | (LoopMode::Track, _) if at_end => self.wrap_to(0.0),
            (LoopMode::None, _) if at_end => {
                self.current_time = duration;
                self.halt();
            }
            _ => self.current_time = t,
        }
    }

    fn wrap_to(&mut self, t: f64) {
        tracing::debug!(from = self.current_time, to = t, mode = ?self.loop_mode, "loop wrap");
        self.current_time = t;
        self.engine.seek_secs(t);
        self.engine.play();
    }

    /// Stops the engine and cancels the poll interval.
    fn halt(&mut self) {
        self.engine.pause();
        self.poller = None;
        self.transition(PlayerState::Stopped);
    }

    fn transition(&mut self, next: PlayerState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "playback state");
            self.state = next;
        }
    }
}
