use std::sync::Arc;
use std::time::Duration;

use hornclip::audio::AudioEngine;
use hornclip::{LoopMode, PlaybackController, PlayerState, SampleBuffer, Selection};

const SR: u32 = 1_000;

/// One second at 1 kHz on a headless engine that also runs at 1 kHz, so each
/// rendered frame moves the clock by exactly one millisecond.
fn controller() -> PlaybackController {
    let mut ctl = PlaybackController::new(AudioEngine::headless(SR), Duration::from_millis(10));
    let samples = (0..SR as usize).map(|i| (i as f32 / SR as f32) - 0.5).collect();
    let buf = SampleBuffer::from_mono(samples, SR).expect("build buffer");
    ctl.load_buffer(Arc::new(buf));
    ctl
}

fn advance(ctl: &PlaybackController, frames: usize) {
    let mut out = vec![0.0f32; frames * 2];
    ctl.engine().render(out.as_mut_slice(), 2);
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn play_pause_tracks_the_engine_clock() {
    let mut ctl = controller();
    assert_eq!(ctl.state(), PlayerState::Stopped);
    ctl.play();
    assert!(ctl.is_playing());
    advance(&ctl, 300);
    ctl.tick();
    assert!(approx(ctl.current_time(), 0.3));
    ctl.pause();
    assert_eq!(ctl.state(), PlayerState::Stopped);
    assert!(approx(ctl.current_time(), 0.3));
    ctl.play_pause();
    assert!(ctl.is_playing());
    ctl.stop();
    assert!(!ctl.is_playing());
    assert_eq!(ctl.current_time(), 0.0);
}

#[test]
fn section_loop_wraps_exactly_to_selection_start() {
    let mut ctl = controller();
    ctl.set_selection_start(Some(0.2));
    ctl.set_selection_end(Some(0.4));
    ctl.set_loop_mode(LoopMode::Section);
    ctl.seek(0.2);
    ctl.play();
    advance(&ctl, 150);
    ctl.tick();
    assert!(approx(ctl.current_time(), 0.35));
    advance(&ctl, 100);
    ctl.tick();
    assert_eq!(ctl.current_time(), 0.2);
    assert!(ctl.is_playing());
    assert!(approx(ctl.engine().position_secs(), 0.2));
}

#[test]
fn section_loop_without_selection_loops_the_track() {
    let mut ctl = controller();
    ctl.toggle_loop_section();
    assert_eq!(ctl.loop_mode(), LoopMode::Section);
    ctl.seek(0.9);
    ctl.play();
    advance(&ctl, 200);
    ctl.tick();
    assert_eq!(ctl.current_time(), 0.0);
    assert!(ctl.is_playing());
}

#[test]
fn track_loop_wraps_to_zero_at_the_end() {
    let mut ctl = controller();
    ctl.toggle_loop_track();
    ctl.seek(0.95);
    ctl.play();
    advance(&ctl, 100);
    assert!(!ctl.engine().is_playing());
    ctl.tick();
    assert_eq!(ctl.current_time(), 0.0);
    assert!(ctl.is_playing());
    assert!(ctl.engine().is_playing());
}

#[test]
fn no_loop_stops_at_the_end_then_restarts_from_zero() {
    let mut ctl = controller();
    ctl.seek(0.95);
    ctl.play();
    advance(&ctl, 100);
    ctl.tick();
    assert_eq!(ctl.state(), PlayerState::Stopped);
    assert_eq!(ctl.current_time(), 1.0);
    let state = ctl.playback_state();
    assert!(!state.is_playing);
    assert_eq!(state.loop_mode, LoopMode::None);

    ctl.play();
    assert_eq!(ctl.current_time(), 0.0);
    assert!(ctl.is_playing());
}

#[test]
fn seek_clamps_and_restores_prior_state() {
    let mut ctl = controller();
    ctl.seek(5.0);
    assert_eq!(ctl.current_time(), 1.0);
    ctl.seek(-1.0);
    assert_eq!(ctl.current_time(), 0.0);
    assert_eq!(ctl.state(), PlayerState::Stopped);

    ctl.play();
    ctl.seek(0.5);
    assert_eq!(ctl.state(), PlayerState::Playing);
    assert!(approx(ctl.engine().position_secs(), 0.5));
    ctl.seek(f64::NAN);
    assert_eq!(ctl.current_time(), 0.5);
}

#[test]
fn selection_setters_drop_out_of_range_values() {
    let mut ctl = controller();
    ctl.set_selection_start(Some(0.25));
    ctl.set_selection_end(Some(2.0));
    assert_eq!(
        ctl.selection(),
        Selection {
            start: Some(0.25),
            end: None
        }
    );
    ctl.set_selection_start(Some(-0.1));
    assert!(ctl.selection().is_none());
    ctl.set_selection_end(Some(1.0));
    assert_eq!(ctl.selection().end, Some(1.0));
    ctl.clear_selection();
    assert!(ctl.selection().is_none());
}

#[test]
fn backwards_drag_is_ordered() {
    let mut ctl = controller();
    ctl.begin_selection_drag(0.7);
    assert_eq!(ctl.selection().end, None);
    ctl.end_selection_drag(0.3);
    assert_eq!(ctl.selection().bounds(), Some((0.3, 0.7)));
}

#[test]
fn loading_a_buffer_resets_selection_and_time() {
    let mut ctl = controller();
    ctl.set_selection_start(Some(0.1));
    ctl.set_selection_end(Some(0.2));
    ctl.seek(0.6);
    ctl.play();
    let next = SampleBuffer::silent(2, 500, SR).unwrap();
    ctl.load_buffer(Arc::new(next));
    assert!(ctl.selection().is_none());
    assert_eq!(ctl.current_time(), 0.0);
    assert_eq!(ctl.state(), PlayerState::Stopped);
    assert_eq!(ctl.duration(), 0.5);
}

#[test]
fn loop_toggles_are_exclusive() {
    let mut ctl = controller();
    ctl.toggle_loop_section();
    ctl.toggle_loop_track();
    assert_eq!(ctl.loop_mode(), LoopMode::Track);
    ctl.toggle_loop_track();
    assert_eq!(ctl.loop_mode(), LoopMode::None);
    ctl.toggle_loop_section();
    ctl.toggle_loop_section();
    assert_eq!(ctl.loop_mode(), LoopMode::None);
}

#[test]
fn poller_ticks_only_while_playing() {
    let mut ctl = controller();
    assert!(!ctl.wait_tick(Duration::from_millis(30)));
    ctl.play();
    assert!(ctl.wait_tick(Duration::from_millis(500)));
    advance(&ctl, 40);
    std::thread::sleep(Duration::from_millis(30));
    assert!(ctl.poll());
    assert!(approx(ctl.current_time(), 0.04));
    ctl.pause();
    assert!(!ctl.poll());
    assert!(!ctl.wait_tick(Duration::from_millis(30)));
}

#[test]
fn play_without_buffer_is_a_no_op() {
    let mut ctl = PlaybackController::new(AudioEngine::headless(SR), Duration::from_millis(10));
    ctl.play();
    assert_eq!(ctl.state(), PlayerState::Stopped);
    ctl.seek(0.5);
    assert_eq!(ctl.current_time(), 0.0);
}

#[test]
fn unpolled_ticks_collapse_into_one() {
    let mut ctl = PlaybackController::new(AudioEngine::headless(SR), Duration::from_millis(20));
    ctl.load_buffer(Arc::new(SampleBuffer::silent(1, SR as usize * 5, SR).unwrap()));
    ctl.play();
    std::thread::sleep(Duration::from_millis(250));
    assert!(ctl.poll());
    assert!(!ctl.poll());
    ctl.stop();
}
