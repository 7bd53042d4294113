use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use hornclip::audio::AudioEngine;
use hornclip::{audio_io, logging, wav, EditorConfig, EditorSession, LoopMode};

#[derive(Parser, Debug)]
#[command(name = "hornclip", version, about = "Cut, fade and export horn clips")]
struct Cli {
    /// TOML config file (defaults to $HORNCLIP_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for hornclip
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print format facts for an audio file
    Info { input: PathBuf },
    /// Keep only START..END seconds
    Crop {
        input: PathBuf,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Cut START..END seconds out
    Trim {
        input: PathBuf,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Linear fade in/out, in seconds
    Fade {
        input: PathBuf,
        #[arg(long = "in", default_value_t = 0.0)]
        fade_in: f64,
        #[arg(long = "out", default_value_t = 0.0)]
        fade_out: f64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Draw the min/max envelope as text
    Waveform {
        input: PathBuf,
        #[arg(long)]
        width: Option<usize>,
        #[arg(long, default_value_t = 16)]
        rows: usize,
    },
    /// Play through the default output device
    Play {
        input: PathBuf,
        #[arg(long = "loop", value_enum, default_value_t = LoopArg::None)]
        loop_mode: LoopArg,
        #[arg(long)]
        start: Option<f64>,
        #[arg(long)]
        end: Option<f64>,
        /// Stop after this many seconds of wall time
        #[arg(long = "for")]
        for_secs: Option<f64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoopArg {
    None,
    Section,
    Track,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::None => LoopMode::None,
            LoopArg::Section => LoopMode::Section,
            LoopArg::Track => LoopMode::Track,
        }
    }
}

fn open_session(cfg: &EditorConfig, input: &Path, engine: AudioEngine) -> Result<EditorSession> {
    let mut session = EditorSession::new(cfg.clone(), engine).context("start editor session")?;
    session
        .load_path(input)
        .with_context(|| format!("decode {}", input.display()))?;
    Ok(session)
}

fn edit_session(cfg: &EditorConfig, input: &Path) -> Result<EditorSession> {
    open_session(cfg, input, AudioEngine::headless(48_000))
}

fn write_output(session: &EditorSession, output: &Path) -> Result<()> {
    let ext = output
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => {
            let blob = session.export_mp3()?.wait().context("encode mp3")?;
            std::fs::write(output, &blob.data)
                .with_context(|| format!("write {}", output.display()))?;
        }
        "wav" => {
            let buffer = session.buffer().context("no audio loaded")?;
            wav::write_wav(buffer, output).with_context(|| format!("write {}", output.display()))?;
        }
        other => bail!("unsupported output format: {other:?} (use .mp3 or .wav)"),
    }
    if let Some(buffer) = session.buffer() {
        println!(
            "{}: {:.3} s, {} ch, {} Hz",
            output.display(),
            buffer.duration(),
            buffer.channel_count(),
            buffer.sample_rate()
        );
    }
    Ok(())
}

fn draw_waveform(session: &EditorSession, width: usize, rows: usize) -> Result<()> {
    let rows = rows.max(1);
    let waveform = session.waveform(width)?;
    let mut grid = vec![vec![' '; width]; rows];
    for line in waveform.lines(rows as f32) {
        let top = (line.y_top.floor() as usize).min(rows - 1);
        let bottom = (line.y_bottom.ceil() as usize).clamp(top + 1, rows);
        for row in grid.iter_mut().take(bottom).skip(top) {
            row[line.x] = if line.played { '#' } else { '|' };
        }
    }
    // envelope y grows downward from -1.0; print with +1.0 on top
    for row in grid.iter().rev() {
        println!("{}", row.iter().collect::<String>());
    }
    Ok(())
}

fn play(
    cfg: &EditorConfig,
    input: &Path,
    loop_mode: LoopMode,
    start: Option<f64>,
    end: Option<f64>,
    for_secs: Option<f64>,
) -> Result<()> {
    let engine = AudioEngine::new().context("open audio output")?;
    let mut session = open_session(cfg, input, engine)?;
    session.set_selection_start(start);
    session.set_selection_end(end);
    session.player_mut().set_loop_mode(loop_mode);
    if let Some(s) = session.selection().start {
        session.seek(s);
    }
    let limit = for_secs.map(Duration::from_secs_f64);
    let started = Instant::now();
    session.play();
    while session.player().is_playing() {
        session.player_mut().wait_tick(cfg.poll_interval() * 2);
        eprint!("\r{:8.2} s", session.current_time());
        if limit.is_some_and(|l| started.elapsed() >= l) {
            session.stop();
        }
    }
    eprintln!();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;
    let cfg = EditorConfig::resolve(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Command::Info { input } => {
            let info = audio_io::read_audio_info_path(&input)
                .with_context(|| format!("probe {}", input.display()))?;
            println!("channels: {}", info.channels);
            println!("sample_rate: {}", info.sample_rate);
            println!("bits_per_sample: {}", info.bits_per_sample);
            match info.duration_secs {
                Some(secs) => println!("duration: {secs:.3} s"),
                None => println!("duration: -"),
            }
        }
        Command::Crop {
            input,
            start,
            end,
            output,
        } => {
            let mut session = edit_session(&cfg, &input)?;
            session.crop(start, end).context("crop")?;
            write_output(&session, &output)?;
        }
        Command::Trim {
            input,
            start,
            end,
            output,
        } => {
            let mut session = edit_session(&cfg, &input)?;
            session.trim(start, end).context("trim")?;
            write_output(&session, &output)?;
        }
        Command::Fade {
            input,
            fade_in,
            fade_out,
            output,
        } => {
            let mut session = edit_session(&cfg, &input)?;
            session.fade(fade_in, fade_out).context("fade")?;
            write_output(&session, &output)?;
        }
        Command::Waveform { input, width, rows } => {
            let session = edit_session(&cfg, &input)?;
            draw_waveform(&session, width.unwrap_or(cfg.waveform.width), rows)?;
        }
        Command::Play {
            input,
            loop_mode,
            start,
            end,
            for_secs,
        } => play(&cfg, &input, loop_mode.into(), start, end, for_secs)?,
    }
    Ok(())
}
