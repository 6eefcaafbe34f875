/// Soul Offload Sim - exercise the offload HAL and DSP equalizer without hardware
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::SimConfig;
use serde::Serialize;
use soul_core::{AudioFormat, ChannelMask, IoHandle, OutputDevices, OutputFlags, SampleRate, SessionId};
use soul_hweffect::sim::SimulatedDsp;
use soul_hweffect::{EffectLibrary, EqualizerStatus, Preset, OFFLOAD_EQUALIZER_UUID};
use soul_offload::sim::{SimEvent, SimulatedHardware};
use soul_offload::{CodecStore, OffloadDevice, StreamConfig, StreamStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STREAM_HANDLE: IoHandle = IoHandle(13);
const SESSION: SessionId = SessionId(1);
const MAX_STALLED_WRITES: u32 = 100;

#[derive(Parser)]
#[command(name = "soul-offload-sim")]
#[command(about = "Drive compressed offload playback against simulated hardware", long_about = None)]
struct Cli {
    /// Settings file with [offload] and [effect] sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    Mp3,
    Aac,
}

impl From<Codec> for AudioFormat {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Mp3 => AudioFormat::Mp3,
            Codec::Aac => AudioFormat::Aac,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play a synthetic compressed stream through the offload path
    Play {
        #[arg(long, value_enum, default_value = "mp3")]
        codec: Codec,

        #[arg(long, default_value_t = 128_000)]
        bit_rate: u32,

        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,

        #[arg(long)]
        mono: bool,

        /// Seconds of audio to feed
        #[arg(long, default_value_t = 4)]
        seconds: u32,

        /// Linear output gain
        #[arg(long, default_value_t = 1.0)]
        volume: f32,

        /// Pause for half a second after this many seconds
        #[arg(long)]
        pause_at: Option<u32>,

        /// Attach the equalizer with this preset index
        #[arg(long)]
        eq_preset: Option<i32>,
    },
    /// List the equalizer presets and their band gains
    Presets,
}

#[derive(Serialize)]
struct PlayReport {
    buffer_size: usize,
    bytes_accepted: usize,
    render_position_ms: u32,
    hardware_writes: usize,
    stream: StreamStatus,
    equalizer: Option<EqualizerStatus>,
    dsp_commands: usize,
}

#[derive(Serialize)]
struct PresetEntry {
    index: i32,
    name: &'static str,
    gains_db: [i32; soul_hweffect::NUM_BANDS],
}

struct PlayArgs {
    format: AudioFormat,
    bit_rate: u32,
    sample_rate: u32,
    mask: ChannelMask,
    seconds: u32,
    volume: f32,
    pause_at: Option<u32>,
    eq_preset: Option<i32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soul_offload=info,soul_hweffect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SimConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            codec,
            bit_rate,
            sample_rate,
            mono,
            seconds,
            volume,
            pause_at,
            eq_preset,
        } => {
            let args = PlayArgs {
                format: codec.into(),
                bit_rate,
                sample_rate,
                mask: if mono { ChannelMask::MONO } else { ChannelMask::STEREO },
                seconds,
                volume,
                pause_at,
                eq_preset,
            };
            let report = play(&config, &args)?;
            print_report(&report, cli.json)?;
        }
        Commands::Presets => {
            let presets: Vec<_> = Preset::ALL
                .iter()
                .map(|p| PresetEntry {
                    index: p.index(),
                    name: p.name(),
                    gains_db: p.gains(),
                })
                .collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                for p in presets {
                    println!("{:>2}  {:<12} {:?}", p.index, p.name, p.gains_db);
                }
            }
        }
    }

    Ok(())
}

fn play(config: &SimConfig, args: &PlayArgs) -> anyhow::Result<PlayReport> {
    let hardware = SimulatedHardware::new();
    let device = OffloadDevice::new(
        Arc::new(hardware.clone()),
        config.offload.clone(),
        Arc::new(CodecStore::new()),
    );
    device.init_check()?;

    let dsp = SimulatedDsp::new();
    let library = EffectLibrary::new(Arc::new(dsp.clone()), config.effect.clone());
    let equalizer = match args.eq_preset {
        Some(preset) => {
            let eq = library.create_effect(&OFFLOAD_EQUALIZER_UUID, SESSION, STREAM_HANDLE)?;
            eq.set_preset(preset)?;
            eq.set_enabled(true)?;
            Some(eq)
        }
        None => None,
    };

    let buffer_size = device.offload_buffer_size(args.bit_rate, args.sample_rate, args.mask);
    device.set_parameters(&format!(
        "music_offload_avg_bit_rate={};music_offload_sample_rate={}",
        args.bit_rate, args.sample_rate
    ))?;

    let stream_config = StreamConfig::new(args.format, SampleRate(args.sample_rate), args.mask);
    let stream = device.open_output_stream(
        STREAM_HANDLE,
        OutputDevices::SPEAKER,
        OutputFlags::DIRECT | OutputFlags::COMPRESS_OFFLOAD,
        &stream_config,
    )?;
    stream.set_volume(args.volume, args.volume)?;
    if let Some(eq) = &equalizer {
        eq.set_offloaded(true, STREAM_HANDLE)?;
    }

    // Feed one buffer at a time and let the simulated DSP render it
    let bytes_per_sec = (args.bit_rate / 8).max(1) as usize;
    let total = bytes_per_sec * args.seconds as usize;
    let chunk = vec![0u8; buffer_size];
    let mut fed = 0usize;
    let mut paused = false;
    let mut stalls = 0u32;
    while fed < total {
        let want = chunk.len().min(total - fed);
        let accepted = stream.write(&chunk[..want]);
        if accepted == 0 {
            stalls += 1;
            if stalls > MAX_STALLED_WRITES {
                anyhow::bail!("offload stream stalled after {fed} bytes");
            }
            tracing::warn!(fed, stalls, "write accepted nothing");
        }
        fed += accepted;
        let played = Duration::from_millis((accepted as u64 * 1000) / bytes_per_sec as u64);
        hardware.advance(played.max(Duration::from_millis(1)));

        if let Some(at) = args.pause_at {
            if !paused && fed >= bytes_per_sec * at as usize {
                stream.pause()?;
                hardware.advance(Duration::from_millis(500));
                stream.resume()?;
                paused = true;
            }
        }
    }

    stream.drain()?;
    let render_position_ms = stream.render_position()?;
    let status = stream.status();

    let eq_status = match equalizer {
        Some(eq) => {
            eq.set_offloaded(false, STREAM_HANDLE)?;
            let status = eq.status();
            library.release_effect(eq)?;
            Some(status)
        }
        None => None,
    };
    device.close_output_stream(&stream)?;

    Ok(PlayReport {
        buffer_size,
        bytes_accepted: hardware.bytes_accepted(),
        render_position_ms,
        hardware_writes: hardware.count(|e| matches!(e, SimEvent::Write { .. })),
        stream: status,
        equalizer: eq_status,
        dsp_commands: dsp.commands().len(),
    })
}

fn print_report(report: &PlayReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("buffer size:      {} bytes", report.buffer_size);
    println!("bytes accepted:   {}", report.bytes_accepted);
    println!("hardware writes:  {}", report.hardware_writes);
    println!("render position:  {} ms", report.render_position_ms);
    println!("final state:      {}", report.stream.state);
    if let Some(eq) = &report.equalizer {
        println!(
            "equalizer:        preset {} {:?} gains {:?} ({} DSP commands)",
            eq.preset, eq.preset_name, eq.gains_db, report.dsp_commands
        );
    }
    Ok(())
}
