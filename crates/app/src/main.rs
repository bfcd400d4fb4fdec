mod config;
mod control;
mod play;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use jukebox_core::{JukeboxConfig, decode_file, load_analysis, load_analysis_metadata};
use jukebox_render::{render_remix, write_wav};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "jukebox")]
#[command(about = "Plays a song forever by jumping between similar beats")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true, env = "JUKEBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Log every scheduled segment
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play through the default output device
    Play {
        audio: PathBuf,
        analysis: PathBuf,
        /// Beat to start on, counting from 1
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        start: Option<u64>,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Write an endless remix of a fixed length to a WAV file
    Render {
        audio: PathBuf,
        analysis: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Length in seconds
        #[arg(short, long)]
        seconds: Option<f64>,
        /// Beat to start on, counting from 1
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        start: Option<u64>,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Summarise an analysis file
    Info { analysis: PathBuf },
}

/// Overrides for individual config values.
#[derive(Args, Debug)]
struct Tuning {
    /// Chance of jumping at each segment that offers one (0..1)
    #[arg(short = 'p', long)]
    probability: Option<f64>,
    /// Seed for a reproducible walk
    #[arg(long)]
    seed: Option<u64>,
    /// Minimum distance in segments between a segment and its jump target
    #[arg(long)]
    min_jump: Option<usize>,
    /// Segments to play after a jump before jumping again
    #[arg(long)]
    cooldown: Option<usize>,
}

impl Tuning {
    fn apply(&self, mut config: JukeboxConfig) -> JukeboxConfig {
        if let Some(probability) = self.probability {
            config.jump_probability = probability;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(min_jump) = self.min_jump {
            config.min_jump_separation = min_jump;
        }
        if let Some(cooldown) = self.cooldown {
            config.min_segments_between_jumps = cooldown;
        }
        config
    }
}

/// Segment index for a 1-based beat number.
fn start_index(beat: Option<u64>) -> Option<usize> {
    beat.map(|beat| usize::try_from(beat.saturating_sub(1)).unwrap_or(usize::MAX))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(cli.config.as_deref());

    match cli.command {
        Command::Play {
            audio,
            analysis,
            start,
            tuning,
        } => {
            play::run(
                &audio,
                &analysis,
                start_index(start),
                tuning.apply(config.jukebox),
            )
            .await
        }
        Command::Render {
            audio,
            analysis,
            output,
            seconds,
            start,
            tuning,
        } => render(
            &audio,
            &analysis,
            &output,
            seconds.unwrap_or(config.render_secs),
            start_index(start),
            tuning.apply(config.jukebox),
        ),
        Command::Info { analysis } => print_info(&analysis),
    }
}

fn render(
    audio: &Path,
    analysis: &Path,
    output: &Path,
    seconds: f64,
    start: Option<usize>,
    config: JukeboxConfig,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        seconds.is_finite() && seconds > 0.0,
        "render length must be positive, got {seconds}"
    );

    let track = decode_file(audio).with_context(|| format!("decoding {}", audio.display()))?;
    let analysis =
        load_analysis(analysis).with_context(|| format!("loading {}", analysis.display()))?;

    let remix = render_remix(track, analysis.graph, config, start, seconds)?;
    write_wav(&remix, output).with_context(|| format!("writing {}", output.display()))?;

    info!("wrote {:.1}s to {}", remix.duration_secs(), output.display());
    Ok(())
}

fn print_info(path: &Path) -> anyhow::Result<()> {
    let metadata =
        load_analysis_metadata(path).with_context(|| format!("loading {}", path.display()))?;

    if let Some(filename) = &metadata.filename {
        println!("file:        {filename}");
    }
    println!("duration:    {:.2}s", metadata.duration);
    match metadata.tempo {
        Some(tempo) => println!("tempo:       {tempo:.1} bpm"),
        None => println!("tempo:       unknown"),
    }
    if let Some(sample_rate) = metadata.sample_rate {
        println!("sample rate: {sample_rate} Hz");
    }
    println!("segments:    {}", metadata.segment_count);
    println!("clusters:    {}", metadata.cluster_count);
    if let Some(sections) = metadata.section_count {
        println!("sections:    {sections}");
    }
    println!("jump points: {}", metadata.jump_points);
    println!("cluster map: {}", metadata.cluster_map);
    Ok(())
}
