//! Offline rendering: run the jukebox against a mixer that is pulled as fast
//! as possible instead of by a sound card.

use std::path::Path;

use basedrop::{Collector, Handle, Shared};
use jukebox_core::{Jukebox, JukeboxConfig, JukeboxEvent};
use jukebox_engine::Mixer;
use jukebox_transport::{
    AudioArc, Command, GainRamp, PathId, PlaybackClock, SegmentGraph, SliceRequest,
    frames_to_secs, secs_to_frames,
};
use tracing::{debug, info};

/// A [`PlaybackClock`] whose time only moves when [`OfflineClock::render_block`]
/// is called.
pub struct OfflineClock {
    mixer: Mixer,
    collector: Collector,
    handle: Handle,
    sample_rate: u32,
    channels: u16,
    next_path: u32,
}

impl OfflineClock {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let collector = Collector::new();
        let handle = collector.handle();
        Self {
            mixer: Mixer::new(),
            collector,
            handle,
            sample_rate,
            channels,
            next_path: 1,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Mix `frames` frames onto the end of `out`.
    pub fn render_block(&mut self, out: &mut Vec<f32>, frames: usize) {
        let start = out.len();
        out.resize(start + frames * self.channels as usize, 0.0);
        self.mixer.render(&mut out[start..], self.channels as usize);
    }
}

impl PlaybackClock for OfflineClock {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&mut self) -> f64 {
        frames_to_secs(self.mixer.position(), self.sample_rate)
    }

    fn load_track(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        let resampled = audio.resample(self.sample_rate)?;
        self.mixer.set_track(Shared::new(&self.handle, resampled));
        Ok(())
    }

    fn open_path(&mut self, gain: f32) -> PathId {
        let path = PathId(self.next_path);
        self.next_path = self.next_path.checked_add(1).unwrap_or(1);
        self.mixer.apply(Command::OpenPath { path, gain });
        path
    }

    fn ramp_gain(&mut self, path: PathId, ramp: GainRamp) {
        let ramp = ramp.to_frames(self.sample_rate);
        self.mixer.apply(Command::Ramp { path, ramp });
    }

    fn schedule(&mut self, slice: SliceRequest) {
        self.mixer
            .apply(Command::Schedule(slice.to_voice(self.sample_rate)));
    }

    fn close_path(&mut self, path: PathId, at: f64) {
        let at_frame = secs_to_frames(at, self.sample_rate);
        self.mixer.apply(Command::ClosePath { path, at_frame });
    }

    fn stop_all(&mut self) {
        self.mixer.apply(Command::StopAll);
    }

    fn suspend(&mut self) {
        self.mixer.apply(Command::Suspend);
    }

    fn resume(&mut self) {
        self.mixer.apply(Command::Resume);
    }

    fn collect(&mut self) {
        self.collector.collect();
    }
}

/// Play `seconds` of an endless remix of `track` into a buffer at the
/// track's own sample rate and channel count, beginning at segment `start`
/// (or the first segment).
pub fn render_remix(
    track: AudioArc,
    graph: SegmentGraph,
    config: JukeboxConfig,
    start: Option<usize>,
    seconds: f64,
) -> anyhow::Result<AudioArc> {
    let sample_rate = track.sample_rate();
    let channels = track.channels();
    let clock = OfflineClock::new(sample_rate, channels);
    let mut jukebox = Jukebox::new(track, graph, clock, config)?;

    let total_frames = secs_to_frames(seconds, sample_rate) as usize;
    // one scheduler tick per block, as a device callback would see it
    let block_frames =
        (secs_to_frames(jukebox.tick_interval().as_secs_f64(), sample_rate) as usize).max(1);

    let mut out = Vec::with_capacity(total_frames * channels as usize);
    if let Some(index) = start {
        jukebox.seek_to_segment(index);
    }
    jukebox.play();

    let mut rendered = 0;
    while rendered < total_frames {
        let frames = block_frames.min(total_frames - rendered);
        jukebox.clock_mut().render_block(&mut out, frames);
        rendered += frames;

        jukebox.tick();
        for event in jukebox.events() {
            match event {
                JukeboxEvent::Jumped { from, to, count } => {
                    debug!("jump #{count}: {from} -> {to}")
                }
                JukeboxEvent::LoopClosed { from, resume } => {
                    debug!("loop closed from {from}, resuming at {resume}")
                }
                JukeboxEvent::PlaybackEnded => info!("walk ended after {rendered} frames"),
                _ => {}
            }
        }
    }

    info!(
        "rendered {:.1}s with {} jumps",
        frames_to_secs(rendered as u64, sample_rate),
        jukebox.jump_count()
    );

    Ok(AudioArc::new(out, sample_rate, channels))
}

pub fn write_wav(audio: &AudioArc, path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;

    for &sample in audio.samples() {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}
