//! Real-time playback clock: a cpal output stream driving a [`Mixer`].
//!
//! The control side talks to the audio callback only through lock-free rtrb
//! rings. Track buffers cross over as `basedrop::Shared` so the callback never
//! frees memory; [`PlaybackClock::collect`] reclaims them on the control side.

mod mixer;

pub use mixer::{MAX_PATHS, MAX_VOICES, Mixer};

use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use jukebox_transport::{
    AudioArc, Command, GainRamp, PathId, PlaybackClock, SliceRequest, Status, frames_to_secs,
    secs_to_frames,
};
use tracing::{error, info, warn};

type SharedTrack = Shared<AudioArc>;

/// Loop closure enqueues a few dozen commands at once; leave plenty of room.
const COMMAND_CAPACITY: usize = 4096;
const STATUS_CAPACITY: usize = 256;
/// Frames mixed per pass inside the callback.
const SCRATCH_FRAMES: usize = 1024;

pub struct AudioEngineHandle {
    commands: rtrb::Producer<Command>,
    status: rtrb::Consumer<Status>,
    tracks: rtrb::Producer<SharedTrack>,
    collector: Collector,
    handle: Handle,
    sample_rate: u32,
    channels: u16,
    position: u64,
    next_path: u32,
    _stream: cpal::Stream,
}

/// Open the default output device. The clock starts suspended.
///
/// Fails if the host has no usable output: without a rendering clock there is
/// nothing to schedule against.
pub fn start() -> anyhow::Result<AudioEngineHandle> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(COMMAND_CAPACITY);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(STATUS_CAPACITY);
    let (tracks_tx, tracks_rx) = rtrb::RingBuffer::<SharedTrack>::new(4);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();

    info!(
        "output device {:?}: {} Hz, {} channels, {}",
        device.name().unwrap_or_default(),
        sample_rate,
        channels,
        config.sample_format()
    );

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config.into(), command_rx, tracks_rx, status_tx)?
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config.into(), command_rx, tracks_rx, status_tx)?
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config.into(), command_rx, tracks_rx, status_tx)?
        }
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;

    Ok(AudioEngineHandle {
        commands: command_tx,
        status: status_rx,
        tracks: tracks_tx,
        collector,
        handle,
        sample_rate,
        channels,
        position: 0,
        next_path: 1,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
    mut tracks_rx: rtrb::Consumer<SharedTrack>,
    mut status_tx: rtrb::Producer<Status>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut mixer = Mixer::new();
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * output_channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Swap in a new track if available (lock-free)
            while let Ok(track) = tracks_rx.pop() {
                mixer.set_track(track);
            }
            while let Ok(command) = command_rx.pop() {
                mixer.apply(command);
            }

            for chunk in data.chunks_mut(scratch.len()) {
                let mixed = &mut scratch[..chunk.len()];
                mixer.render(mixed, output_channels);
                for (out, sample) in chunk.iter_mut().zip(mixed.iter()) {
                    *out = T::from_sample(*sample);
                }
            }

            let _ = status_tx.push(Status::Position(mixer.position()));
            let dropped = mixer.take_dropped();
            if dropped > 0 {
                let _ = status_tx.push(Status::VoicesDropped(dropped));
            }
        },
        |err| error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

impl AudioEngineHandle {
    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn send(&mut self, command: Command) {
        if let Err(rtrb::PushError::Full(command)) = self.commands.push(command) {
            warn!("engine command queue full, dropping {command:?}");
        }
    }

    fn poll(&mut self) {
        while let Ok(status) = self.status.pop() {
            match status {
                Status::Position(frames) => self.position = frames,
                Status::VoicesDropped(count) => {
                    warn!("mixer full, {count} scheduled slices were dropped")
                }
            }
        }
    }
}

impl PlaybackClock for AudioEngineHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&mut self) -> f64 {
        self.poll();
        frames_to_secs(self.position, self.sample_rate)
    }

    fn load_track(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        let resampled = audio.resample(self.sample_rate)?;
        let shared = Shared::new(&self.handle, resampled);
        self.tracks
            .push(shared)
            .map_err(|_| anyhow::anyhow!("audio thread is not accepting tracks"))
    }

    fn open_path(&mut self, gain: f32) -> PathId {
        let path = PathId(self.next_path);
        self.next_path = self.next_path.checked_add(1).unwrap_or(1);
        self.send(Command::OpenPath { path, gain });
        path
    }

    fn ramp_gain(&mut self, path: PathId, ramp: GainRamp) {
        let ramp = ramp.to_frames(self.sample_rate);
        self.send(Command::Ramp { path, ramp });
    }

    fn schedule(&mut self, slice: SliceRequest) {
        let voice = slice.to_voice(self.sample_rate);
        self.send(Command::Schedule(voice));
    }

    fn close_path(&mut self, path: PathId, at: f64) {
        let at_frame = secs_to_frames(at, self.sample_rate);
        self.send(Command::ClosePath { path, at_frame });
    }

    fn stop_all(&mut self) {
        self.send(Command::StopAll);
    }

    fn suspend(&mut self) {
        self.send(Command::Suspend);
    }

    fn resume(&mut self) {
        self.send(Command::Resume);
    }

    fn collect(&mut self) {
        self.collector.collect();
    }
}
