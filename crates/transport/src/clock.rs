//! The seam between the scheduler and whatever actually renders audio.
//!
//! The scheduler speaks in device seconds through [`PlaybackClock`]. Adapters
//! convert to frames with [`secs_to_frames`] and hand [`Command`]s to a mixer.

use crate::AudioArc;

/// Gains below this are treated as this for exponential ramps, which cannot
/// reach zero.
pub const MIN_RAMP_GAIN: f32 = 1e-4;

/// A gain-controlled path mixed into the shared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub u32);

impl PathId {
    /// The output path every ordinary segment plays on. Always open, unity gain.
    pub const MAIN: PathId = PathId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    /// `from * (to / from)^t`, perceptually even for fades.
    Exponential,
}

impl RampCurve {
    /// Gain at normalized position `t` (0..=1) between `from` and `to`.
    pub fn gain_at(self, from: f32, to: f32, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            RampCurve::Linear => from + (to - from) * t,
            RampCurve::Exponential => {
                let from = from.max(MIN_RAMP_GAIN);
                let to = to.max(MIN_RAMP_GAIN);
                from * (to / from).powf(t)
            }
        }
    }
}

/// Gain automation expressed in device seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f32,
    pub to: f32,
    pub start: f64,
    pub end: f64,
    pub curve: RampCurve,
}

impl GainRamp {
    pub fn to_frames(&self, sample_rate: u32) -> FrameRamp {
        let start_frame = secs_to_frames(self.start, sample_rate);
        let end_frame = secs_to_frames(self.end, sample_rate).max(start_frame);
        FrameRamp {
            from: self.from,
            to: self.to,
            start_frame,
            end_frame,
            curve: self.curve,
        }
    }
}

/// Gain automation expressed in device frames, as the mixer consumes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRamp {
    pub from: f32,
    pub to: f32,
    pub start_frame: u64,
    pub end_frame: u64,
    pub curve: RampCurve,
}

impl FrameRamp {
    /// Gain at `frame`, or `None` before the ramp begins.
    pub fn gain_at(&self, frame: u64) -> Option<f32> {
        if frame < self.start_frame {
            return None;
        }
        if frame >= self.end_frame {
            return Some(self.to);
        }
        let t = (frame - self.start_frame) as f32 / (self.end_frame - self.start_frame) as f32;
        Some(self.curve.gain_at(self.from, self.to, t))
    }
}

/// "Play `duration` seconds of the track from `offset`, at device time `when`,
/// on `path`."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceRequest {
    pub path: PathId,
    pub when: f64,
    pub offset: f64,
    pub duration: f64,
}

impl SliceRequest {
    /// Convert to frames. The end frame is derived from `when + duration`, the
    /// same sum the scheduler uses for the following slice's `when`, so
    /// chained slices abut exactly.
    pub fn to_voice(&self, sample_rate: u32) -> Voice {
        let start_frame = secs_to_frames(self.when, sample_rate);
        let end_frame = secs_to_frames(self.when + self.duration, sample_rate);
        Voice {
            path: self.path,
            start_frame,
            source_frame: secs_to_frames(self.offset, sample_rate),
            frames: end_frame.saturating_sub(start_frame),
        }
    }
}

/// A scheduled slice of the loaded track, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub path: PathId,
    /// Device frame at which the voice becomes audible.
    pub start_frame: u64,
    /// First frame of the track to play.
    pub source_frame: u64,
    pub frames: u64,
}

impl Voice {
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.frames
    }
}

/// Control → audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start advancing the device clock.
    Resume,
    /// Freeze the device clock and output silence.
    Suspend,
    Schedule(Voice),
    OpenPath { path: PathId, gain: f32 },
    Ramp { path: PathId, ramp: FrameRamp },
    ClosePath { path: PathId, at_frame: u64 },
    /// Drop every voice and transient path, reset the main path to unity.
    StopAll,
}

/// Audio thread → control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Device clock in frames, sent once per audio callback.
    Position(u64),
    /// Voices discarded because the mixer was full.
    VoicesDropped(u32),
}

/// Device seconds to frames, rounding to the nearest frame.
pub fn secs_to_frames(secs: f64, sample_rate: u32) -> u64 {
    (secs.max(0.0) * sample_rate as f64).round() as u64
}

pub fn frames_to_secs(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate as f64
}

/// The host's audio-rendering clock plus its gain paths and sample-accurate
/// buffer sources.
///
/// Everything is fire-and-forget: nothing here waits for audio to play. All
/// times are seconds on the device clock returned by [`PlaybackClock::now`].
pub trait PlaybackClock {
    fn sample_rate(&self) -> u32;

    /// Current device time. Frozen while suspended.
    fn now(&mut self) -> f64;

    /// Make `audio` the source for all subsequently scheduled slices.
    fn load_track(&mut self, audio: &AudioArc) -> anyhow::Result<()>;

    /// Allocate a transient gain path mixed into the output.
    fn open_path(&mut self, gain: f32) -> PathId;

    fn ramp_gain(&mut self, path: PathId, ramp: GainRamp);

    fn schedule(&mut self, slice: SliceRequest);

    /// Release a transient path (and anything still on it) at device time `at`.
    fn close_path(&mut self, path: PathId, at: f64);

    /// Halt all scheduled audio now and release every transient path.
    fn stop_all(&mut self);

    /// Freeze the device clock. Takes effect at the next render block, so a
    /// fraction of a block of already-scheduled audio may still be heard.
    fn suspend(&mut self);

    fn resume(&mut self);

    /// Reclaim memory the audio thread has let go of.
    fn collect(&mut self) {}
}
