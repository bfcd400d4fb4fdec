//! Shared data model for the jukebox: decoded audio, the segment graph, and
//! the playback clock interface the scheduler drives.

mod audio;
mod clock;
mod segment;

pub use audio::{AudioArc, resample_audio_arc};
pub use clock::{
    Command, FrameRamp, GainRamp, MIN_RAMP_GAIN, PathId, PlaybackClock, RampCurve, SliceRequest,
    Status, Voice, frames_to_secs, secs_to_frames,
};
pub use segment::{GraphError, Segment, SegmentGraph, uniform_segments};
