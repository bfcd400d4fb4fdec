//! The infinite jukebox engine: walks a segment graph forever, scheduling
//! each segment on a [`PlaybackClock`] ahead of time, jumping between similar
//! segments and crossfading the end of the track back into its start.

pub mod closure;
mod config;
mod events;
pub mod policy;
mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::JukeboxConfig;
pub use events::JukeboxEvent;
pub use policy::{JumpPolicy, Step};
pub use scheduler::{EngineState, Scheduler};
pub use session::{Jukebox, PlaybackState};

pub use jukebox_analysis::{Analysis, AnalysisMetadata, load_analysis, load_analysis_metadata};
pub use jukebox_decode::decode_file;
pub use jukebox_transport::{AudioArc, PlaybackClock, Segment, SegmentGraph, uniform_segments};
