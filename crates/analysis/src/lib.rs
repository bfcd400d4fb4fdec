//! Reading the output of the beat analysis service.
//!
//! The service hands back every beat it found together with its similarity
//! cluster and the beats it could jump to. Only the fields the player needs are
//! required; anything else in the payload is ignored.

mod load;

use jukebox_transport::{GraphError, Segment};
use serde::{Deserialize, Serialize};

pub use load::{Analysis, AnalysisMetadata, load_analysis, load_analysis_metadata, parse_analysis};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFile {
    #[serde(default)]
    pub filename: Option<String>,
    /// Track length in seconds as measured by the analysis service.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    pub segments: Vec<SegmentData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentData {
    pub id: usize,
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub cluster: usize,
    /// Defaults to the following id when absent.
    #[serde(default)]
    pub next: Option<usize>,
    #[serde(default)]
    pub jump_candidates: Vec<usize>,
    /// Song section the beat belongs to (verse, chorus, ...), if reported.
    #[serde(default)]
    pub segment: Option<usize>,
    #[serde(default)]
    pub bar_position: Option<usize>,
}

impl SegmentData {
    pub fn to_segment(&self) -> Segment {
        Segment {
            id: self.id,
            start: self.start,
            duration: self.duration,
            cluster: self.cluster,
            next: self.next.unwrap_or(self.id.wrapping_add(1)),
            jump_candidates: self.jump_candidates.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack error: {0}")]
    MessagePack(#[from] rmp_serde::decode::Error),

    #[error("Invalid segment graph: {0}")]
    Graph(#[from] GraphError),
}
