use std::fs;
use std::path::Path;

use jukebox_transport::SegmentGraph;
use tracing::{debug, warn};

use crate::{AnalysisError, AnalysisFile};

/// A loaded, validated analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub filename: Option<String>,
    pub duration: Option<f64>,
    pub tempo: Option<f64>,
    pub sample_rate: Option<u32>,
    pub graph: SegmentGraph,
    /// Song section of each segment, when the service reported it.
    pub sections: Vec<Option<usize>>,
}

#[derive(Debug, Clone)]
pub struct AnalysisMetadata {
    pub filename: Option<String>,
    pub duration: f64,
    pub tempo: Option<f64>,
    pub sample_rate: Option<u32>,
    pub segment_count: usize,
    pub cluster_count: usize,
    pub section_count: Option<usize>,
    pub jump_points: usize,
    /// One character per segment naming its cluster.
    pub cluster_map: String,
}

const CLUSTER_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz1234567890-=,.<>/?;:!@#$%^&*()_+";

fn read_analysis_file(path: &Path) -> Result<AnalysisFile, AnalysisError> {
    let bytes = fs::read(path)?;

    // Try JSON first, fall back to MessagePack
    serde_json::from_slice(&bytes).or_else(|json_err| {
        rmp_serde::from_slice(&bytes).map_err(|rmp_err| {
            let looks_like_json = bytes
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{');
            if looks_like_json {
                AnalysisError::Json(json_err)
            } else {
                AnalysisError::MessagePack(rmp_err)
            }
        })
    })
}

/// Build the playable graph from an already-deserialized payload.
pub fn parse_analysis(file: AnalysisFile) -> Result<Analysis, AnalysisError> {
    let sections = file.segments.iter().map(|s| s.segment).collect();
    let segments = file.segments.iter().map(|s| s.to_segment()).collect();
    let graph = SegmentGraph::new(segments)?;

    if let Some(duration) = file.duration {
        let drift = (graph.duration() - duration).abs();
        if drift > 0.5 {
            warn!(
                "segments cover {:.2}s but the analysis reports {:.2}s",
                graph.duration(),
                duration
            );
        }
    }

    debug!(
        "loaded {} segments, {} jump points",
        graph.len(),
        graph.jump_points()
    );

    Ok(Analysis {
        filename: file.filename,
        duration: file.duration,
        tempo: file.tempo,
        sample_rate: file.sample_rate,
        graph,
        sections,
    })
}

pub fn load_analysis(path: &Path) -> Result<Analysis, AnalysisError> {
    parse_analysis(read_analysis_file(path)?)
}

pub fn load_analysis_metadata(path: &Path) -> Result<AnalysisMetadata, AnalysisError> {
    let analysis = load_analysis(path)?;
    Ok(analysis.metadata())
}

impl Analysis {
    pub fn metadata(&self) -> AnalysisMetadata {
        let cluster_map = self
            .graph
            .segments()
            .iter()
            .map(|s| CLUSTER_CHARS[s.cluster % CLUSTER_CHARS.len()] as char)
            .collect();

        let section_count = if self.sections.iter().all(Option::is_some) && !self.sections.is_empty()
        {
            let mut sections: Vec<usize> = self.sections.iter().flatten().copied().collect();
            sections.sort_unstable();
            sections.dedup();
            Some(sections.len())
        } else {
            None
        };

        AnalysisMetadata {
            filename: self.filename.clone(),
            duration: self.duration.unwrap_or_else(|| self.graph.duration()),
            tempo: self.tempo,
            sample_rate: self.sample_rate,
            segment_count: self.graph.len(),
            cluster_count: self.graph.cluster_count(),
            section_count,
            jump_points: self.graph.jump_points(),
            cluster_map,
        }
    }
}
