use std::collections::HashMap;
use std::ops::Range;

use tracing::warn;

/// Consecutive segments further apart than this are reported at load time.
const CONTIGUITY_TOLERANCE_SECS: f64 = 0.001;

/// One musically meaningful slice of the recording (usually a beat).
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: usize,
    /// Offset into the decoded buffer, seconds.
    pub start: f64,
    pub duration: f64,
    /// Similarity group, only used for display.
    pub cluster: usize,
    /// Id of the sequential successor.
    pub next: usize,
    /// Ids of segments that can stand in for this segment's successor.
    pub jump_candidates: Vec<usize>,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GraphError {
    #[error("duplicate segment id {0}")]
    DuplicateId(usize),

    #[error("segment {id} has a non-finite start or duration")]
    NonFinite { id: usize },

    #[error("segment {id} starts before the beginning of the track ({start}s)")]
    NegativeStart { id: usize, start: f64 },

    #[error("segment {id} has non-positive duration {duration}s")]
    EmptySegment { id: usize, duration: f64 },

    #[error("segment {id} starts at {start}s, before its predecessor")]
    OutOfOrder { id: usize, start: f64 },
}

/// The static structure the scheduler walks.
///
/// Ids are resolved to positions once, here. Everything downstream works with
/// indices into [`SegmentGraph::segments`], so a malformed reference can only
/// ever surface as "no successor", never as an out-of-bounds access.
#[derive(Debug, Clone, Default)]
pub struct SegmentGraph {
    segments: Vec<Segment>,
    index_of: HashMap<usize, usize>,
    successors: Vec<Option<usize>>,
    candidates: Vec<Vec<usize>>,
}

impl SegmentGraph {
    /// Validate and index a segment list supplied in playback order.
    pub fn new(segments: Vec<Segment>) -> Result<Self, GraphError> {
        let mut index_of = HashMap::with_capacity(segments.len());
        let mut previous: Option<&Segment> = None;

        for (index, segment) in segments.iter().enumerate() {
            if !segment.start.is_finite() || !segment.duration.is_finite() {
                return Err(GraphError::NonFinite { id: segment.id });
            }
            if segment.start < 0.0 {
                return Err(GraphError::NegativeStart {
                    id: segment.id,
                    start: segment.start,
                });
            }
            if segment.duration <= 0.0 {
                return Err(GraphError::EmptySegment {
                    id: segment.id,
                    duration: segment.duration,
                });
            }
            if index_of.insert(segment.id, index).is_some() {
                return Err(GraphError::DuplicateId(segment.id));
            }
            if let Some(prev) = previous {
                if segment.start < prev.start {
                    return Err(GraphError::OutOfOrder {
                        id: segment.id,
                        start: segment.start,
                    });
                }
                let seam = segment.start - prev.end();
                if seam.abs() > CONTIGUITY_TOLERANCE_SECS {
                    warn!(
                        "segments {} and {} are not contiguous ({:+.4}s)",
                        prev.id, segment.id, seam
                    );
                }
            }
            previous = Some(segment);
        }

        let last = segments.len().saturating_sub(1);
        let successors = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if index == last {
                    return None;
                }
                let resolved = index_of.get(&segment.next).copied();
                if resolved.is_none() {
                    warn!(
                        "segment {} points at unknown successor {}",
                        segment.id, segment.next
                    );
                }
                resolved
            })
            .collect();

        let candidates = segments
            .iter()
            .map(|segment| {
                segment
                    .jump_candidates
                    .iter()
                    .filter_map(|id| {
                        let resolved = index_of.get(id).copied();
                        if resolved.is_none() {
                            warn!(
                                "segment {} lists unknown jump candidate {}",
                                segment.id, id
                            );
                        }
                        resolved
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            segments,
            index_of,
            successors,
            candidates,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn index_of(&self, id: usize) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    /// Position of the sequential successor. `None` for the last segment and
    /// for segments whose `next` did not resolve.
    pub fn successor(&self, index: usize) -> Option<usize> {
        self.successors.get(index).copied().flatten()
    }

    /// Resolved jump candidates as positions.
    pub fn candidates(&self, index: usize) -> &[usize] {
        self.candidates.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find the segment whose `[start, start + duration)` contains `time`.
    pub fn locate(&self, time: f64) -> Option<usize> {
        if !time.is_finite() {
            return None;
        }
        // first segment starting after `time`, then step back one
        let after = self.segments.partition_point(|s| s.start <= time);
        let index = after.checked_sub(1)?;
        self.segments[index].contains(time).then_some(index)
    }

    /// Summed duration of a range of positions, clamped to the graph.
    pub fn span(&self, range: Range<usize>) -> f64 {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.segments[start..end].iter().map(|s| s.duration).sum()
    }

    /// End of the last segment.
    pub fn duration(&self) -> f64 {
        self.segments.last().map(Segment::end).unwrap_or(0.0)
    }

    /// Number of segments that offer at least one jump.
    pub fn jump_points(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_empty()).count()
    }

    /// Number of distinct cluster labels.
    pub fn cluster_count(&self) -> usize {
        let mut clusters: Vec<usize> = self.segments.iter().map(|s| s.cluster).collect();
        clusters.sort_unstable();
        clusters.dedup();
        clusters.len()
    }
}

/// Build a contiguous graph of `count` equal segments with no jump candidates.
/// Handy for tests and previews of un-analysed audio.
pub fn uniform_segments(count: usize, duration: f64) -> Vec<Segment> {
    (0..count)
        .map(|i| Segment {
            id: i,
            start: i as f64 * duration,
            duration,
            cluster: 0,
            next: i + 1,
            jump_candidates: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: usize, start: f64, duration: f64) -> Segment {
        Segment {
            id,
            start,
            duration,
            cluster: 0,
            next: id + 1,
            jump_candidates: Vec::new(),
        }
    }

    fn three_segments() -> SegmentGraph {
        SegmentGraph::new(vec![seg(0, 0.0, 2.0), seg(1, 2.0, 2.0), seg(2, 4.0, 2.0)]).unwrap()
    }

    #[test]
    fn test_locate_finds_containing_segment() {
        let graph = three_segments();

        assert_eq!(graph.locate(0.0), Some(0));
        assert_eq!(graph.locate(3.5), Some(1));
        assert_eq!(graph.locate(4.0), Some(2), "start is inclusive");
        assert_eq!(graph.locate(5.999), Some(2));
    }

    #[test]
    fn test_locate_out_of_bounds() {
        let graph = three_segments();

        assert_eq!(graph.locate(6.0), None, "end is exclusive");
        assert_eq!(graph.locate(10.0), None);
        assert_eq!(graph.locate(-0.5), None);
        assert_eq!(graph.locate(f64::NAN), None);
    }

    #[test]
    fn test_last_segment_has_no_successor() {
        let mut segments = uniform_segments(3, 1.0);
        // the analysis service sometimes wraps the last beat back to the start
        segments[2].next = 0;
        let graph = SegmentGraph::new(segments).unwrap();

        assert_eq!(graph.successor(0), Some(1));
        assert_eq!(graph.successor(1), Some(2));
        assert_eq!(graph.successor(2), None);
        assert_eq!(graph.successor(99), None);
    }

    #[test]
    fn test_unknown_references_are_dropped() {
        let mut segments = uniform_segments(4, 1.0);
        segments[0].next = 42;
        segments[1].jump_candidates = vec![3, 77];
        let graph = SegmentGraph::new(segments).unwrap();

        assert_eq!(graph.successor(0), None);
        assert_eq!(graph.candidates(1), &[3]);
        assert!(graph.candidates(99).is_empty());
    }

    #[test]
    fn test_ids_resolve_to_positions() {
        let segments = vec![
            Segment {
                id: 10,
                start: 0.0,
                duration: 1.0,
                cluster: 0,
                next: 20,
                jump_candidates: vec![30],
            },
            Segment {
                id: 20,
                start: 1.0,
                duration: 1.0,
                cluster: 1,
                next: 30,
                jump_candidates: vec![],
            },
            Segment {
                id: 30,
                start: 2.0,
                duration: 1.0,
                cluster: 0,
                next: 10,
                jump_candidates: vec![10],
            },
        ];
        let graph = SegmentGraph::new(segments).unwrap();

        assert_eq!(graph.index_of(30), Some(2));
        assert_eq!(graph.successor(0), Some(1));
        assert_eq!(graph.candidates(0), &[2]);
        assert_eq!(graph.jump_points(), 2);
        assert_eq!(graph.cluster_count(), 2);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = SegmentGraph::new(vec![seg(0, 0.0, 1.0), seg(0, 1.0, 1.0)]);
        assert_eq!(result.unwrap_err(), GraphError::DuplicateId(0));
    }

    #[test]
    fn test_rejects_empty_and_unordered_segments() {
        let empty = SegmentGraph::new(vec![seg(0, 0.0, 0.0)]);
        assert!(matches!(empty, Err(GraphError::EmptySegment { id: 0, .. })));

        let unordered = SegmentGraph::new(vec![seg(0, 1.0, 1.0), seg(1, 0.0, 1.0)]);
        assert!(matches!(unordered, Err(GraphError::OutOfOrder { id: 1, .. })));

        let nan = SegmentGraph::new(vec![seg(0, f64::NAN, 1.0)]);
        assert!(matches!(nan, Err(GraphError::NonFinite { id: 0 })));
    }

    #[test]
    fn test_span_and_duration() {
        let graph = three_segments();

        assert_eq!(graph.span(0..2), 4.0);
        assert_eq!(graph.span(1..99), 4.0, "range is clamped to the graph");
        assert_eq!(graph.span(5..9), 0.0);
        assert_eq!(graph.duration(), 6.0);
    }

    #[test]
    fn test_empty_graph() {
        let graph = SegmentGraph::new(Vec::new()).unwrap();

        assert!(graph.is_empty());
        assert_eq!(graph.locate(0.0), None);
        assert_eq!(graph.duration(), 0.0);
    }
}
