//! Wrapping from the end of the track back to the start.
//!
//! The tail and the head are scheduled on two transient gain paths starting
//! at the same instant: the tail fades out while the head fades in, and the
//! main path picks up again right after the head.

use std::ops::Range;

use jukebox_transport::SegmentGraph;

/// Size of the crossfade window for a graph of `len` segments.
///
/// Tracks shorter than two windows split in half, so the tail and head never
/// overlap in position.
pub fn effective_window(len: usize, window: usize) -> usize {
    let window = window.max(1);
    if len == 0 {
        0
    } else if len >= 2 * window {
        window
    } else {
        (len / 2).max(1)
    }
}

/// First position that triggers a closure instead of normal scheduling.
///
/// Position 0 always plays on the main path, so a one-segment track is heard
/// once in full before it starts wrapping.
pub fn closure_start(len: usize, window: usize) -> usize {
    (len - effective_window(len, window)).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    FadeOut,
    FadeIn,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSlice {
    pub lane: Lane,
    pub index: usize,
    pub when: f64,
}

/// Device-time layout of one closure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosurePlan {
    pub start: f64,
    pub fade_out: Range<usize>,
    pub fade_in: Range<usize>,
    /// Both lanes merged and ordered by start time.
    pub slices: Vec<PlannedSlice>,
    pub fade_out_end: f64,
    /// The head reaches unity gain here, halfway through the window.
    pub fade_in_ramp_end: f64,
    pub fade_in_end: f64,
    pub resume_index: usize,
}

impl ClosurePlan {
    pub fn has_fade_out(&self) -> bool {
        !self.fade_out.is_empty()
    }
}

/// Lay out a closure from position `from` starting at device time `start`.
pub fn plan_closure(graph: &SegmentGraph, from: usize, window: usize, start: f64) -> ClosurePlan {
    let len = graph.len();
    let k = effective_window(len, window);
    let fade_out = from.min(len)..len;
    let fade_in = 0..k;

    let lane = |lane: Lane, range: Range<usize>| {
        let mut when = start;
        range
            .filter_map(|index| {
                let segment = graph.get(index)?;
                let slice = PlannedSlice { lane, index, when };
                when += segment.duration;
                Some(slice)
            })
            .collect::<Vec<_>>()
    };

    let mut slices = lane(Lane::FadeOut, fade_out.clone());
    slices.extend(lane(Lane::FadeIn, fade_in.clone()));
    // stable, so the tail stays ahead of the head at equal start times
    slices.sort_by(|a, b| a.when.total_cmp(&b.when));

    ClosurePlan {
        start,
        fade_out_end: start + graph.span(fade_out.clone()),
        fade_in_ramp_end: start + graph.span(0..(k / 2).max(1)),
        fade_in_end: start + graph.span(fade_in.clone()),
        resume_index: k,
        fade_out,
        fade_in,
        slices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jukebox_transport::uniform_segments;

    fn graph(count: usize) -> SegmentGraph {
        SegmentGraph::new(uniform_segments(count, 0.5)).unwrap()
    }

    #[test]
    fn test_effective_window() {
        assert_eq!(effective_window(100, 8), 8);
        assert_eq!(effective_window(16, 8), 8);
        assert_eq!(effective_window(15, 8), 7);
        assert_eq!(effective_window(5, 8), 2);
        assert_eq!(effective_window(1, 8), 1);
        assert_eq!(effective_window(0, 8), 0);
        assert_eq!(effective_window(10, 0), 1);
    }

    #[test]
    fn test_plan_full_window() {
        let graph = graph(40);
        let plan = plan_closure(&graph, 32, 8, 10.0);

        assert_eq!(plan.fade_out, 32..40);
        assert_eq!(plan.fade_in, 0..8);
        assert_eq!(plan.resume_index, 8);
        assert_eq!(plan.fade_out_end, 14.0);
        assert_eq!(plan.fade_in_ramp_end, 12.0);
        assert_eq!(plan.fade_in_end, 14.0);
        assert_eq!(plan.slices.len(), 16);
        assert!(
            plan.slices.windows(2).all(|w| w[0].when <= w[1].when),
            "slices must be ordered by start time"
        );
    }

    #[test]
    fn test_plan_lanes_start_together() {
        let graph = graph(40);
        let plan = plan_closure(&graph, 35, 8, 3.0);

        assert_eq!(plan.slices[0], PlannedSlice { lane: Lane::FadeOut, index: 35, when: 3.0 });
        assert_eq!(plan.slices[1], PlannedSlice { lane: Lane::FadeIn, index: 0, when: 3.0 });
        assert_eq!(plan.fade_out_end, 5.5);
    }

    #[test]
    fn test_plan_short_track() {
        let graph = graph(5);
        assert_eq!(closure_start(5, 8), 3);

        let plan = plan_closure(&graph, 3, 8, 0.0);

        assert_eq!(plan.fade_out, 3..5);
        assert_eq!(plan.fade_in, 0..2);
        assert_eq!(plan.resume_index, 2);
        assert!(plan.fade_in.end <= plan.fade_out.start, "head and tail overlap");
    }

    #[test]
    fn test_plan_single_segment() {
        let graph = graph(1);
        assert_eq!(closure_start(1, 8), 1);

        let plan = plan_closure(&graph, 1, 8, 2.0);

        assert!(!plan.has_fade_out());
        assert_eq!(plan.fade_in, 0..1);
        assert_eq!(plan.resume_index, 1);
        assert_eq!(plan.fade_in_end, 2.5);
    }
}
