use jukebox_transport::SegmentGraph;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

/// What plays after the current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Sequential(usize),
    Jump(usize),
    /// No successor and no jump: the walk cannot continue.
    End,
}

/// Decides between the sequential successor and a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpPolicy {
    /// Minimum distance, in positions, between a segment and its jump target.
    pub min_separation: usize,
    /// Segments that must have played since the last jump.
    pub cooldown: usize,
}

impl JumpPolicy {
    pub fn new(min_separation: usize, cooldown: usize) -> Self {
        Self {
            min_separation,
            cooldown,
        }
    }

    /// Candidates of `index` that are far enough away to be worth the jump.
    pub fn valid_candidates(&self, graph: &SegmentGraph, index: usize) -> Vec<usize> {
        graph
            .candidates(index)
            .iter()
            .copied()
            .filter(|&candidate| candidate.abs_diff(index) >= self.min_separation)
            .collect()
    }

    /// Choose the step after `index`.
    ///
    /// `segments_since_jump` counts segments scheduled since the last jump;
    /// the caller resets it when this returns [`Step::Jump`].
    pub fn decide<R: Rng + ?Sized>(
        &self,
        graph: &SegmentGraph,
        index: usize,
        segments_since_jump: usize,
        probability: f64,
        rng: &mut R,
    ) -> Step {
        let forced = match graph.successor(index) {
            Some(next) => Step::Sequential(next),
            None => Step::End,
        };

        if graph.candidates(index).is_empty() {
            return forced;
        }

        let roll: f64 = rng.random();
        if roll >= probability || segments_since_jump < self.cooldown {
            return forced;
        }

        let valid = self.valid_candidates(graph, index);
        match pick_weighted(&valid, graph.len(), rng) {
            Some(target) => Step::Jump(target),
            None => forced,
        }
    }
}

/// Pick among `candidates`, favouring positions early in the track.
///
/// Each candidate weighs `len - position`, so jumps lean backwards and the
/// walk spends less time near the loop closure.
pub fn pick_weighted<R: Rng + ?Sized>(
    candidates: &[usize],
    len: usize,
    rng: &mut R,
) -> Option<usize> {
    let weights = candidates
        .iter()
        .map(|&candidate| len.saturating_sub(candidate).max(1));
    let dist = WeightedIndex::new(weights).ok()?;
    Some(candidates[dist.sample(rng)])
}
