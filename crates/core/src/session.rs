use std::path::Path;
use std::time::Duration;

use jukebox_analysis::load_analysis;
use jukebox_decode::decode_file;
use jukebox_transport::{AudioArc, PlaybackClock, Segment, SegmentGraph};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use crate::{EngineState, JukeboxConfig, JukeboxEvent, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// One track, its segment graph, and the clock it plays on.
///
/// The owner drives [`Jukebox::tick`] every [`Jukebox::tick_interval`] and
/// drains [`Jukebox::events`] afterwards. Dropping the jukebox cancels
/// everything it scheduled.
pub struct Jukebox<C: PlaybackClock> {
    scheduler: Scheduler<C>,
    track: AudioArc,
    playback_state: PlaybackState,
}

impl<C: PlaybackClock> Jukebox<C> {
    pub fn new(
        track: AudioArc,
        graph: SegmentGraph,
        clock: C,
        config: JukeboxConfig,
    ) -> anyhow::Result<Self> {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self::with_rng(track, graph, clock, config, rng)
    }

    pub fn with_rng(
        track: AudioArc,
        graph: SegmentGraph,
        mut clock: C,
        config: JukeboxConfig,
        rng: SmallRng,
    ) -> anyhow::Result<Self> {
        clock.load_track(&track)?;

        let overrun = graph.duration() - track.duration_secs();
        if overrun > 0.05 {
            warn!(
                "segments run {:.3}s past the end of the audio; the tail will be silent",
                overrun
            );
        }

        Ok(Self {
            scheduler: Scheduler::new(clock, graph, config, rng),
            track,
            playback_state: PlaybackState::Stopped,
        })
    }

    /// Decode `audio` and load the analysis that goes with it.
    pub fn open(
        audio: &Path,
        analysis: &Path,
        clock: C,
        config: JukeboxConfig,
    ) -> anyhow::Result<Self> {
        let track = decode_file(audio)?;
        let analysis = load_analysis(analysis)?;
        info!(
            "{}: {:.1}s, {} segments, {} jump points",
            audio.display(),
            track.duration_secs(),
            analysis.graph.len(),
            analysis.graph.jump_points()
        );
        Self::new(track, analysis.graph, clock, config)
    }

    pub fn play(&mut self) {
        if self.playback_state.is_playing() {
            return;
        }
        let from = self.current_index();
        if self.scheduler.start() {
            info!("playing from segment {from}");
            self.playback_state = PlaybackState::Playing;
            self.sync_state();
        }
    }

    pub fn pause(&mut self) {
        if !self.playback_state.is_playing() {
            return;
        }
        self.scheduler.pause();
        self.playback_state = PlaybackState::Paused;
        info!("paused before segment {}", self.current_index());
    }

    /// Silence everything and rewind to the first segment. Safe to repeat.
    pub fn stop(&mut self) {
        if self.playback_state != PlaybackState::Stopped {
            info!("stopped after {} jumps", self.jump_count());
        }
        self.scheduler.halt();
        self.playback_state = PlaybackState::Stopped;
    }

    pub fn restart(&mut self) {
        self.stop();
        self.play();
    }

    /// Continue from the segment containing `seconds`.
    ///
    /// Returns false, leaving playback untouched, when no segment contains it.
    pub fn seek_to_time(&mut self, seconds: f64) -> bool {
        let Some(index) = self.scheduler.graph().locate(seconds) else {
            warn!("seek to {seconds}s is outside the analysed track");
            return false;
        };
        self.scheduler.relocate(index);
        self.sync_state();
        true
    }

    /// Continue from the segment at `index`, e.g. to begin somewhere other
    /// than the top of the track.
    ///
    /// Returns false, leaving playback untouched, when there is no such segment.
    pub fn seek_to_segment(&mut self, index: usize) -> bool {
        let len = self.scheduler.graph().len();
        if index >= len {
            warn!("segment {index} is outside the analysed track ({len} segments)");
            return false;
        }
        self.scheduler.relocate(index);
        self.sync_state();
        true
    }

    /// Clamped to `0.0..=1.0`. Takes effect from the next decision.
    pub fn set_jump_probability(&mut self, probability: f64) {
        self.scheduler.set_jump_probability(probability);
    }

    pub fn jump_probability(&self) -> f64 {
        self.scheduler.state().jump_probability
    }

    /// Length of the decoded audio in seconds.
    pub fn duration(&self) -> f64 {
        self.track.duration_secs()
    }

    pub fn tick(&mut self) {
        self.scheduler.tick();
        self.sync_state();
    }

    pub fn tick_interval(&self) -> Duration {
        self.scheduler.config().tick_interval()
    }

    pub fn events(&mut self) -> impl Iterator<Item = JukeboxEvent> + '_ {
        self.scheduler.drain_events()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state.is_playing()
    }

    /// Next position the scheduler will enqueue.
    pub fn current_index(&self) -> usize {
        self.scheduler.state().current_index
    }

    /// The segment most recently announced as audible.
    pub fn current_segment(&self) -> Option<&Segment> {
        self.scheduler
            .announced()
            .and_then(|index| self.scheduler.graph().get(index))
    }

    pub fn jump_count(&self) -> u64 {
        self.scheduler.state().jump_count
    }

    pub fn state(&self) -> &EngineState {
        self.scheduler.state()
    }

    pub fn graph(&self) -> &SegmentGraph {
        self.scheduler.graph()
    }

    pub fn track(&self) -> &AudioArc {
        &self.track
    }

    pub fn clock(&self) -> &C {
        self.scheduler.clock()
    }

    pub fn clock_mut(&mut self) -> &mut C {
        self.scheduler.clock_mut()
    }

    // the walk can end on its own at a dead successor
    fn sync_state(&mut self) {
        if self.playback_state.is_playing() && !self.scheduler.is_playing() {
            self.playback_state = PlaybackState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClock;
    use jukebox_transport::uniform_segments;

    fn config() -> JukeboxConfig {
        JukeboxConfig {
            seed: Some(3),
            ..Default::default()
        }
    }

    fn jukebox(segments: Vec<jukebox_transport::Segment>) -> Jukebox<RecordingClock> {
        let graph = SegmentGraph::new(segments).unwrap();
        let track = AudioArc::silence(graph.duration(), 1000, 2);
        Jukebox::new(track, graph, RecordingClock::new(), config()).unwrap()
    }

    fn run(jukebox: &mut Jukebox<RecordingClock>, secs: f64) {
        let step = jukebox.tick_interval().as_secs_f64();
        for _ in 0..(secs / step).round() as usize {
            jukebox.clock_mut().advance(step);
            jukebox.tick();
        }
    }

    #[test]
    fn test_new_loads_track_into_clock() {
        let jukebox = jukebox(uniform_segments(8, 0.5));
        assert_eq!(jukebox.clock().loaded_frames, Some(4000));
    }

    #[test]
    fn test_duration_comes_from_audio() {
        let graph = SegmentGraph::new(uniform_segments(4, 0.5)).unwrap();
        let track = AudioArc::silence(2.75, 1000, 1);
        let jukebox = Jukebox::new(track, graph, RecordingClock::new(), config()).unwrap();

        assert!((jukebox.duration() - 2.75).abs() < 1e-9);
    }

    #[test]
    fn test_play_pause_state() {
        let mut jukebox = jukebox(uniform_segments(32, 0.5));
        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);

        jukebox.play();
        assert!(jukebox.is_playing());
        assert!(!jukebox.clock().suspended);

        jukebox.pause();
        assert_eq!(jukebox.playback_state(), PlaybackState::Paused);
        assert!(jukebox.clock().suspended);

        jukebox.play();
        assert!(jukebox.is_playing());
    }

    #[test]
    fn test_play_emits_started_then_segment() {
        let mut jukebox = jukebox(uniform_segments(32, 0.5));
        jukebox.play();

        let events: Vec<_> = jukebox.events().collect();
        assert_eq!(
            events,
            vec![
                JukeboxEvent::PlaybackStarted,
                JukeboxEvent::SegmentChanged {
                    index: 0,
                    id: 0,
                    cluster: 0
                },
            ]
        );
        assert_eq!(jukebox.current_segment().map(|s| s.id), Some(0));
    }

    #[test]
    fn test_stop_twice_is_harmless() {
        let mut jukebox = jukebox(uniform_segments(32, 0.5));
        jukebox.play();
        run(&mut jukebox, 3.0);
        assert!(jukebox.current_index() > 0);

        jukebox.stop();
        jukebox.stop();

        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);
        assert_eq!(jukebox.current_index(), 0);
        assert_eq!(jukebox.jump_count(), 0);
        assert!(jukebox.clock().slices.is_empty(), "stop must cancel queued audio");
        assert!(jukebox.current_segment().is_none());
    }

    #[test]
    fn test_stop_without_play() {
        let mut jukebox = jukebox(uniform_segments(4, 0.5));
        jukebox.stop();
        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_restart_begins_at_first_segment() {
        let mut jukebox = jukebox(uniform_segments(32, 0.5));
        jukebox.play();
        run(&mut jukebox, 4.0);

        jukebox.restart();

        assert!(jukebox.is_playing());
        let pending = &jukebox.clock().slices;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].offset, 0.0);
    }

    #[test]
    fn test_seek_to_time_finds_segment() {
        let segments = vec![
            Segment {
                id: 0,
                start: 0.0,
                duration: 2.0,
                cluster: 0,
                next: 1,
                jump_candidates: vec![],
            },
            Segment {
                id: 1,
                start: 2.0,
                duration: 2.0,
                cluster: 1,
                next: 2,
                jump_candidates: vec![],
            },
            Segment {
                id: 2,
                start: 4.0,
                duration: 2.0,
                cluster: 0,
                next: 3,
                jump_candidates: vec![],
            },
        ];
        let mut jukebox = jukebox(segments);

        assert!(jukebox.seek_to_time(3.5));
        assert_eq!(jukebox.current_index(), 1);

        assert!(!jukebox.seek_to_time(10.0));
        assert_eq!(jukebox.current_index(), 1);
        assert!(!jukebox.seek_to_time(f64::NAN));
    }

    #[test]
    fn test_seek_while_playing_reschedules() {
        let mut jukebox = jukebox(uniform_segments(64, 0.5));
        jukebox.play();
        run(&mut jukebox, 1.0);

        assert!(jukebox.seek_to_time(10.2));

        let pending = &jukebox.clock().slices;
        assert_eq!(pending[0].offset, 10.0);
        assert_eq!(pending[0].when, jukebox.clock().now);
    }

    #[test]
    fn test_seek_to_segment_before_play() {
        let mut jukebox = jukebox(uniform_segments(32, 0.5));

        assert!(!jukebox.seek_to_segment(32));
        assert_eq!(jukebox.current_index(), 0);

        assert!(jukebox.seek_to_segment(12));
        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);
        jukebox.play();

        assert_eq!(jukebox.clock().history[0].offset, 6.0);
        assert_eq!(jukebox.current_segment().map(|s| s.id), Some(12));
    }

    #[test]
    fn test_seek_while_paused_clears_current_segment() {
        let mut jukebox = jukebox(uniform_segments(64, 0.5));
        jukebox.play();
        run(&mut jukebox, 1.0);
        jukebox.pause();
        assert!(jukebox.current_segment().is_some());

        assert!(jukebox.seek_to_time(20.0));
        assert!(jukebox.current_segment().is_none());
        assert_eq!(jukebox.current_index(), 40);
    }

    #[test]
    fn test_empty_graph_play_is_noop() {
        let track = AudioArc::silence(1.0, 1000, 1);
        let mut jukebox =
            Jukebox::new(track, SegmentGraph::default(), RecordingClock::new(), config()).unwrap();

        jukebox.play();
        jukebox.tick();

        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);
        assert!(jukebox.clock().history.is_empty());
        assert_eq!(jukebox.events().count(), 0);
    }

    #[test]
    fn test_dead_end_stops_playback() {
        let mut segments = uniform_segments(32, 0.5);
        segments[1].next = 77;
        let mut jukebox = jukebox(segments);

        jukebox.play();
        run(&mut jukebox, 2.0);

        assert_eq!(jukebox.playback_state(), PlaybackState::Stopped);
        assert!(jukebox.events().any(|e| e == JukeboxEvent::PlaybackEnded));
    }

    #[test]
    fn test_jump_probability_is_clamped() {
        let mut jukebox = jukebox(uniform_segments(4, 0.5));

        jukebox.set_jump_probability(2.0);
        assert_eq!(jukebox.jump_probability(), 1.0);
        jukebox.set_jump_probability(0.25);
        assert_eq!(jukebox.jump_probability(), 0.25);
    }
}
