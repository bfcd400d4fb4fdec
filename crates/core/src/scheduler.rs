//! The lookahead loop.
//!
//! Every tick tops the clock up so that audio is enqueued at least
//! `lookahead_secs` past the playback position. Segments are placed back to
//! back in device time: each slice starts exactly where the previous one ends.

use std::collections::VecDeque;

use jukebox_transport::{GainRamp, PathId, PlaybackClock, RampCurve, SegmentGraph, SliceRequest};
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use crate::closure::{Lane, closure_start, plan_closure};
use crate::policy::{JumpPolicy, Step};
use crate::{JukeboxConfig, JukeboxEvent};

/// Scheduling state carried between ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    /// Next position to schedule.
    pub current_index: usize,
    /// Device time at which the next slice starts.
    pub next_device_time: f64,
    /// `None` until the first jump since play began.
    pub segments_since_jump: Option<usize>,
    pub last_jump_device_time: Option<f64>,
    pub jump_count: u64,
    pub jump_probability: f64,
    pub is_playing: bool,
}

impl EngineState {
    fn new(jump_probability: f64) -> Self {
        Self {
            current_index: 0,
            next_device_time: 0.0,
            segments_since_jump: None,
            last_jump_device_time: None,
            jump_count: 0,
            jump_probability,
            is_playing: false,
        }
    }

    fn count_segment(&mut self) {
        if let Some(count) = self.segments_since_jump.as_mut() {
            *count += 1;
        }
    }
}

/// A segment that will become audible at device time `at`.
#[derive(Debug, Clone, Copy)]
struct Announcement {
    at: f64,
    index: usize,
}

pub struct Scheduler<C: PlaybackClock> {
    clock: C,
    graph: SegmentGraph,
    config: JukeboxConfig,
    policy: JumpPolicy,
    closure_start: usize,
    rng: SmallRng,
    state: EngineState,
    announcements: VecDeque<Announcement>,
    events: VecDeque<JukeboxEvent>,
    announced: Option<usize>,
    awaiting_start: bool,
    pub(crate) ticking: bool,
}

impl<C: PlaybackClock> Scheduler<C> {
    pub fn new(clock: C, graph: SegmentGraph, config: JukeboxConfig, rng: SmallRng) -> Self {
        let config = config.sanitized();
        let policy = JumpPolicy::new(config.min_jump_separation, config.min_segments_between_jumps);
        let closure_start = closure_start(graph.len(), config.closure_window);

        Self {
            clock,
            state: EngineState::new(config.jump_probability),
            graph,
            config,
            policy,
            closure_start,
            rng,
            announcements: VecDeque::new(),
            events: VecDeque::new(),
            announced: None,
            awaiting_start: false,
            ticking: false,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn graph(&self) -> &SegmentGraph {
        &self.graph
    }

    pub fn config(&self) -> &JukeboxConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    /// The most recently announced position, i.e. what is audible now.
    pub fn announced(&self) -> Option<usize> {
        self.announced
    }

    pub fn drain_events(&mut self) -> std::collections::vec_deque::Drain<'_, JukeboxEvent> {
        self.events.drain(..)
    }

    /// Begin or resume scheduling. Returns false if there is nothing to play
    /// or playback is already running.
    pub fn start(&mut self) -> bool {
        if self.graph.is_empty() {
            warn!("nothing to play: the segment graph is empty");
            return false;
        }
        if self.state.is_playing {
            return false;
        }

        self.clock.resume();
        // never schedule into the past, and never on top of audio still queued
        let now = self.clock.now();
        self.state.next_device_time = self.state.next_device_time.max(now);
        self.state.is_playing = true;
        self.awaiting_start = true;

        self.tick();
        true
    }

    /// Halt the clock but keep the position. Queued audio stays queued and
    /// plays on when the clock resumes.
    pub fn pause(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        self.awaiting_start = false;
        self.clock.suspend();
    }

    /// Cancel everything and go back to the first segment.
    pub fn halt(&mut self) {
        self.clock.stop_all();
        self.clock.suspend();

        let probability = self.state.jump_probability;
        self.state = EngineState::new(probability);
        self.state.next_device_time = self.clock.now();

        self.announcements.clear();
        self.announced = None;
        self.awaiting_start = false;
    }

    /// Continue the walk from `index`, dropping audio that was queued for the
    /// old position. Cooldown state carries over.
    pub fn relocate(&mut self, index: usize) {
        self.clock.stop_all();
        self.announcements.clear();
        self.announced = None;
        self.state.current_index = index;
        self.state.next_device_time = self.clock.now();

        if self.state.is_playing {
            self.tick();
        }
    }

    /// Takes effect from the next jump decision.
    pub fn set_jump_probability(&mut self, probability: f64) {
        if probability.is_nan() {
            warn!("ignoring NaN jump probability");
            return;
        }
        self.state.jump_probability = probability.clamp(0.0, 1.0);
    }

    /// Schedule until the lookahead window is full.
    pub fn tick(&mut self) {
        // a tick already on the stack owns the state
        if self.ticking {
            return;
        }
        self.ticking = true;
        self.fill();
        self.ticking = false;
    }

    fn fill(&mut self) {
        // keep reading the clock while idle so its position never goes stale
        self.clock.collect();
        let now = self.clock.now();
        if !self.state.is_playing {
            return;
        }

        let horizon = now + self.config.lookahead_secs;

        while self.state.is_playing && self.state.next_device_time < horizon {
            let index = self.state.current_index;
            if index >= self.closure_start {
                self.close_loop(index);
                continue;
            }

            let Some(segment) = self.graph.get(index) else {
                self.end_walk(index);
                break;
            };
            let when = self.state.next_device_time;
            self.clock.schedule(SliceRequest {
                path: PathId::MAIN,
                when,
                offset: segment.start,
                duration: segment.duration,
            });
            self.state.next_device_time = when + segment.duration;
            self.state.count_segment();
            self.announcements.push_back(Announcement { at: when, index });
            self.mark_started();

            debug!("scheduled segment {index} at {when:.3}s");

            let since_jump = self.state.segments_since_jump.unwrap_or(usize::MAX);
            let step = self.policy.decide(
                &self.graph,
                index,
                since_jump,
                self.state.jump_probability,
                &mut self.rng,
            );

            match step {
                Step::Sequential(next) => self.state.current_index = next,
                Step::Jump(target) => {
                    self.state.jump_count += 1;
                    self.state.segments_since_jump = Some(0);
                    self.state.last_jump_device_time = Some(self.state.next_device_time);
                    self.state.current_index = target;
                    self.events.push_back(JukeboxEvent::Jumped {
                        from: index,
                        to: target,
                        count: self.state.jump_count,
                    });
                    debug!("jump {index} -> {target} (#{})", self.state.jump_count);
                }
                // the last segment wraps; anything else without a successor is a dead end
                Step::End if index + 1 == self.graph.len() => {
                    self.state.current_index = self.graph.len();
                }
                Step::End => self.end_walk(index),
            }
        }

        self.release_announcements(horizon);
    }

    /// Crossfade the tail starting at `from` into the head of the track.
    fn close_loop(&mut self, from: usize) {
        let start = self.state.next_device_time;
        let plan = plan_closure(&self.graph, from, self.config.closure_window, start);
        let floor = self.config.fade_floor;

        let fade_out = plan.has_fade_out().then(|| self.clock.open_path(1.0));
        let fade_in = self.clock.open_path(floor);

        if let Some(path) = fade_out {
            self.clock.ramp_gain(
                path,
                GainRamp {
                    from: 1.0,
                    to: floor,
                    start,
                    end: plan.fade_out_end,
                    curve: RampCurve::Exponential,
                },
            );
        }
        self.clock.ramp_gain(
            fade_in,
            GainRamp {
                from: floor,
                to: 1.0,
                start,
                end: plan.fade_in_ramp_end,
                curve: RampCurve::Exponential,
            },
        );

        for slice in &plan.slices {
            let Some(segment) = self.graph.get(slice.index) else {
                continue;
            };
            let path = match (slice.lane, fade_out) {
                (Lane::FadeOut, Some(path)) => path,
                (Lane::FadeOut, None) => continue,
                (Lane::FadeIn, _) => fade_in,
            };
            self.clock.schedule(SliceRequest {
                path,
                when: slice.when,
                offset: segment.start,
                duration: segment.duration,
            });
            if slice.lane == Lane::FadeIn {
                self.announcements.push_back(Announcement {
                    at: slice.when,
                    index: slice.index,
                });
                self.state.count_segment();
            }
        }

        if let Some(path) = fade_out {
            self.clock.close_path(path, plan.fade_out_end);
        }
        self.clock.close_path(fade_in, plan.fade_in_end);

        self.state.next_device_time = plan.fade_in_end;
        self.state.current_index = plan.resume_index;
        self.mark_started();
        self.events.push_back(JukeboxEvent::LoopClosed {
            from,
            resume: plan.resume_index,
        });

        info!(
            "loop closed at {start:.3}s: {}..{} fades into 0..{}, resuming at {}",
            plan.fade_out.start, plan.fade_out.end, plan.fade_in.end, plan.resume_index
        );
    }

    fn end_walk(&mut self, index: usize) {
        warn!("segment {index} has no successor, playback ends");
        self.state.is_playing = false;
        self.awaiting_start = false;
        self.events.push_back(JukeboxEvent::PlaybackEnded);
    }

    fn mark_started(&mut self) {
        if self.awaiting_start {
            self.awaiting_start = false;
            self.events.push_back(JukeboxEvent::PlaybackStarted);
        }
    }

    fn release_announcements(&mut self, horizon: f64) {
        while let Some(next) = self.announcements.front().copied() {
            if next.at >= horizon {
                break;
            }
            self.announcements.pop_front();
            self.announced = Some(next.index);

            if let Some(segment) = self.graph.get(next.index) {
                self.events.push_back(JukeboxEvent::SegmentChanged {
                    index: next.index,
                    id: segment.id,
                    cluster: segment.cluster,
                });
            }
        }
    }
}

impl<C: PlaybackClock> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.clock.stop_all();
        self.clock.suspend();
    }
}
