use jukebox_transport::{AudioArc, GainRamp, PathId, PlaybackClock, SliceRequest};

/// A clock that only records what it was asked to do. Time moves when the
/// test says so, and not while suspended.
#[derive(Debug, Default)]
pub struct RecordingClock {
    pub now: f64,
    pub suspended: bool,
    /// Slices still pending, cleared by `stop_all`.
    pub slices: Vec<SliceRequest>,
    /// Every slice ever scheduled.
    pub history: Vec<SliceRequest>,
    pub opened: Vec<(PathId, f32)>,
    pub ramps: Vec<(PathId, GainRamp)>,
    pub closed: Vec<(PathId, f64)>,
    pub stops: usize,
    pub loaded_frames: Option<usize>,
    /// Position handed out by the last `now()`, like a device status read.
    pub reported: f64,
    pub polls: usize,
    next_path: u32,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self {
            suspended: true,
            next_path: 1,
            ..Default::default()
        }
    }

    pub fn advance(&mut self, secs: f64) {
        if !self.suspended {
            self.now += secs;
        }
    }

    pub fn main_slices(&self) -> Vec<SliceRequest> {
        self.history
            .iter()
            .filter(|s| s.path == PathId::MAIN)
            .copied()
            .collect()
    }

    pub fn slices_on(&self, path: PathId) -> Vec<SliceRequest> {
        self.history.iter().filter(|s| s.path == path).copied().collect()
    }
}

impl PlaybackClock for RecordingClock {
    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn now(&mut self) -> f64 {
        self.reported = self.now;
        self.polls += 1;
        self.now
    }

    fn load_track(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        self.loaded_frames = Some(audio.frames());
        Ok(())
    }

    fn open_path(&mut self, gain: f32) -> PathId {
        let path = PathId(self.next_path);
        self.next_path += 1;
        self.opened.push((path, gain));
        path
    }

    fn ramp_gain(&mut self, path: PathId, ramp: GainRamp) {
        self.ramps.push((path, ramp));
    }

    fn schedule(&mut self, slice: SliceRequest) {
        self.slices.push(slice);
        self.history.push(slice);
    }

    fn close_path(&mut self, path: PathId, at: f64) {
        self.closed.push((path, at));
    }

    fn stop_all(&mut self) {
        self.slices.clear();
        self.stops += 1;
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }
}
