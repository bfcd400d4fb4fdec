//! Sample-accurate voice mixer shared by the device stream and offline renders.
//!
//! Nothing in [`Mixer::render`] or [`Mixer::apply`] allocates: the voice and
//! path tables are sized up front and overflow is counted, not grown.

use basedrop::Shared;
use jukebox_transport::{AudioArc, Command, FrameRamp, PathId, Voice};

pub const MAX_VOICES: usize = 512;
pub const MAX_PATHS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct GainPath {
    id: PathId,
    gain: f32,
    ramp: Option<FrameRamp>,
    close_at: Option<u64>,
}

impl GainPath {
    fn new(id: PathId, gain: f32) -> Self {
        Self {
            id,
            gain,
            ramp: None,
            close_at: None,
        }
    }

    fn gain_at(&mut self, frame: u64) -> f32 {
        if let Some(ramp) = self.ramp {
            if let Some(gain) = ramp.gain_at(frame) {
                if frame >= ramp.end_frame {
                    self.gain = ramp.to;
                    self.ramp = None;
                }
                return gain;
            }
        }
        self.gain
    }
}

pub struct Mixer {
    track: Option<Shared<AudioArc>>,
    voices: Vec<Voice>,
    paths: Vec<GainPath>,
    gains: [f32; MAX_PATHS],
    position: u64,
    running: bool,
    dropped: u32,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        let mut paths = Vec::with_capacity(MAX_PATHS);
        paths.push(GainPath::new(PathId::MAIN, 1.0));
        Self {
            track: None,
            voices: Vec::with_capacity(MAX_VOICES),
            paths,
            gains: [0.0; MAX_PATHS],
            position: 0,
            running: false,
            dropped: 0,
        }
    }

    /// Swap in a new source recording. The previous one is released through
    /// basedrop, never freed here.
    pub fn set_track(&mut self, track: Shared<AudioArc>) {
        self.voices.clear();
        self.track = Some(track);
    }

    /// Device clock in frames.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Voices discarded since the last call.
    pub fn take_dropped(&mut self) -> u32 {
        std::mem::take(&mut self.dropped)
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Resume => self.running = true,
            Command::Suspend => self.running = false,
            Command::Schedule(voice) => {
                if voice.frames == 0 {
                    return;
                }
                if self.voices.len() < MAX_VOICES {
                    self.voices.push(voice);
                } else {
                    self.dropped += 1;
                }
            }
            Command::OpenPath { path, gain } => {
                if let Some(existing) = self.paths.iter_mut().find(|p| p.id == path) {
                    *existing = GainPath::new(path, gain);
                } else if self.paths.len() < MAX_PATHS {
                    self.paths.push(GainPath::new(path, gain));
                }
            }
            Command::Ramp { path, ramp } => {
                let position = self.position;
                if let Some(target) = self.paths.iter_mut().find(|p| p.id == path) {
                    // freeze wherever an unfinished ramp currently is
                    target.gain = target.gain_at(position);
                    target.ramp = Some(ramp);
                }
            }
            Command::ClosePath { path, at_frame } => {
                if path == PathId::MAIN {
                    return;
                }
                if let Some(target) = self.paths.iter_mut().find(|p| p.id == path) {
                    target.close_at = Some(at_frame);
                }
            }
            Command::StopAll => {
                self.voices.clear();
                self.paths.retain(|p| p.id == PathId::MAIN);
                if let Some(main) = self.paths.first_mut() {
                    *main = GainPath::new(PathId::MAIN, 1.0);
                }
            }
        }
    }

    fn close_due_paths(&mut self) {
        let position = self.position;
        if !self
            .paths
            .iter()
            .any(|p| p.close_at.is_some_and(|at| at <= position))
        {
            return;
        }
        self.paths
            .retain(|p| !p.close_at.is_some_and(|at| at <= position));
        let paths = &self.paths;
        self.voices
            .retain(|v| paths.iter().any(|p| p.id == v.path));
    }

    /// Mix into interleaved `out`. While suspended the output is silence and
    /// the clock does not move.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if !self.running || channels == 0 {
            return;
        }

        for frame in out.chunks_mut(channels) {
            self.close_due_paths();

            let position = self.position;
            for (slot, path) in self.gains.iter_mut().zip(self.paths.iter_mut()) {
                *slot = path.gain_at(position);
            }

            if let Some(track) = self.track.as_deref() {
                for voice in &self.voices {
                    if position < voice.start_frame || position >= voice.end_frame() {
                        continue;
                    }
                    let Some(path_idx) = self.paths.iter().position(|p| p.id == voice.path) else {
                        continue;
                    };
                    let gain = self.gains[path_idx];
                    let source = (voice.source_frame + position - voice.start_frame) as usize;
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        *sample += track.frame_sample(source, ch) * gain;
                    }
                }
            }

            self.position += 1;
        }

        let position = self.position;
        self.voices.retain(|v| v.end_frame() > position);
    }
}
