use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// A decoded track: shared, immutable interleaved samples.
///
/// Cloning only bumps a reference count, so the scheduler, the facade and the
/// audio thread can all hold the same recording without copying it.
///
/// ```text
/// AudioArc
/// ├─ samples: Arc<[f32]> ────> Heap: [L, R, L, R, ...]
/// ├─ sample_rate: u32
/// └─ channels: u16
/// ```
///
/// # Examples
///
/// ```
/// use jukebox_transport::AudioArc;
///
/// let audio = AudioArc::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(audio.frame_sample(1, 0), 1.0);
/// ```
#[derive(Clone)]
pub struct AudioArc {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// Create a new `AudioArc` from owned interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    /// Silent buffer of the given length, mostly useful for tests and previews.
    pub fn silence(duration_secs: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration_secs * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the recording in seconds. This is the authoritative track
    /// duration; segment graphs are expected to agree with it.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` for an output channel. Output channels beyond the
    /// recording's channel count wrap around, so mono feeds both sides of a
    /// stereo device. Out-of-range frames read as silence.
    #[inline]
    pub fn frame_sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        let idx = frame * channels + channel % channels;
        self.samples.get(idx).copied().unwrap_or(0.0)
    }

    /// Resample to `target_sample_rate`. Returns a cheap clone when the rate
    /// already matches.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }
        resample_audio_arc(self, target_sample_rate)
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// High quality sinc resampling of a whole track.
///
/// The adapter calls this once per loaded track so that segment offsets, which
/// are expressed in seconds, map onto device frames without drift.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    let ratio = target_sample_rate as f64 / audio.sample_rate as f64;

    // rubato wants one Vec per channel
    let mut planar = vec![Vec::with_capacity(input_frames); channels];
    for frame in audio.samples().chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)?;
    let output = resampler.process(&planar, None)?;

    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        for channel in &output {
            interleaved.push(channel[frame_idx]);
        }
    }

    Ok(AudioArc::new(interleaved, target_sample_rate, audio.channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, duration_secs: f32, channels: u16) -> AudioArc {
        let frames = (sample_rate as f32 * duration_secs) as usize;
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let value = (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin();
            for _ in 0..channels {
                samples.push(value);
            }
        }
        AudioArc::new(samples, sample_rate, channels)
    }

    #[test]
    fn test_audio_arc_new() {
        let audio = AudioArc::new(vec![0.0, 0.1, 0.2, 0.3], 44100, 2);

        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 2);
        assert!(!audio.is_empty());
    }

    #[test]
    #[should_panic(expected = "channels must be greater than 0")]
    fn test_audio_arc_zero_channels() {
        AudioArc::new(vec![0.0], 44100, 0);
    }

    #[test]
    #[should_panic(expected = "samples.len() must be divisible by channels")]
    fn test_audio_arc_invalid_length() {
        AudioArc::new(vec![0.0, 0.1, 0.2], 44100, 2);
    }

    #[test]
    fn test_clone_shares_samples() {
        let audio = AudioArc::new(vec![0.0; 1000], 44100, 2);
        let clone = audio.clone();

        assert_eq!(Arc::strong_count(clone.samples_arc()), 2);
    }

    #[test]
    fn test_duration_is_frames_over_rate() {
        let audio = AudioArc::silence(1.5, 48000, 2);
        assert!((audio.duration_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_frame_sample_wraps_mono_and_reads_past_end_as_silence() {
        let audio = AudioArc::new(vec![0.25, 0.5], 44100, 1);

        assert_eq!(audio.frame_sample(1, 0), 0.5);
        assert_eq!(audio.frame_sample(1, 1), 0.5, "mono should feed every output channel");
        assert_eq!(audio.frame_sample(2, 0), 0.0);
    }

    #[test]
    fn test_resample_same_rate_is_cheap_clone() {
        let audio = sine(440.0, 44100, 0.05, 2);
        let resampled = audio.resample(44100).unwrap();

        assert_eq!(resampled.frames(), audio.frames());
        assert_eq!(Arc::strong_count(audio.samples_arc()), 2);
    }

    #[test]
    fn test_resample_keeps_duration() {
        let audio = sine(440.0, 44100, 0.2, 2);
        let resampled = audio.resample(48000).unwrap();

        assert_eq!(resampled.sample_rate(), 48000);
        assert_eq!(resampled.channels(), 2);
        // filter delay trims a little off the end
        assert!(
            (resampled.duration_secs() - audio.duration_secs()).abs() < 0.02,
            "expected ~{}s, got {}s",
            audio.duration_secs(),
            resampled.duration_secs()
        );
    }

    #[test]
    fn test_resample_empty_buffer() {
        let audio = AudioArc::new(Vec::new(), 22050, 1);
        let resampled = audio.resample(44100).unwrap();

        assert!(resampled.is_empty());
        assert_eq!(resampled.sample_rate(), 44100);
    }
}
