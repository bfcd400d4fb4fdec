/// Notifications for whoever is watching playback.
///
/// The engine queues these as it schedules; drain them with
/// [`Jukebox::events`](crate::Jukebox::events) after each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum JukeboxEvent {
    /// The first segment after `play` has been handed to the clock.
    PlaybackStarted,
    /// `index` is about to become audible.
    SegmentChanged {
        index: usize,
        id: usize,
        cluster: usize,
    },
    /// A jump was chosen. `count` is the running total since the last stop.
    Jumped { from: usize, to: usize, count: u64 },
    /// The walk reached the end and crossfaded back to `resume`.
    LoopClosed { from: usize, resume: usize },
    /// A segment without a successor was reached outside the closure window.
    PlaybackEnded,
}
