use std::path::Path;

use jukebox_core::{Jukebox, JukeboxConfig, JukeboxEvent, PlaybackClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::control::{self, HELP};

/// Play until ctrl-c or `q`, ticking the scheduler on a fixed interval.
pub async fn run(
    audio: &Path,
    analysis: &Path,
    start: Option<usize>,
    config: JukeboxConfig,
) -> anyhow::Result<()> {
    let clock = jukebox_engine::start()?;
    let mut jukebox = Jukebox::open(audio, analysis, clock, config)?;

    info!("{HELP}");
    if let Some(index) = start {
        jukebox.seek_to_segment(index);
    }
    jukebox.play();
    report_events(&mut jukebox);

    let mut interval = tokio::time::interval(jukebox.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                jukebox.tick();
                report_events(&mut jukebox);
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !control::handle_line(&mut jukebox, &line) {
                            break;
                        }
                        report_events(&mut jukebox);
                    }
                    None => {
                        debug!("stdin closed, ctrl-c to quit");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    jukebox.stop();
    Ok(())
}

fn report_events<C: PlaybackClock>(jukebox: &mut Jukebox<C>) {
    for event in jukebox.events() {
        match event {
            JukeboxEvent::PlaybackStarted => info!("playback started"),
            JukeboxEvent::SegmentChanged { index, id, cluster } => {
                debug!("now playing segment {index} (id {id}, cluster {cluster})")
            }
            JukeboxEvent::Jumped { from, to, count } => info!("jump #{count}: {from} -> {to}"),
            JukeboxEvent::LoopClosed { from, resume } => {
                info!("looped from {from} back to {resume}")
            }
            JukeboxEvent::PlaybackEnded => info!("reached a dead end, playback ended"),
        }
    }
}
