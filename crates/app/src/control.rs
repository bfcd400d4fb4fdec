//! Interactive transport commands typed on stdin while playing.

use jukebox_core::{Jukebox, PlaybackClock};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    TogglePlay,
    Stop,
    Restart,
    Seek(f64),
    Probability(f64),
    Quit,
}

pub const HELP: &str = "commands: p (play/pause)  s (stop)  r (restart)  seek <secs>  prob <0..1>  q (quit)";

pub fn parse(line: &str) -> Result<Control, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(HELP.to_string());
    };

    let mut number = |name: &str| -> Result<f64, String> {
        let word = words
            .next()
            .ok_or_else(|| format!("{name} needs a number"))?;
        word.parse::<f64>()
            .map_err(|_| format!("'{word}' is not a number"))
    };

    match command {
        "p" | "play" | "pause" => Ok(Control::TogglePlay),
        "s" | "stop" => Ok(Control::Stop),
        "r" | "restart" => Ok(Control::Restart),
        "seek" => number("seek").map(Control::Seek),
        "prob" => number("prob").map(Control::Probability),
        "q" | "quit" | "exit" => Ok(Control::Quit),
        other => Err(format!("unknown command '{other}'; {HELP}")),
    }
}

/// Apply `control` to the jukebox. Returns false when the user asked to quit.
pub fn apply<C: PlaybackClock>(jukebox: &mut Jukebox<C>, control: Control) -> bool {
    match control {
        Control::TogglePlay if jukebox.is_playing() => jukebox.pause(),
        Control::TogglePlay => jukebox.play(),
        Control::Stop => jukebox.stop(),
        Control::Restart => jukebox.restart(),
        Control::Seek(seconds) => {
            if jukebox.seek_to_time(seconds) {
                info!("seeked to {seconds:.2}s (segment {})", jukebox.current_index());
            }
        }
        Control::Probability(probability) => {
            jukebox.set_jump_probability(probability);
            info!("jump probability {:.2}", jukebox.jump_probability());
        }
        Control::Quit => return false,
    }
    true
}

pub fn handle_line<C: PlaybackClock>(jukebox: &mut Jukebox<C>, line: &str) -> bool {
    match parse(line) {
        Ok(control) => apply(jukebox, control),
        Err(message) => {
            warn!("{message}");
            true
        }
    }
}
