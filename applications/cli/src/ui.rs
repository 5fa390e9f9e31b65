//! Terminal rendering and interactive command parsing

use anyhow::{anyhow, bail};
use stem_playback::{
    format_time, MixEntry, PlaybackEvent, TrackId, TransportSnapshot, TransportState,
};

pub const HELP: &str = "\
Commands:
  p                 play / pause
  s <secs>          seek to a position
  f <0-1>           seek to a fraction of the song
  v <track> <0-1>   set a stem's volume
  m <track>         mute / unmute a stem
  i                 show status
  h                 show this help
  q                 quit";

const BAR_WIDTH: usize = 30;

/// One line typed at the interactive prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    Seek(f64),
    SeekFraction(f64),
    Volume(TrackId, f32),
    Mute(TrackId),
    Status,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> anyhow::Result<Command> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        bail!("empty command (h for help)");
    };
    let args: Vec<&str> = parts.collect();

    let command = match (verb, args.as_slice()) {
        ("p", []) => Command::TogglePlay,
        ("s", [secs]) => Command::Seek(parse_number(secs)?),
        ("f", [fraction]) => Command::SeekFraction(parse_number(fraction)?),
        ("v", [track, volume]) => {
            Command::Volume(parse_track(track)?, parse_number(volume)? as f32)
        }
        ("m", [track]) => Command::Mute(parse_track(track)?),
        ("i", []) => Command::Status,
        ("h" | "?", []) => Command::Help,
        ("q", []) => Command::Quit,
        _ => bail!("unrecognized command '{}' (h for help)", line.trim()),
    };
    Ok(command)
}

fn parse_number(text: &str) -> anyhow::Result<f64> {
    let value: f64 = text
        .parse()
        .map_err(|_| anyhow!("'{}' is not a number", text))?;
    if !value.is_finite() {
        bail!("'{}' is not a finite number", text);
    }
    Ok(value)
}

fn parse_track(text: &str) -> anyhow::Result<TrackId> {
    Ok(text.parse::<TrackId>()?)
}

/// Parse a `track=locator` argument
pub fn parse_stem_arg(arg: &str) -> Result<(TrackId, String), String> {
    let (track, locator) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected TRACK=PATH, got '{}'", arg))?;
    let track = track.parse::<TrackId>().map_err(|e| e.to_string())?;
    if locator.is_empty() {
        return Err(format!("missing path for {}", track));
    }
    Ok((track, locator.to_string()))
}

pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn status_line(snapshot: &TransportSnapshot) -> String {
    let symbol = match snapshot.state {
        TransportState::Playing => "▶",
        TransportState::Paused | TransportState::Ready => "⏸",
        TransportState::Loading => "…",
        TransportState::Idle | TransportState::Disposed => "■",
    };
    let duration = snapshot
        .duration
        .map(format_time)
        .unwrap_or_else(|| "-:--".to_string());
    format!(
        "{} {} / {} {}",
        symbol,
        format_time(snapshot.current_time),
        duration,
        progress_bar(snapshot.progress(), BAR_WIDTH)
    )
}

pub fn mix_line(track: TrackId, entry: MixEntry, failed: bool) -> String {
    let level = if failed {
        "failed".to_string()
    } else if entry.muted {
        format!("muted ({:>3.0}%)", entry.volume * 100.0)
    } else {
        format!("{:>3.0}%", entry.volume * 100.0)
    };
    format!("  {} {:<7} {}", track.icon(), track.label(), level)
}

/// Text for an event worth showing; position updates are not
pub fn render_event(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::SessionStarted { tracks } => {
            let names: Vec<&str> = tracks.iter().map(TrackId::label).collect();
            Some(format!("Loading {}", names.join(", ")))
        }
        PlaybackEvent::StateChanged { state } => match state {
            TransportState::Ready => Some("Ready (p to play)".to_string()),
            TransportState::Playing => Some("Playing".to_string()),
            TransportState::Paused => Some("Paused".to_string()),
            _ => None,
        },
        PlaybackEvent::DurationChanged { duration } => {
            Some(format!("Duration {}", format_time(*duration)))
        }
        PlaybackEvent::VolumeChanged {
            track,
            volume,
            muted,
            ..
        } => Some(if *muted {
            format!("{} muted", track.label())
        } else {
            format!("{} volume {:.0}%", track.label(), volume * 100.0)
        }),
        PlaybackEvent::TrackFailed { track, message } => {
            Some(format!("{} unavailable: {}", track.label(), message))
        }
        PlaybackEvent::PositionUpdate { .. } | PlaybackEvent::SessionEnded => None,
    }
}
