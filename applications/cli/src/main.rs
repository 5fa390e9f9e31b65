/// Stem Player - separate a song into stems and play them back in sync
mod config;
mod ui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::AppConfig;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stem_audio_desktop::DesktopHost;
use stem_playback::{SessionLifecycle, TrackId, TrackSet};
use stem_server_client::{CleanupNotifier, DownloadProgress, StemServerClient};
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ui::Command;

const INPUT_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "stem-player")]
#[command(about = "Separate songs into stems and play them back in sync", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Separation server URL (overrides the configuration)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the separation server is up
    Health,
    /// Separate a song and download its stems
    Separate {
        /// Song to upload (mp3, wav, flac, ogg, m4a, aac)
        file: PathBuf,
        /// Output directory for the stems
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Separate a song and play its stems interactively
    Play {
        file: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Play local stem files, e.g. `vocals=song_vocals.wav drums=song_drums.wav`
    PlayStems {
        #[arg(required = true, value_parser = ui::parse_stem_arg)]
        stems: Vec<(TrackId, String)>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "stem_player=debug,stem_playback=debug,stem_audio_desktop=debug,stem_server_client=debug"
    } else {
        "stem_player=info,stem_playback=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let runtime = Runtime::new().context("failed to start async runtime")?;

    match cli.command {
        Commands::Health => health(&runtime, &config),
        Commands::Separate { file, out } => {
            let out = out.unwrap_or_else(|| config.output_dir.clone());
            separate(&runtime, &config, &file, &out)?;
            Ok(())
        }
        Commands::Play { file, out } => {
            let out = out.unwrap_or_else(|| config.output_dir.clone());
            play(&runtime, &config, &file, &out)
        }
        Commands::PlayStems { stems } => {
            let tracks: TrackSet = stems.into_iter().collect();
            let mut session =
                SessionLifecycle::new(DesktopHost::new(config.desktop()), config.playback());
            run_session(&mut session, tracks)
        }
    }
}

fn health(runtime: &Runtime, config: &AppConfig) -> anyhow::Result<()> {
    let client = StemServerClient::new(config.server())?;
    let health = runtime.block_on(client.health())?;
    println!(
        "{}: {} ({} active sessions)",
        health.status, health.message, health.active_sessions
    );
    Ok(())
}

/// Upload, then download every stem; the result keeps the session token
fn separate(
    runtime: &Runtime,
    config: &AppConfig,
    file: &Path,
    out: &Path,
) -> anyhow::Result<TrackSet> {
    let client = StemServerClient::new(config.server())?;

    println!("Separating {} (this can take a few minutes)...", file.display());
    let result = runtime.block_on(client.separate(file))?;
    tracing::info!(session = %result.session_id, stems = result.tracks.len(), "Separation done");

    let tracks =
        runtime.block_on(client.download_stems_or_cleanup(&result, file, out, report_progress))?;
    println!();
    for (track, path) in tracks.iter() {
        println!("  {} {:<7} {}", track.icon(), track.label(), path);
    }
    Ok(tracks)
}

fn report_progress(progress: DownloadProgress) {
    if progress.bytes_total.is_some() {
        print!(
            "\r  {:<7} {} {:>3.0}%",
            progress.track.label(),
            ui::progress_bar(f64::from(progress.progress), 20),
            progress.progress * 100.0
        );
    } else {
        print!(
            "\r  {:<7} {} KiB",
            progress.track.label(),
            progress.bytes_received / 1024
        );
    }
    let _ = std::io::stdout().flush();
}

fn play(runtime: &Runtime, config: &AppConfig, file: &Path, out: &Path) -> anyhow::Result<()> {
    let tracks = separate(runtime, config, file, out)?;

    let client = StemServerClient::new(config.server())?;
    let cleanup = CleanupNotifier::new(client, runtime.handle().clone());
    let mut session = SessionLifecycle::new(DesktopHost::new(config.desktop()), config.playback())
        .with_cleanup(cleanup.clone());

    let result = run_session(&mut session, tracks);
    runtime.block_on(cleanup.wait_pending());
    result
}

/// Play `tracks` until the user quits or stdin closes
fn run_session(session: &mut SessionLifecycle, tracks: TrackSet) -> anyhow::Result<()> {
    let order = session.start(tracks)?;
    tracing::debug!(tracks = ?order, "Session started");
    println!("{}", ui::HELP);

    let input = spawn_input_reader();
    loop {
        session.pump();
        for event in session.drain_events() {
            if let Some(text) = ui::render_event(&event) {
                println!("{}", text);
            }
        }

        match input.recv_timeout(INPUT_POLL) {
            Ok(line) => match ui::parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => apply(session, command),
                Err(e) => println!("{}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.end();
    Ok(())
}

fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn apply(session: &mut SessionLifecycle, command: Command) {
    match command {
        Command::TogglePlay => {
            session.toggle_play_pause();
        }
        Command::Seek(secs) => {
            if session.seek(secs).is_none() {
                println!("Nothing to seek");
            }
        }
        Command::SeekFraction(fraction) => {
            if session.seek_to_fraction(fraction).is_none() {
                println!("Duration not known yet");
            }
        }
        Command::Volume(track, volume) => {
            if let Err(e) = session.set_volume(track, volume) {
                println!("{}", e);
            }
        }
        Command::Mute(track) => {
            if let Err(e) = session.toggle_mute(track) {
                println!("{}", e);
            }
        }
        Command::Status => print_status(session),
        Command::Help => println!("{}", ui::HELP),
        Command::Quit => {}
    }
}

fn print_status(session: &SessionLifecycle) {
    println!("{}", ui::status_line(&session.snapshot()));
    for track in session.track_ids() {
        if let Ok(entry) = session.mix_entry(track) {
            println!(
                "{}",
                ui::mix_line(track, entry, session.is_track_failed(track))
            );
        }
    }
}
