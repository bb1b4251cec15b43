//! Interactive terminal player
//!
//! Single-threaded event loop over three channels:
//!
//! ```text
//! stdin thread ──lines──┐
//! 16 ms ticker ─────────┼──> select! ──> PlaybackSession (pump, on_frame, commands)
//! tokio tasks ──replies─┘
//! ```
//!
//! Server requests (likes, liked status, playlists, audiobook progress) run on the tokio
//! runtime and report back through the replies channel, so the session is
//! only ever touched from this thread.

use crate::command::{Command, HELP};
use crate::display::{describe_event, describe_playlists, StatusLine};
use anyhow::Context;
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use encore_client::{LibraryClientHandle, PlaylistRecord};
use encore_playback::{
    FramePulse, LikeTicket, PlaybackConfig, PlaybackEvent, PlaybackSession, PlaybackState,
    PlaylistTicket, SoundBackend, Track, TrackKind,
};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Display refresh interval (~60 Hz)
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// How long quitting waits for the last sound to fade out
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

enum ServerReply {
    Like { ticket: LikeTicket, succeeded: bool },
    LikedStatus { track_id: String, liked: bool },
    PlaylistAdd { ticket: PlaylistTicket, succeeded: bool },
    Playlists(Vec<PlaylistRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct PlayerOptions {
    pub playback: PlaybackConfig,
    pub save_audiobook_progress: bool,
}

pub struct Player {
    session: PlaybackSession,
    pulse: FramePulse,
    runtime: Handle,
    library: Option<LibraryClientHandle>,
    replies_tx: Sender<ServerReply>,
    replies_rx: Receiver<ServerReply>,
    save_progress: bool,
    /// Last known position inside an audiobook, saved when leaving it
    audiobook_position: Option<(String, Duration)>,
    last_status: String,
}

impl Player {
    pub fn new(
        backend: impl SoundBackend + 'static,
        options: &PlayerOptions,
        runtime: Handle,
        library: Option<LibraryClientHandle>,
    ) -> Self {
        let pulse = FramePulse::new();
        let session = PlaybackSession::builder(backend, pulse.clone())
            .config(options.playback.clone())
            .build();
        let (replies_tx, replies_rx) = unbounded();

        Self {
            session,
            pulse,
            runtime,
            library,
            replies_tx,
            replies_rx,
            save_progress: options.save_audiobook_progress,
            audiobook_position: None,
            last_status: String::new(),
        }
    }

    /// Play `tracks` until the user quits or stdin closes
    pub fn run(mut self, tracks: Vec<Track>, start_index: usize) -> anyhow::Result<()> {
        let lines = spawn_stdin_reader().context("Failed to read from stdin")?;
        let ticker = tick(FRAME_INTERVAL);
        let replies = self.replies_rx.clone();

        println!("{} tracks queued. Type h for help.", tracks.len());
        self.session.set_queue(tracks, start_index)?;
        self.after_input();

        loop {
            select! {
                recv(lines) -> line => {
                    let Ok(line) = line else {
                        debug!("stdin closed");
                        break;
                    };
                    if self.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                recv(ticker) -> _ => self.on_tick(),
                recv(replies) -> reply => {
                    if let Ok(reply) = reply {
                        self.apply_reply(reply);
                    }
                }
            }
            self.after_input();
        }

        self.shutdown();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.print_line(&format!("{} (h for help)", e));
                return Flow::Continue;
            }
        };

        let result = match command {
            Command::TogglePlay => self.session.toggle_play_pause(),
            Command::Next => self.session.next(),
            Command::Previous => self.session.previous(),
            Command::Seek(position) => self.session.seek_to(position),
            Command::SeekFraction(fraction) => self.session.seek_to_fraction(fraction),
            Command::Volume(level) => self.session.set_volume(level),
            Command::Mute => self.session.toggle_mute(),
            Command::Retry => self.session.retry(),
            Command::Like => {
                self.request_like();
                Ok(())
            }
            Command::ListPlaylists => {
                self.list_playlists();
                Ok(())
            }
            Command::AddToPlaylist(playlist_id) => {
                self.request_playlist_add(&playlist_id);
                Ok(())
            }
            Command::Help => {
                self.print_line(HELP);
                Ok(())
            }
            Command::Quit => return Flow::Quit,
        };

        if let Err(e) = result {
            self.print_line(&e.to_string());
        }
        Flow::Continue
    }

    fn on_tick(&mut self) {
        self.session.pump();
        if let Some(frame) = self.pulse.take_due() {
            self.session.on_frame(frame);
        }

        if let Some(track) = self.session.current_track() {
            let listening = matches!(
                self.session.state(),
                PlaybackState::Playing | PlaybackState::Paused
            );
            if track.kind == TrackKind::Audiobook && listening {
                self.audiobook_position = Some((track.id.clone(), self.session.position()));
            }
        }
    }

    fn apply_reply(&mut self, reply: ServerReply) {
        match reply {
            ServerReply::Like { ticket, succeeded } => {
                if !succeeded {
                    self.print_line("Could not update liked status");
                }
                self.session.complete_like(&ticket, succeeded);
            }
            ServerReply::LikedStatus { track_id, liked } => {
                self.session.set_liked_status(&track_id, liked);
            }
            ServerReply::PlaylistAdd { ticket, succeeded } => {
                if !succeeded {
                    self.print_line(&format!("Could not add to playlist {}", ticket.playlist_id));
                }
                self.session.complete_playlist_add(&ticket, succeeded);
            }
            ServerReply::Playlists(playlists) => {
                self.print_line(&describe_playlists(&playlists));
            }
        }
    }

    fn after_input(&mut self) {
        for event in self.session.drain_events() {
            if let PlaybackEvent::TrackChanged { .. } = &event {
                self.on_track_changed();
            }
            if let Some(line) = describe_event(&event, &self.session) {
                self.print_line(&line);
            }
        }
        self.render_status();
    }

    fn on_track_changed(&mut self) {
        self.save_audiobook_progress(false);

        let Some(library) = self.library.clone() else {
            return;
        };
        let Some(track) = self.session.current_track() else {
            return;
        };
        if track.kind != TrackKind::Song {
            return;
        }

        let track_id = track.id.clone();
        let tx = self.replies_tx.clone();
        self.runtime.spawn(async move {
            let result = library.client().is_liked(&track_id).await;
            match result {
                Ok(liked) => {
                    let _ = tx.send(ServerReply::LikedStatus { track_id, liked });
                }
                Err(e) => warn!(track_id = %track_id, error = %e, "liked status unavailable"),
            }
        });
    }

    fn request_like(&mut self) {
        let Some(library) = self.library.clone() else {
            self.print_line("Liking needs a server login");
            return;
        };
        if self
            .session
            .current_track()
            .is_some_and(|t| t.kind != TrackKind::Song)
        {
            self.print_line("Only songs can be liked");
            return;
        }
        let Some(ticket) = self.session.request_like_toggle() else {
            return;
        };

        let tx = self.replies_tx.clone();
        self.runtime.spawn(async move {
            let result = library.client().set_liked(&ticket.track_id, ticket.like).await;
            if let Err(e) = &result {
                warn!(track_id = %ticket.track_id, error = %e, "like request failed");
            }
            let _ = tx.send(ServerReply::Like {
                succeeded: result.is_ok(),
                ticket,
            });
        });
    }

    fn list_playlists(&mut self) {
        let Some(library) = self.library.clone() else {
            self.print_line("Playlists need a server login");
            return;
        };

        let tx = self.replies_tx.clone();
        self.runtime.spawn(async move {
            match library.client().my_playlists().await {
                Ok(playlists) => {
                    let _ = tx.send(ServerReply::Playlists(playlists));
                }
                Err(e) => warn!(error = %e, "playlists unavailable"),
            }
        });
    }

    fn request_playlist_add(&mut self, playlist_id: &str) {
        let Some(library) = self.library.clone() else {
            self.print_line("Playlists need a server login");
            return;
        };
        if self
            .session
            .current_track()
            .is_some_and(|t| t.kind != TrackKind::Song)
        {
            self.print_line("Only songs can be added to playlists");
            return;
        }
        let Some(ticket) = self.session.request_playlist_add(playlist_id) else {
            return;
        };

        let tx = self.replies_tx.clone();
        self.runtime.spawn(async move {
            let result = library
                .client()
                .add_to_playlist(&ticket.playlist_id, &ticket.track_id)
                .await;
            if let Err(e) = &result {
                warn!(
                    track_id = %ticket.track_id,
                    playlist_id = %ticket.playlist_id,
                    error = %e,
                    "add to playlist failed"
                );
            }
            let _ = tx.send(ServerReply::PlaylistAdd {
                succeeded: result.is_ok(),
                ticket,
            });
        });
    }

    /// Send the last audiobook position; `wait` blocks until the server answers
    fn save_audiobook_progress(&mut self, wait: bool) {
        let Some((book_id, position)) = self.audiobook_position.take() else {
            return;
        };
        let Some(library) = self.library.clone() else {
            return;
        };
        if !self.save_progress {
            return;
        }

        let task = async move {
            if let Err(e) = library
                .client()
                .update_audiobook_progress(&book_id, position)
                .await
            {
                warn!(audiobook_id = %book_id, error = %e, "audiobook progress not saved");
            }
        };
        if wait {
            self.runtime.block_on(task);
        } else {
            self.runtime.spawn(task);
        }
    }

    fn shutdown(&mut self) {
        self.session.release();
        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while self.session.has_live_sound() && Instant::now() < deadline {
            thread::sleep(FRAME_INTERVAL);
            self.on_tick();
        }
        self.save_audiobook_progress(true);
        println!();
    }

    fn render_status(&mut self) {
        let line = StatusLine::capture(&self.session).render();
        if line != self.last_status {
            print!("\r\x1b[2K{}", line);
            let _ = io::stdout().flush();
            self.last_status = line;
        }
    }

    fn print_line(&mut self, text: &str) {
        println!("\r\x1b[2K{}", text);
        // Forces the status line to be drawn again below the message
        self.last_status.clear();
    }
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("encore-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}
