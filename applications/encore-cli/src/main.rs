/// Encore - terminal music player
use anyhow::Context;
use clap::{Parser, Subcommand};
use encore_audio_desktop::DesktopBackend;
use encore_cli::{
    config::AppConfig,
    player::{Player, PlayerOptions},
    source::TrackSource,
};
use encore_client::{EncoreClient, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Encore terminal music player", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./encore.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct PlayArgs {
    /// Queue index to start from
    #[arg(short, long, default_value_t = 0)]
    start: usize,

    /// Initial volume (0.0 - 1.0), overrides the configuration
    #[arg(short, long)]
    volume: Option<f32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play local audio files
    PlayFiles {
        /// Files to queue, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play your uploaded songs
    PlayMine {
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play trending songs
    PlayTrending {
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play your liked songs
    PlayLiked {
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play songs whose name matches
    PlaySearch {
        /// Song name to search for
        name: String,
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play a playlist
    PlayPlaylist {
        /// Playlist id
        id: String,
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Play audiobooks, one queue entry per chapter
    PlayAudiobooks {
        #[command(flatten)]
        args: PlayArgs,
    },
    /// Log in and print the token to store in the configuration
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password
        #[arg(short, long, env = "ENCORE_PASSWORD")]
        password: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the status line
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let (source, args) = match cli.command {
        Commands::Login { email, password } => {
            return runtime.block_on(login(&config, &email, &password));
        }
        Commands::PlayFiles { paths, args } => (TrackSource::Files(paths), args),
        Commands::PlayMine { args } => (TrackSource::MySongs, args),
        Commands::PlayTrending { args } => (TrackSource::Trending, args),
        Commands::PlayLiked { args } => (TrackSource::Liked, args),
        Commands::PlaySearch { name, args } => (TrackSource::Search(name), args),
        Commands::PlayPlaylist { id, args } => (TrackSource::Playlist(id), args),
        Commands::PlayAudiobooks { args } => (TrackSource::Audiobooks, args),
    };

    play(&config, &runtime, source, &args)
}

fn play(
    config: &AppConfig,
    runtime: &tokio::runtime::Runtime,
    source: TrackSource,
    args: &PlayArgs,
) -> anyhow::Result<()> {
    let library = match &config.server.token {
        Some(token) if source.needs_server() => {
            let client = EncoreClient::new(ServerConfig::with_token(&config.server.url, token))?;
            Some(runtime.block_on(client.library())?)
        }
        _ => None,
    };

    let tracks = runtime.block_on(source.fetch(library.as_ref()))?;
    tracing::info!("Queue ready: {} tracks", tracks.len());

    let mut playback = config.playback.clone();
    if let Some(volume) = args.volume {
        anyhow::ensure!(
            (0.0..=1.0).contains(&volume),
            "Volume must be between 0.0 and 1.0"
        );
        playback.volume = volume;
    }

    let backend = DesktopBackend::new(config.output).context("Failed to open audio output")?;
    tracing::info!("Audio output at {} Hz", backend.sample_rate());

    let options = PlayerOptions {
        playback,
        save_audiobook_progress: config.server.save_audiobook_progress,
    };
    Player::new(backend, &options, runtime.handle().clone(), library).run(tracks, args.start)
}

async fn login(config: &AppConfig, email: &str, password: &str) -> anyhow::Result<()> {
    let client = EncoreClient::new(ServerConfig::new(&config.server.url))?;
    let login = client.login(email, password).await?;

    println!("Logged in as {} ({})", login.username, login.email);
    println!();
    println!("Add this to encore.toml:");
    println!("[server]");
    println!("token = \"{}\"", login.token);
    println!();
    println!("or export ENCORE_SERVER__TOKEN={}", login.token);

    Ok(())
}
