//! Encore Server Client
//!
//! HTTP client library for the Encore music server API.
//!
//! # Features
//!
//! - **Authentication**: login with email/password, bearer token storage
//! - **Track lists**: own uploads, trending, liked, search, playlists, audiobooks
//! - **Likes**: liked-status lookup and like/unlike
//! - **Playlists and progress**: add a song to a playlist, save audiobook progress
//!
//! Server records map to [`encore_playback::Track`] so a list can be handed
//! straight to a playback session queue.
//!
//! # Example
//!
//! ```ignore
//! use encore_client::{EncoreClient, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EncoreClient::new(ServerConfig::new("https://music.example.com"))?;
//!     client.login("me@example.com", "password").await?;
//!
//!     let library = client.library().await?;
//!     let liked = library.client().liked_songs().await?;
//!     println!("{} liked songs", liked.len());
//!
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod error;
mod library;
mod types;

pub use client::{EncoreClient, LibraryClientHandle};
pub use error::{ClientError, Result};
pub use types::{
    ArtistRef, ArtistUser, AudiobookRecord, ChapterRecord, LoginRequest, LoginResponse,
    PlaylistRecord, ServerConfig, SongRecord,
};

pub use auth::AuthClient;
pub use library::LibraryClient;
