//! Main Encore server client.

use crate::auth::AuthClient;
use crate::error::{ClientError, Result};
use crate::library::LibraryClient;
use crate::types::{LoginResponse, ServerConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Main client for interacting with an Encore server.
///
/// The client holds the bearer token and hands out [`LibraryClientHandle`]s
/// for catalog operations.
///
/// # Example
///
/// ```ignore
/// use encore_client::{EncoreClient, ServerConfig};
///
/// let client = EncoreClient::new(ServerConfig::new("https://music.example.com"))?;
/// client.login("me@example.com", "password").await?;
///
/// let library = client.library().await?;
/// let trending = library.client().trending().await?;
/// println!("{} trending songs", trending.len());
/// ```
pub struct EncoreClient {
    http: Client,
    config: Arc<RwLock<ServerConfig>>,
}

impl EncoreClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let normalized_config = ServerConfig {
            url,
            token: config.token,
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Encore/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(RwLock::new(normalized_config)),
        })
    }

    /// Get the server URL.
    pub async fn url(&self) -> String {
        self.config.read().await.url.clone()
    }

    /// Check if the client has a token.
    pub async fn is_authenticated(&self) -> bool {
        self.config.read().await.token.is_some()
    }

    /// Login with email and password.
    ///
    /// On success, the token is stored for subsequent requests.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let url = self.url().await;

        let response = AuthClient::new(&self.http, &url).login(email, password).await?;
        self.config.write().await.token = Some(response.token.clone());

        Ok(response)
    }

    /// Set the token directly (e.g., from stored configuration).
    pub async fn set_token(&self, token: impl Into<String>) {
        self.config.write().await.token = Some(token.into());
    }

    /// Get the current token.
    pub async fn token(&self) -> Option<String> {
        self.config.read().await.token.clone()
    }

    /// Clear the stored token.
    pub async fn logout(&self) {
        self.config.write().await.token = None;
        info!("Logged out");
    }

    /// Get a library client handle.
    ///
    /// Returns an error if not authenticated.
    pub async fn library(&self) -> Result<LibraryClientHandle> {
        let config = self.config.read().await;
        let token = config.token.clone().ok_or(ClientError::AuthRequired)?;
        let url = config.url.clone();
        drop(config);

        Ok(LibraryClientHandle {
            http: self.http.clone(),
            url,
            token,
        })
    }
}

/// Owned handle for library operations.
///
/// Cheap to clone and `Send`, so it can move into spawned tasks.
#[derive(Clone)]
pub struct LibraryClientHandle {
    http: Client,
    url: String,
    token: String,
}

impl LibraryClientHandle {
    /// Get the library client.
    pub fn client(&self) -> LibraryClient<'_> {
        LibraryClient::new(&self.http, &self.url, &self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(EncoreClient::new(ServerConfig::new("https://example.com")).is_ok());
        assert!(EncoreClient::new(ServerConfig::new("http://localhost:8080")).is_ok());

        assert!(EncoreClient::new(ServerConfig::new("")).is_err());
        assert!(EncoreClient::new(ServerConfig::new("not-a-url")).is_err());
        assert!(EncoreClient::new(ServerConfig::new("ftp://example.com")).is_err());
    }

    #[test]
    fn test_url_normalization() {
        let client = EncoreClient::new(ServerConfig::new("https://example.com/")).expect("valid url");

        let url = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.url());
        assert_eq!(url, "https://example.com");
    }
}
