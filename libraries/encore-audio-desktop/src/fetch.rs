//! Reading track resources: local files or HTTP(S) downloads

use crate::error::{AudioError, Result};
use std::path::Path;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether `resource` is fetched over the network
pub fn is_remote(resource: &str) -> bool {
    resource.starts_with("http://") || resource.starts_with("https://")
}

/// Fetches resource bytes; owns a runtime for the async HTTP client
pub struct Fetcher {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher for use on the calling thread
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AudioError::DeviceError(format!("Failed to create runtime: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| AudioError::fetch("<client>", e))?;
        Ok(Self { runtime, client })
    }

    /// Read the whole resource
    pub fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        if is_remote(resource) {
            self.runtime.block_on(self.download(resource))
        } else {
            std::fs::read(Path::new(resource)).map_err(|e| AudioError::fetch(resource, e))
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AudioError::fetch(url, e))?;

        if !response.status().is_success() {
            return Err(AudioError::fetch(url, format!("HTTP error: {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://cdn.example/a.mp3"));
        assert!(is_remote("http://localhost:8080/a.mp3"));
        assert!(!is_remote("/music/a.mp3"));
        assert!(!is_remote("C:\\music\\a.mp3"));
    }

    #[test]
    fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"RIFF....").unwrap();

        let fetcher = Fetcher::new().unwrap();
        let bytes = fetcher.fetch(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bytes, b"RIFF....");
    }

    #[test]
    fn missing_file_names_the_resource() {
        let fetcher = Fetcher::new().unwrap();
        let err = fetcher.fetch("/no/such/track.mp3").unwrap_err();
        assert!(err.to_string().contains("/no/such/track.mp3"));
    }
}
