//! Pluggable discovery sources.
//!
//! Discovery is one opaque call producing the current document: an HTTP
//! endpoint, an external fetch command, or a test stub. The refresh loop only
//! sees the `InstrumentSource` capability.

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::snapshot::{DiscoveryDocument, DiscoverySnapshot};
use crate::window::select_instruments;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for a discovery fetch (HTTP request or subprocess).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One discovery cycle: produce the current tracked-instrument snapshot, or
/// fail and let the caller keep the previous routing generation.
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    async fn fetch(&self) -> DiscoveryResult<DiscoverySnapshot>;
}

fn snapshot_from(doc: &DiscoveryDocument) -> DiscoverySnapshot {
    let fetched_at = Utc::now();
    DiscoverySnapshot {
        instruments: select_instruments(doc, fetched_at),
        fetched_at,
    }
}

/// Discovery over HTTP: GET one JSON document.
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> DiscoveryResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl InstrumentSource for HttpSource {
    async fn fetch(&self) -> DiscoveryResult<DiscoverySnapshot> {
        debug!(url = %self.url, "Fetching discovery document");
        let doc: DiscoveryDocument = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot_from(&doc))
    }
}

/// Discovery via an external fetch command that writes a JSON document to a
/// known path. The command is killed if it exceeds the timeout; a zombie
/// fetcher must not stall the refresh loop.
pub struct CommandSource {
    command: String,
    output_path: PathBuf,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(command: impl Into<String>, output_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            output_path: output_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl InstrumentSource for CommandSource {
    async fn fetch(&self) -> DiscoveryResult<DiscoverySnapshot> {
        debug!(command = %self.command, "Running discovery fetch command");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .spawn()?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                child.kill().await?;
                return Err(DiscoveryError::CommandTimeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };
        if !status.success() {
            return Err(DiscoveryError::CommandFailed {
                status: status.code().unwrap_or(-1),
            });
        }

        if !self.output_path.exists() {
            return Err(DiscoveryError::MissingOutput(self.output_path.clone()));
        }
        let raw = tokio::fs::read(&self.output_path).await?;
        let doc: DiscoveryDocument = serde_json::from_slice(&raw)?;
        Ok(snapshot_from(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_document(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("discovery.json");
        let mut file = std::fs::File::create(&path).unwrap();
        // End date far in the future so selection keeps the event.
        file.write_all(
            br#"{"markets": {"BTC": {"1h": {"events": [
                {"event_slug": "btc-1h", "end_date": "2096-01-01T00:00:00Z",
                 "tokens": {"yes": {"token_id": "1"}, "no": {"token_id": "2"}}}
            ]}}}}"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_command_source_reads_output_file() {
        let dir = TempDir::new().unwrap();
        let path = write_document(&dir);
        let source = CommandSource::new("true", &path, Duration::from_secs(5));

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.instruments.len(), 1);
        assert_eq!(snapshot.instruments[0].id.slug, "btc-1h");
    }

    #[tokio::test]
    async fn test_command_source_kills_on_timeout() {
        let dir = TempDir::new().unwrap();
        let path = write_document(&dir);
        let source = CommandSource::new("sleep 30", &path, Duration::from_millis(100));

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn test_command_source_nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_document(&dir);
        let source = CommandSource::new("exit 3", &path, Duration::from_secs(5));

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::CommandFailed { status: 3 }));
    }

    #[tokio::test]
    async fn test_command_source_missing_output_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never-written.json");
        let source = CommandSource::new("true", &path, Duration::from_secs(5));

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_command_source_malformed_output_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("discovery.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let source = CommandSource::new("true", &path, Duration::from_secs(5));

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Json(_)));
    }
}
