use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::header::ACCEPT;

use taskgraph_core::config::SourceConfig;
use taskgraph_core::{records_from_json, records_from_slice, GraphError, Result, TaskRecord};

/// Future returned by [`SnapshotSource::fetch`].
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TaskRecord>>> + Send + 'a>>;

/// Something that can produce the latest task snapshot.
///
/// Implementations report every transport or decoding problem as
/// [`GraphError::FetchFailure`].
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetch the current snapshot.
    fn fetch(&self) -> SourceFuture<'_>;

    /// Short description used in logs.
    fn describe(&self) -> String;
}

/// Fetches snapshots from an HTTP endpoint returning JSON.
#[derive(Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpSnapshotSource {
    /// Create a source with a default HTTP client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a source reusing an existing client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_records(&self) -> Result<Vec<TaskRecord>> {
        let mut request = self.client.get(&self.url).header(ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            GraphError::FetchFailure(format!("request to {} failed: {}", self.url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::FetchFailure(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            GraphError::FetchFailure(format!("invalid JSON from {}: {}", self.url, e))
        })?;

        records_from_json(payload).map_err(|e| GraphError::FetchFailure(e.to_string()))
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch(&self) -> SourceFuture<'_> {
        Box::pin(self.fetch_records())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads snapshots from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_records(&self) -> Result<Vec<TaskRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            GraphError::FetchFailure(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        records_from_slice(&bytes).map_err(|e| GraphError::FetchFailure(e.to_string()))
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn fetch(&self) -> SourceFuture<'_> {
        Box::pin(self.read_records())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Build the source described by the `[source]` config section.
///
/// Returns `None` when neither a URL nor a file is configured.
pub fn source_from_config(config: &SourceConfig) -> Option<Arc<dyn SnapshotSource>> {
    if let Some(url) = &config.url {
        let mut source = HttpSnapshotSource::new(url.clone());
        if let Some(token) = &config.bearer_token {
            source = source.with_bearer_token(token.clone());
        }
        return Some(Arc::new(source));
    }

    config
        .file
        .as_ref()
        .map(|path| Arc::new(FileSnapshotSource::new(path.clone())) as Arc<dyn SnapshotSource>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_reads_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"a","state":"SUCCESS"}},{{"id":"b","state":"PENDING","dependsOn":["a"]}}]"#
        )
        .unwrap();

        let source = FileSnapshotSource::new(file.path());
        let records = source.fetch().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].depends_on, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSnapshotSource::new("/nonexistent/snapshot.json");
        let err = source.fetch().await.unwrap_err();
        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn test_file_source_bad_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "42").unwrap();

        let err = FileSnapshotSource::new(file.path())
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::FetchFailure(_)));
    }

    #[tokio::test]
    async fn test_http_source_connection_refused() {
        // Port 9 (discard) is not served on test hosts.
        let source = HttpSnapshotSource::new("http://127.0.0.1:9/tasks");
        let err = source.fetch().await.unwrap_err();

        match err {
            GraphError::FetchFailure(message) => assert!(message.contains("127.0.0.1:9")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_source_from_config_prefers_url() {
        let config = SourceConfig {
            url: Some("http://localhost:5555/api/tasks".to_string()),
            file: Some(PathBuf::from("snapshot.json")),
            bearer_token: None,
        };

        let source = source_from_config(&config).unwrap();
        assert_eq!(source.describe(), "http://localhost:5555/api/tasks");
    }

    #[test]
    fn test_source_from_config_file_and_none() {
        let config = SourceConfig {
            file: Some(PathBuf::from("snapshot.json")),
            ..Default::default()
        };
        assert_eq!(source_from_config(&config).unwrap().describe(), "snapshot.json");

        assert!(source_from_config(&SourceConfig::default()).is_none());
    }
}
