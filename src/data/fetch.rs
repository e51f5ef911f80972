use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Resource naming
// ---------------------------------------------------------------------------

/// The three resources every dataset is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Timeline,
    Events,
    Steps,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Timeline => "timeline",
            ResourceKind::Events => "events",
            ResourceKind::Steps => "steps",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<dataset>.<kind>.json`
pub fn resource_name(dataset: &str, kind: ResourceKind) -> String {
    format!("{dataset}.{kind}.json")
}

const TIMELINE_SUFFIX: &str = ".timeline.json";

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// Retrieves one dataset resource as decoded JSON, exactly as received.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, dataset: &str, kind: ResourceKind) -> Result<JsonValue, FetchError>;

    /// Where resources come from, for status and log lines.
    fn describe(&self) -> String;
}

fn decode(resource: String, bytes: &[u8]) -> Result<JsonValue, FetchError> {
    serde_json::from_slice(bytes).map_err(|source| FetchError::Decode { resource, source })
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Reads resources from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Fetcher for DirFetcher {
    async fn fetch(&self, dataset: &str, kind: ResourceKind) -> Result<JsonValue, FetchError> {
        let name = resource_name(dataset, kind);
        let path = self.root.join(&name);
        log::debug!("Reading {}", path.display());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::Io { path, source })?;
        decode(name, &bytes)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// List dataset ids in a directory by looking for `*.timeline.json` files.
pub fn discover_datasets(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut ids: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_str()?.to_string();
            let id = file_name.strip_suffix(TIMELINE_SUFFIX)?;
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect();
    ids.sort();
    Ok(ids)
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Fetches resources relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, dataset: &str, kind: ResourceKind) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource_name(dataset, kind)
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, dataset: &str, kind: ResourceKind) -> Result<JsonValue, FetchError> {
        let url = self.url_for(dataset, kind);
        log::debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        decode(resource_name(dataset, kind), &bytes)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_paths_follow_naming_convention() {
        assert_eq!(resource_name("brexit", ResourceKind::Timeline), "brexit.timeline.json");
        assert_eq!(resource_name("brexit", ResourceKind::Events), "brexit.events.json");
        assert_eq!(resource_name("brexit", ResourceKind::Steps), "brexit.steps.json");
    }

    #[test]
    fn http_urls_join_base_and_resource() {
        let fetcher = HttpFetcher::new("https://example.org/data/");
        assert_eq!(
            fetcher.url_for("x", ResourceKind::Steps),
            "https://example.org/data/x.steps.json"
        );
    }

    #[tokio::test]
    async fn dir_fetcher_reads_json_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("d.timeline.json"), r#"[{"name":"A","data":[]}]"#).unwrap();

        let fetcher = DirFetcher::new(dir.path());
        let value = fetcher.fetch("d", ResourceKind::Timeline).await.unwrap();
        assert_eq!(value, json!([{"name": "A", "data": []}]));
    }

    #[tokio::test]
    async fn dir_fetcher_reports_missing_file_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("d.events.json"), "{not json").unwrap();
        let fetcher = DirFetcher::new(dir.path());

        let missing = fetcher.fetch("d", ResourceKind::Steps).await.unwrap_err();
        assert!(matches!(missing, FetchError::Io { .. }));

        let garbled = fetcher.fetch("d", ResourceKind::Events).await.unwrap_err();
        assert!(matches!(garbled, FetchError::Decode { ref resource, .. } if resource == "d.events.json"));
    }

    #[test]
    fn discovers_datasets_from_timeline_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.timeline.json", "a.timeline.json", "a.events.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        assert_eq!(discover_datasets(dir.path()).unwrap(), vec!["a", "b"]);
    }
}
