use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::data::fetch::{discover_datasets, DirFetcher, Fetcher, HttpFetcher};

// ---------------------------------------------------------------------------
// Command-line configuration
// ---------------------------------------------------------------------------

/// Event-drop timeline viewer for dynamic community datasets.
#[derive(Debug, Clone, Parser)]
#[command(name = "community-drops", version, about)]
pub struct Args {
    /// Directory or http(s) base URL holding `<id>.{timeline,events,steps}.json`.
    #[arg(long, default_value = "data")]
    pub data: String,

    /// Available dataset ids (comma-separated). Discovered from the data
    /// directory when omitted; required for URL sources.
    #[arg(long, value_delimiter = ',')]
    pub datasets: Vec<String>,

    /// Dataset selected at startup (defaults to the first available).
    #[arg(long)]
    pub dataset: Option<String>,

    /// Initial minimum-steps threshold.
    #[arg(long, default_value = "1")]
    pub min_steps: String,

    /// Load the selected dataset as soon as the window opens.
    #[arg(long)]
    pub autoload: bool,
}

/// Where dataset resources are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Dir(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            DataSource::Url(raw.to_string())
        } else {
            DataSource::Dir(PathBuf::from(raw))
        }
    }

    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        match self {
            DataSource::Dir(dir) => Arc::new(DirFetcher::new(dir)),
            DataSource::Url(url) => Arc::new(HttpFetcher::new(url)),
        }
    }

    /// Dataset ids: the explicit list if given, otherwise whatever the
    /// directory contains.
    pub fn datasets(&self, explicit: &[String]) -> Result<Vec<String>> {
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }
        match self {
            DataSource::Dir(dir) if !dir.is_dir() => {
                log::warn!("Data directory {} does not exist", dir.display());
                Ok(Vec::new())
            }
            DataSource::Dir(dir) => discover_datasets(dir)
                .with_context(|| format!("listing datasets in {}", dir.display())),
            DataSource::Url(url) => bail!("--datasets is required when reading from {url}"),
        }
    }
}

/// Startup settings resolved from [`Args`].
#[derive(Debug, Clone)]
pub struct Config {
    pub source: DataSource,
    pub datasets: Vec<String>,
    pub selected: Option<String>,
    pub min_steps: String,
    pub autoload: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let source = DataSource::parse(&args.data);
        let datasets = source.datasets(&args.datasets)?;
        if datasets.is_empty() {
            log::warn!("No datasets found in {}", args.data);
        }

        let selected = match args.dataset {
            Some(id) if !datasets.contains(&id) => {
                bail!("unknown dataset '{id}' (available: {})", datasets.join(", "))
            }
            Some(id) => Some(id),
            None => datasets.first().cloned(),
        };

        Ok(Self {
            source,
            datasets,
            selected,
            min_steps: args.min_steps,
            autoload: args.autoload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_directories_are_told_apart() {
        assert_eq!(
            DataSource::parse("https://host/data"),
            DataSource::Url("https://host/data".into())
        );
        assert_eq!(DataSource::parse("./data"), DataSource::Dir("./data".into()));
    }

    #[test]
    fn explicit_dataset_list_wins() {
        let args = Args::parse_from(["community-drops", "--data", "http://h", "--datasets", "a,b", "--dataset", "b"]);
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.datasets, vec!["a", "b"]);
        assert_eq!(config.selected.as_deref(), Some("b"));
    }

    #[test]
    fn url_source_needs_dataset_list() {
        let args = Args::parse_from(["community-drops", "--data", "https://h"]);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn discovers_from_directory_and_rejects_unknown_selection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tw.timeline.json"), "[]").unwrap();
        let data = dir.path().to_str().unwrap();

        let config = Config::from_args(Args::parse_from(["community-drops", "--data", data])).unwrap();
        assert_eq!(config.selected.as_deref(), Some("tw"));
        assert_eq!(config.min_steps, "1");

        let args = Args::parse_from(["community-drops", "--data", data, "--dataset", "nope"]);
        assert!(Config::from_args(args).is_err());
    }
}
