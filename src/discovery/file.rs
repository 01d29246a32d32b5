//! File-backed discovery for static deployments.
//!
//! The servers file is TOML:
//! ```toml
//! [[servers]]
//! target = "https://de.api.example.com"
//! country_code = "de"
//!
//! [[servers]]
//! target = "https://api.example.com"
//! default = true
//! ```
//!
//! `watch` is driven by filesystem events from `notify`.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::discovery::{DiscoveryError, DiscoveryFuture, DiscoverySource, ServerDefinition, WatchBatch};

#[derive(Debug, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: Vec<ServerDefinition>,
}

/// Parse the contents of a servers file.
pub fn parse_servers(content: &str) -> Result<Vec<ServerDefinition>, DiscoveryError> {
    let file: ServersFile =
        toml::from_str(content).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

    Ok(file
        .servers
        .into_iter()
        .map(|s| ServerDefinition::new(s.target, s.country_code, s.is_default))
        .collect())
}

/// Discovery source reading a TOML servers file.
pub struct FileSource {
    path: PathBuf,
    changed: Arc<Notify>,
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileSource {
    /// A source that only supports `poll`; `watch` never reports changes.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            changed: Arc::new(Notify::new()),
            _watcher: Mutex::new(None),
        }
    }

    /// A source that also reports file modifications through `watch`.
    pub fn watching(path: &Path) -> Result<Self, DiscoveryError> {
        let source = Self::new(path);
        let changed = source.changed.clone();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && ours {
                        tracing::debug!(paths = ?event.paths, "Servers file change detected");
                        changed.notify_one();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        // Watch the directory so editors that replace the file are still seen.
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        tracing::info!(path = ?source.path, "Servers file watcher started");
        Ok(Self {
            _watcher: Mutex::new(Some(watcher)),
            ..source
        })
    }

    async fn read(&self) -> Result<Vec<ServerDefinition>, DiscoveryError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        parse_servers(&content)
    }
}

impl DiscoverySource for FileSource {
    fn poll(&self) -> DiscoveryFuture<'_, Vec<ServerDefinition>> {
        Box::pin(self.read())
    }

    fn watch(&self, last_index: u64) -> DiscoveryFuture<'_, WatchBatch> {
        Box::pin(async move {
            if last_index > 0 {
                self.changed.notified().await;
            }
            let servers = self.read().await?;
            Ok(WatchBatch {
                index: last_index + 1,
                servers,
            })
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("region-router-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_servers() {
        let servers = parse_servers(
            r#"
            [[servers]]
            target = "https://de.api.example.com"
            country_code = "DE"

            [[servers]]
            target = "https://api.example.com"
            default = true
            "#,
        )
        .unwrap();

        assert_eq!(
            servers,
            vec![
                ServerDefinition::new("https://de.api.example.com", "de", false),
                ServerDefinition::new("https://api.example.com", "", true),
            ]
        );
    }

    #[test]
    fn test_parse_servers_rejects_garbage() {
        let err = parse_servers("[[servers]]\ncountry_code = 5").unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_poll_reads_file() {
        let path = temp_file("poll", "[[servers]]\ntarget = \"https://fr.x.com\"\ncountry_code = \"fr\"\n");
        let source = FileSource::new(&path);

        let servers = source.poll().await.unwrap();
        assert_eq!(servers, vec![ServerDefinition::new("https://fr.x.com", "fr", false)]);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_poll_missing_file_is_io_error() {
        let source = FileSource::new(Path::new("/nonexistent/region-router/servers.toml"));
        assert!(matches!(source.poll().await, Err(DiscoveryError::Io(_))));
    }

    #[tokio::test]
    async fn test_watch_waits_for_change() {
        let path = temp_file("watch", "[[servers]]\ntarget = \"https://de.x.com\"\ncountry_code = \"de\"\n");
        let source = FileSource::new(&path);

        let first = source.watch(0).await.unwrap();
        assert_eq!(first.index, 1);

        std::fs::write(&path, "[[servers]]\ntarget = \"https://at.x.com\"\ncountry_code = \"at\"\n").unwrap();
        source.changed.notify_one();

        let second = source.watch(first.index).await.unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.servers[0].country_code, "at");

        let _ = std::fs::remove_file(path);
    }
}
