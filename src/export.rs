use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::client::Client;
use crate::query::QueryParams;

/// Default snapshot filename, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "researchmap_data.json";

/// A researchmap resource exported into the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    PublishedPapers,
    ResearchProjects,
    Awards,
}

impl Endpoint {
    /// Every endpoint, in fetch order.
    pub const ALL: [Endpoint; 3] = [
        Endpoint::PublishedPapers,
        Endpoint::ResearchProjects,
        Endpoint::Awards,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::PublishedPapers => "published_papers",
            Endpoint::ResearchProjects => "research_projects",
            Endpoint::Awards => "awards",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exported document. Field order is the key order on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub published_papers: Vec<Value>,
    pub research_projects: Vec<Value>,
    pub awards: Vec<Value>,
}

impl Snapshot {
    pub fn items(&self, endpoint: Endpoint) -> &[Value] {
        match endpoint {
            Endpoint::PublishedPapers => &self.published_papers,
            Endpoint::ResearchProjects => &self.research_projects,
            Endpoint::Awards => &self.awards,
        }
    }

    fn items_mut(&mut self, endpoint: Endpoint) -> &mut Vec<Value> {
        match endpoint {
            Endpoint::PublishedPapers => &mut self.published_papers,
            Endpoint::ResearchProjects => &mut self.research_projects,
            Endpoint::Awards => &mut self.awards,
        }
    }

    /// Two-space indented JSON; non-ASCII text is written as-is.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize snapshot")
    }

    /// Reads a snapshot written by [`Snapshot::save`].
    pub fn load(source: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a researchmap snapshot", source.display()))
    }

    /// Writes the snapshot to `target`, replacing any existing file.
    pub fn save(&self, target: &Path) -> Result<PathBuf> {
        let text = self.to_json_pretty()?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        std::fs::write(target, text)
            .with_context(|| format!("failed to write {}", target.display()))?;
        Ok(target.to_path_buf())
    }
}

/// Fetches every endpoint in order and writes the snapshot.
///
/// The file is only written once all fetches succeed; the first failure aborts
/// the run and leaves `target` untouched.
pub fn export(client: &Client, overrides: &QueryParams, target: &Path) -> Result<Snapshot> {
    let snapshot = fetch_snapshot(client, overrides)?;
    let saved = snapshot.save(target)?;
    tracing::info!("saved: {}", saved.display());
    Ok(snapshot)
}

/// Fetches every endpoint in order without writing anything.
pub fn fetch_snapshot(client: &Client, overrides: &QueryParams) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    for endpoint in Endpoint::ALL {
        *snapshot.items_mut(endpoint) = client.fetch_items(endpoint, overrides)?;
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        Snapshot {
            published_papers: vec![json!({"paper_title": {"ja": "橋梁点検の自動化", "en": "Bridge inspection"}})],
            research_projects: vec![],
            awards: vec![json!({"award_name": {"ja": "論文賞"}, "award_date": "2021-05"})],
        }
    }

    #[test]
    fn keys_are_written_in_endpoint_order() {
        let text = sample().to_json_pretty().unwrap();
        let papers = text.find("\"published_papers\"").unwrap();
        let projects = text.find("\"research_projects\"").unwrap();
        let awards = text.find("\"awards\"").unwrap();
        assert!(papers < projects && projects < awards);
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let text = sample().to_json_pretty().unwrap();
        assert!(text.contains("橋梁点検の自動化"));
        assert!(!text.contains("\\u"));
        assert!(text.contains("\n  \"research_projects\": []"));
    }

    #[test]
    fn item_key_order_is_preserved() {
        let item: Value = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let snap = Snapshot {
            awards: vec![item],
            ..Snapshot::default()
        };
        let text = serde_json::to_string(&snap).unwrap();
        assert!(text.contains(r#"{"z":1,"a":2,"m":3}"#));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join(DEFAULT_OUTPUT);
        let snap = sample();
        snap.save(&target).unwrap();

        let back = Snapshot::load(&target).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn load_rejects_foreign_json() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("other.json");
        std::fs::write(&target, r#"{"papers": []}"#).unwrap();
        let err = Snapshot::load(&target).unwrap_err();
        assert!(err.to_string().contains("not a researchmap snapshot"));
    }

    #[test]
    fn endpoint_names() {
        let names: Vec<_> = Endpoint::ALL.iter().map(|e| e.to_string()).collect();
        assert_eq!(names, ["published_papers", "research_projects", "awards"]);
        assert_eq!(sample().items(Endpoint::Awards).len(), 1);
    }
}
