use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Last-notified post id per handle, kept as a JSON object on disk.
#[derive(Debug)]
pub struct SeenState {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SeenState {
    /// A missing file is an empty mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse seen state {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read seen state {}", path.display()))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, handle: &str) -> Option<&str> {
        self.entries.get(handle).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Record `post_id` and persist before returning.
    pub fn set(&mut self, handle: &str, post_id: &str) -> Result<()> {
        let previous = self
            .entries
            .insert(handle.to_string(), post_id.to_string());
        if let Err(e) = self.persist() {
            match previous {
                Some(prev) => self.entries.insert(handle.to_string(), prev),
                None => self.entries.remove(handle),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the original.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace seen state {}", self.path.display()))
    }
}
