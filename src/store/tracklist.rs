use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Added,
    AlreadyTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrackOutcome {
    Removed,
    NotTracked,
}

/// Watched handles in insertion order, one per line on disk.
#[derive(Debug)]
pub struct TrackList {
    path: PathBuf,
    handles: Vec<String>,
}

impl TrackList {
    /// A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        let handles = match std::fs::read_to_string(path) {
            Ok(content) => parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read tracklist {}", path.display()))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            handles,
        })
    }

    pub fn handles(&self) -> &[String] {
        &self.handles
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.handles.iter().any(|h| h == handle)
    }

    pub fn add(&mut self, handle: &str) -> Result<TrackOutcome> {
        if self.contains(handle) {
            return Ok(TrackOutcome::AlreadyTracked);
        }
        self.handles.push(handle.to_string());
        if let Err(e) = self.persist() {
            self.handles.pop();
            return Err(e);
        }
        Ok(TrackOutcome::Added)
    }

    pub fn remove(&mut self, handle: &str) -> Result<UntrackOutcome> {
        let Some(pos) = self.handles.iter().position(|h| h == handle) else {
            return Ok(UntrackOutcome::NotTracked);
        };
        let removed = self.handles.remove(pos);
        if let Err(e) = self.persist() {
            self.handles.insert(pos, removed);
            return Err(e);
        }
        Ok(UntrackOutcome::Removed)
    }

    /// Write to a sibling temp file, then rename over the tracklist.
    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("txt.tmp");
        std::fs::write(&tmp, self.handles.join("\n"))
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace tracklist {}", self.path.display()))
    }
}

fn parse(content: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !handles.iter().any(|h| h == line) {
            handles.push(line.to_string());
        }
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = TrackList::load(&dir.path().join("tracked_users.txt")).unwrap();
        assert!(list.handles().is_empty());
    }

    #[test]
    fn test_load_skips_blank_lines_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked_users.txt");
        std::fs::write(&path, "alice\n\n  bob \r\nalice\n").unwrap();
        let list = TrackList::load(&path).unwrap();
        assert_eq!(list.handles(), ["alice", "bob"]);
    }

    #[test]
    fn test_add_remove_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked_users.txt");
        let mut list = TrackList::load(&path).unwrap();

        assert_eq!(list.add("carol").unwrap(), TrackOutcome::Added);
        assert_eq!(list.add("alice").unwrap(), TrackOutcome::Added);
        assert_eq!(list.add("bob").unwrap(), TrackOutcome::Added);
        assert_eq!(list.remove("alice").unwrap(), UntrackOutcome::Removed);
        assert_eq!(list.add("alice").unwrap(), TrackOutcome::Added);

        assert_eq!(list.handles(), ["carol", "bob", "alice"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "carol\nbob\nalice");
        assert!(!dir.path().join("tracked_users.txt.tmp").exists());
    }

    #[test]
    fn test_idempotent_add_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked_users.txt");
        let mut list = TrackList::load(&path).unwrap();

        assert_eq!(list.add("bob").unwrap(), TrackOutcome::Added);
        assert_eq!(list.add("bob").unwrap(), TrackOutcome::AlreadyTracked);
        assert_eq!(list.remove("dave").unwrap(), UntrackOutcome::NotTracked);
        assert_eq!(list.handles(), ["bob"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "bob");
    }

    #[test]
    fn test_changes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked_users.txt");
        {
            let mut list = TrackList::load(&path).unwrap();
            list.add("alice").unwrap();
            list.add("bob").unwrap();
            list.remove("alice").unwrap();
        }
        let list = TrackList::load(&path).unwrap();
        assert_eq!(list.handles(), ["bob"]);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("tracked_users.txt");
        let mut list = TrackList::load(&path).unwrap();
        assert!(list.add("alice").is_err());
        assert!(list.handles().is_empty());
    }

    #[test]
    fn test_blocked_rename_leaves_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked_users.txt");
        std::fs::write(&path, "alice").unwrap();
        let mut list = TrackList::load(&path).unwrap();
        std::fs::create_dir(dir.path().join("tracked_users.txt.tmp")).unwrap();

        assert!(list.remove("alice").is_err());
        assert_eq!(list.handles(), ["alice"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alice");
    }
}
