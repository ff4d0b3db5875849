// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, mtime: u64 },
    Dir { children: Vec<String>, mtime: u64 },
    Symlink { target: PathBuf },
}

/// In-memory filesystem with a logical clock.
///
/// Every mutation advances the clock by one tick, so a file written later
/// always has a strictly newer mtime than one written earlier.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<AtomicU64>,
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) =>
            {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Some(PathBuf::from(".")),
        Some(p) => Some(p.to_path_buf()),
        None => None,
    }
}

/// Relative symlink targets resolve against the link's own directory.
fn link_destination(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return normalize(target);
    }
    match parent_of(link) {
        Some(parent) => normalize(&parent.join(target)),
        None => normalize(target),
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(
            PathBuf::from("."),
            MockEntry::Dir {
                children: Vec::new(),
                mtime: 0,
            },
        );

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(AtomicU64::new(1)),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mtime = self.tick();
        let mut files = self.files.lock().unwrap();
        self.insert_entry(
            &mut files,
            &path,
            MockEntry::File {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Bump the mtime of an existing file (like `touch`).
    pub fn touch(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let now = self.tick();
        let touched = {
            let mut files = self.files.lock().unwrap();
            match files.get_mut(&path) {
                Some(MockEntry::File { mtime, .. }) | Some(MockEntry::Dir { mtime, .. }) => {
                    *mtime = now;
                    true
                }
                _ => false,
            }
        };
        if !touched {
            self.add_file(&path, Vec::new());
        }
    }

    /// Remove a file or symlink.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut files = self.files.lock().unwrap();
        files.remove(&path);
        if let Some(parent) = parent_of(&path) {
            if let Some(MockEntry::Dir { children, .. }) = files.get_mut(&parent) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    children.retain(|c| c != name);
                }
            }
        }
    }

    /// Raw logical mtime, for assertions.
    pub fn mtime_of(&self, path: impl AsRef<Path>) -> Option<u64> {
        let files = self.files.lock().unwrap();
        Self::resolve_mtime(&files, &normalize(path.as_ref()), 0)
    }

    /// Entry at `path` after following symlinks.
    fn follow<'f>(
        files: &'f HashMap<PathBuf, MockEntry>,
        path: &Path,
        depth: usize,
    ) -> Option<&'f MockEntry> {
        if depth > 16 {
            return None;
        }
        match files.get(path)? {
            MockEntry::Symlink { target } => {
                Self::follow(files, &link_destination(path, target), depth + 1)
            }
            entry => Some(entry),
        }
    }

    fn resolve_mtime(files: &HashMap<PathBuf, MockEntry>, path: &Path, depth: usize) -> Option<u64> {
        if depth > 16 {
            return None;
        }
        match files.get(path)? {
            MockEntry::File { mtime, .. } | MockEntry::Dir { mtime, .. } => Some(*mtime),
            MockEntry::Symlink { target } => {
                Self::resolve_mtime(files, &link_destination(path, target), depth + 1)
            }
        }
    }

    fn insert_entry(&self, files: &mut HashMap<PathBuf, MockEntry>, path: &Path, entry: MockEntry) {
        files.insert(path.to_path_buf(), entry);
        if let Some(parent) = parent_of(path) {
            if parent != path {
                self.ensure_dir_entry(files, &parent);
                Self::link_child(files, &parent, path);
            }
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, path: &Path) {
        if let Some(MockEntry::Dir { children, .. }) = files.get_mut(parent) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(&self, files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        let mtime = self.tick();
        files.insert(
            path.to_path_buf(),
            MockEntry::Dir {
                children: Vec::new(),
                mtime,
            },
        );
        if let Some(parent) = parent_of(path) {
            if parent != path {
                self.ensure_dir_entry(files, &parent);
                Self::link_child(files, &parent, path);
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entry = {
            let files = self.files.lock().unwrap();
            files.get(&normalize(path)).cloned()
        };
        match entry {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Symlink { target }) => {
                self.read_to_string(&link_destination(&normalize(path), &target))
            }
            Some(MockEntry::Dir { .. }) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.mtime_of(path).is_some()
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(
            Self::follow(&files, &normalize(path), 0),
            Some(MockEntry::File { .. })
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(
            Self::follow(&files, &normalize(path), 0),
            Some(MockEntry::Dir { .. })
        )
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(&normalize(path)), Some(MockEntry::Symlink { .. }))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match self.files.lock().unwrap().get(&normalize(path)) {
            Some(MockEntry::File { .. }) | Some(MockEntry::Symlink { .. }) => {}
            Some(MockEntry::Dir { .. }) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        }
        self.remove(path);
        Ok(())
    }

    fn modified(&self, path: &Path) -> Result<Option<SystemTime>> {
        Ok(self
            .mtime_of(path)
            .map(|ticks| UNIX_EPOCH + Duration::from_secs(ticks)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut files = self.files.lock().unwrap();
        match files.get(&path) {
            Some(MockEntry::Dir { .. }) => Ok(()),
            Some(_) => Err(anyhow!("Not a directory: {:?}", path)),
            None => {
                self.ensure_dir_entry(&mut files, &path);
                Ok(())
            }
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let link = normalize(link);
        let mut files = self.files.lock().unwrap();
        if files.contains_key(&link) {
            return Err(anyhow!("File exists: {:?}", link));
        }
        self.insert_entry(
            &mut files,
            &link,
            MockEntry::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let key = normalize(path);
        let files = self.files.lock().unwrap();
        match Self::follow(&files, &key, 0) {
            Some(MockEntry::Dir { children, .. }) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
