// src/dag/glob.rs

//! Schedule-time expansion of glob prerequisites.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::fs::FileSystem;

/// Characters that start a glob construct in a path component.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Compile a pattern; `*` does not cross `/`, `**` does.
pub fn compile(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?;
    Ok(glob.compile_matcher())
}

/// Longest leading run of literal components, used as the walk root.
fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<&str> = pattern.split('/').collect();
    // The last component is always the file part of the pattern.
    for comp in &components[..components.len().saturating_sub(1)] {
        if comp.contains(GLOB_META) {
            break;
        }
        if comp.is_empty() {
            base.push("/");
        } else {
            base.push(comp);
        }
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

fn match_key(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    s.strip_prefix("./").map(str::to_string).unwrap_or(s)
}

/// All files currently matching `pattern`, sorted.
///
/// A missing walk root simply yields no matches: aggregation rules may run
/// before any experiment has produced output. Symlinked files match like
/// regular files.
pub fn expand(fs: &dyn FileSystem, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile(pattern)?;
    let root = literal_base(pattern);

    if !fs.is_dir(&root) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![root];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                // Symlinked directories are not descended into; they may
                // point back at an ancestor.
                if !fs.is_symlink(&path) {
                    stack.push(path);
                }
            } else if fs.is_file(&path) && matcher.is_match(match_key(&path)) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn literal_base_stops_at_first_meta_component() {
        assert_eq!(literal_base("exp/rphast/*.json"), PathBuf::from("exp/rphast"));
        assert_eq!(
            literal_base("data/typical/**/**/*.csv"),
            PathBuf::from("data/typical")
        );
        assert_eq!(literal_base("*.json"), PathBuf::from("."));
    }

    #[test]
    fn expand_matches_only_direct_children_for_single_star() {
        let fs = MockFileSystem::new();
        fs.add_file("exp/rphast/a.json", "{}");
        fs.add_file("exp/rphast/b.json", "{}");
        fs.add_file("exp/rphast/notes.txt", "");
        fs.add_file("exp/rphast/nested/c.json", "{}");

        let found = expand(&fs, "exp/rphast/*.json").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("exp/rphast/a.json"),
                PathBuf::from("exp/rphast/b.json")
            ]
        );
    }

    #[test]
    fn expand_does_not_follow_directory_symlinks() {
        let fs = MockFileSystem::new();
        fs.add_file("exp/a/x.json", "{}");
        fs.symlink(Path::new(".."), Path::new("exp/a/back")).unwrap();
        fs.symlink(Path::new("../.."), Path::new("exp/a/up")).unwrap();
        fs.symlink(Path::new("x.json"), Path::new("exp/a/alias.json")).unwrap();

        let found = expand(&fs, "exp/**/*.json").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("exp/a/alias.json"),
                PathBuf::from("exp/a/x.json")
            ]
        );
    }

    #[test]
    fn expand_missing_root_is_empty() {
        let fs = MockFileSystem::new();
        assert!(expand(&fs, "exp/none/*.json").unwrap().is_empty());
    }
}
