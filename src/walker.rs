//! Startup discovery of indexable documents.

use std::path::{Path, PathBuf};

use globset::GlobSet;

use crate::error::Result;

/// File extensions eligible for indexing.
const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt"];

/// A document found under the root directory.
///
/// The root-relative path doubles as the document id everywhere in the
/// engine, so two scans of the same tree always agree on identity.
#[derive(Debug, Clone)]
pub struct DiscoveredDoc {
    /// Document id: the path relative to the root, as a string.
    pub id: String,
    /// Resolved absolute path for reading the content.
    pub path: PathBuf,
}

/// Recursively discover eligible documents under `root`.
///
/// Hidden files and directories (names starting with `.`) are skipped, as
/// are symlinks that point back into the tree. When `include` is given, only
/// relative paths matching the set are returned. Results are sorted by id so
/// the index's document insertion order is deterministic.
pub fn discover_docs(
    root: &Path,
    include: Option<&GlobSet>,
) -> Result<Vec<DiscoveredDoc>> {
    let canonical_root = root.canonicalize()?;
    let mut docs = Vec::new();
    let mut pending = vec![canonical_root.clone()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
                continue;
            }

            let path = if file_type.is_symlink() {
                let Ok(resolved) = entry.path().canonicalize() else {
                    continue; // broken symlink
                };
                // A link back into the tree would be visited twice (or
                // forever, for a directory cycle).
                if resolved.starts_with(&canonical_root) {
                    continue;
                }
                if !resolved.is_file() {
                    continue;
                }
                resolved
            } else {
                entry.path()
            };

            if !is_supported(&path) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&canonical_root)
                .unwrap_or(&path)
                .to_path_buf();
            let id = relative.to_string_lossy().to_string();

            if let Some(set) = include
                && !set.is_match(&relative)
            {
                continue;
            }

            docs.push(DiscoveredDoc { id, path });
        }
    }

    docs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(docs)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

/// Whether a path seen by the filesystem watcher is worth reindexing.
pub fn is_indexable(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    !hidden && is_supported(path)
}

#[cfg(test)]
mod tests {
    use globset::{Glob, GlobSetBuilder};

    use super::*;

    #[test]
    fn discovers_supported_extensions_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("note.md"), "# hi").unwrap();
        std::fs::write(tmp.path().join("plain.txt"), "hi").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();

        let docs = discover_docs(tmp.path(), None).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["note.md", "plain.txt"]);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".draft.md"), "secret").unwrap();
        let hidden_dir = tmp.path().join(".git");
        std::fs::create_dir(&hidden_dir).unwrap();
        std::fs::write(hidden_dir.join("config.md"), "x").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "hello").unwrap();

        let docs = discover_docs(tmp.path(), None).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "visible.md");
    }

    #[test]
    fn recurses_and_sorts_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("deep.md"), "deep").unwrap();
        std::fs::write(tmp.path().join("z.md"), "z").unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();

        let ids: Vec<_> = discover_docs(tmp.path(), None)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a.md", "sub/deep.md", "z.md"]);
    }

    #[test]
    fn include_set_filters_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("keep.md"), "x").unwrap();
        std::fs::write(tmp.path().join("drop.txt"), "x").unwrap();

        let set = GlobSetBuilder::new()
            .add(Glob::new("*.md").unwrap())
            .build()
            .unwrap();
        let docs = discover_docs(tmp.path(), Some(&set)).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "keep.md");
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_docs(tmp.path(), None).unwrap().is_empty());
    }

    #[test]
    fn indexable_rejects_hidden_and_unsupported() {
        assert!(is_indexable(Path::new("/docs/readme.md")));
        assert!(is_indexable(Path::new("notes.txt")));
        assert!(!is_indexable(Path::new("/docs/.draft.md")));
        assert!(!is_indexable(Path::new("/docs/photo.png")));
    }
}
