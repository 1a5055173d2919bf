//! File-operations collaborator.
//!
//! All paths are relative to a workspace root; anything that resolves
//! outside it is refused.

use anoncodex_error::{Error, ErrorKind, Result};
use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into by `search`
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Longest line excerpt kept in a search hit
const HIT_EXCERPT: usize = 200;

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub line: usize,
    pub text: String,
}

impl fmt::Display for SearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path, self.line, self.text)
    }
}

pub trait FileOperations: Send + Sync {
    fn read(&self, path: &str) -> Result<String>;

    /// Write `content`, returning `true` if the file did not exist before
    fn write(&self, path: &str, content: &str) -> Result<bool>;

    /// Lines matching `query`, at most `limit` of them
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Real filesystem confined to a root directory
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|e| {
            Error::from(e)
                .with_operation("files::new")
                .with_context("root", root.as_ref().display().to_string())
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root, refusing escapes both lexical and
    /// through symlinks
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path.trim());
        let relative = match candidate.strip_prefix(&self.root) {
            Ok(rest) => rest,
            Err(_) if candidate.is_absolute() => return Err(outside_root(path)),
            Err(_) => candidate,
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(outside_root(path));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside_root(path)),
            }
        }
        self.check_links(path, &resolved)?;
        Ok(resolved)
    }

    /// The deepest part of `resolved` that already exists must canonicalize
    /// inside the root. A dangling link counts as outside.
    fn check_links(&self, path: &str, resolved: &Path) -> Result<()> {
        let existing = resolved
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(self.root.as_path());
        match std::fs::canonicalize(existing) {
            Ok(real) if real.starts_with(&self.root) => Ok(()),
            Ok(real) => {
                debug!(path, real = %real.display(), "symlink leads outside the workspace");
                Err(outside_root(path))
            }
            Err(_) => Err(outside_root(path)),
        }
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn outside_root(path: &str) -> Error {
    Error::denied(format!("access to '{}' outside the workspace", path))
        .with_operation("files::resolve")
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Regex when the query is one, escaped literal otherwise
fn query_pattern(query: &str) -> Result<Regex> {
    Regex::new(query)
        .or_else(|_| Regex::new(&regex::escape(query)))
        .map_err(|e| {
            Error::invalid_action(format!("unusable search query: {}", e))
                .with_operation("files::search")
        })
}

impl FileOperations for LocalFiles {
    fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        std::fs::read_to_string(&full).map_err(|e| {
            Error::from(e)
                .with_operation("files::read")
                .with_context("path", path)
        })
    }

    fn write(&self, path: &str, content: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(Error::new(ErrorKind::IoFailed, format!("'{}' is a directory", path))
                .with_operation("files::write"));
        }
        let created = !full.exists();

        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::from(e)
                    .with_operation("files::write")
                    .with_context("path", path)
            })?;
        }
        std::fs::write(&full, content).map_err(|e| {
            Error::from(e)
                .with_operation("files::write")
                .with_context("path", path)
        })?;

        debug!(path, created, bytes = content.len(), "file written");
        Ok(created)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let pattern = query_pattern(query)?;
        let mut hits = Vec::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e));

        'files: for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            // binary or unreadable files are skipped
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for (index, line) in content.lines().enumerate() {
                if hits.len() >= limit {
                    break 'files;
                }
                if pattern.is_match(line) {
                    hits.push(SearchHit {
                        path: self.display_path(entry.path()),
                        line: index + 1,
                        text: excerpt(line.trim()),
                    });
                }
            }
        }

        debug!(query, hits = hits.len(), "search finished");
        Ok(hits)
    }
}

fn excerpt(line: &str) -> String {
    if line.len() <= HIT_EXCERPT {
        return line.to_string();
    }
    let mut end = HIT_EXCERPT;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &line[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, LocalFiles) {
        let dir = TempDir::new().unwrap();
        let files = LocalFiles::new(dir.path()).unwrap();
        (dir, files)
    }

    #[test]
    fn test_write_reports_created_then_modified() {
        let (_dir, files) = workspace();
        assert!(files.write("src/new.txt", "one").unwrap());
        assert!(!files.write("src/new.txt", "two").unwrap());
        assert_eq!(files.read("src/new.txt").unwrap(), "two");
    }

    #[test]
    fn test_read_missing_file() {
        let (_dir, files) = workspace();
        let err = files.read("nope.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_paths_cannot_escape_root() {
        let (_dir, files) = workspace();
        assert_eq!(files.read("../etc/passwd").unwrap_err().kind(), ErrorKind::Denied);
        assert_eq!(files.write("/tmp/evil", "x").unwrap_err().kind(), ErrorKind::Denied);
        assert_eq!(files.write("a/../../b", "x").unwrap_err().kind(), ErrorKind::Denied);

        // stepping down and back up stays inside
        assert!(files.write("a/../b.txt", "x").unwrap());
        assert_eq!(files.read("./b.txt").unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_refused() {
        let (dir, files) = workspace();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("later.txt"),
            dir.path().join("dangling.txt"),
        )
        .unwrap();

        assert_eq!(files.write("escape/pwned.txt", "x").unwrap_err().kind(), ErrorKind::Denied);
        assert!(!outside.path().join("pwned.txt").exists());
        assert_eq!(files.read("escape/secret.txt").unwrap_err().kind(), ErrorKind::Denied);
        assert_eq!(files.write("dangling.txt", "x").unwrap_err().kind(), ErrorKind::Denied);
        assert!(!outside.path().join("later.txt").exists());

        // links that stay inside keep working
        files.write("real/a.txt", "inside").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();
        assert_eq!(files.read("alias/a.txt").unwrap(), "inside");
    }

    #[test]
    fn test_absolute_path_inside_root_is_allowed() {
        let (_dir, files) = workspace();
        let inside = files.root().join("abs.txt");
        assert!(files.write(&inside.to_string_lossy(), "ok").unwrap());
        assert_eq!(files.read("abs.txt").unwrap(), "ok");
    }

    #[test]
    fn test_search_regex_and_skips() {
        let (_dir, files) = workspace();
        files.write("src/main.rs", "fn main() {\n    run();\n}\n").unwrap();
        files.write("src/lib.rs", "pub fn run() {}\n").unwrap();
        files.write("target/debug/gen.rs", "fn run() {}\n").unwrap();
        files.write(".git/config", "fn run\n").unwrap();
        files.write("node_modules/x/index.js", "run()\n").unwrap();

        let hits = files.search(r"fn \w+\(", 50).unwrap();
        let rendered: Vec<String> = hits.iter().map(|h| h.to_string()).collect();
        assert_eq!(rendered, vec!["src/lib.rs:1: pub fn run() {}", "src/main.rs:1: fn main() {"]);
    }

    #[test]
    fn test_search_invalid_regex_falls_back_to_literal() {
        let (_dir, files) = workspace();
        files.write("a.txt", "call(x\nother\n").unwrap();
        let hits = files.search("call(", 50).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 1);
    }

    #[test]
    fn test_search_respects_limit() {
        let (_dir, files) = workspace();
        files.write("many.txt", &"hit\n".repeat(100)).unwrap();
        assert_eq!(files.search("hit", 50).unwrap().len(), 50);
    }
}
