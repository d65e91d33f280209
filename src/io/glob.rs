//! Glob evaluation over physical and virtual directories.
//!
//! Each pattern is split into a literal directory prefix and a glob remainder:
//!
//! ```text
//! /a/b/**/foo.txt   ->  base /a/b        glob **/foo.txt
//! posts/*.md        ->  base <dir>/posts glob *.md
//! qwerty|/a/*.txt   ->  base qwerty|/a   glob *.txt
//! a/b/foo.txt       ->  single file a/b/foo.txt
//! ```
//!
//! Only the base directory's listing is matched, using [`globset`] with
//! `/`-aware wildcards and the base's case sensitivity.

use globset::GlobBuilder;
use indexmap::{IndexMap, IndexSet};

use super::entry::{Directory, FileEntry};
use super::file_system::FileSystem;
use super::provider::SearchOption;
use super::NormalizedPath;
use crate::error::{Error, Result};

/// Evaluate `patterns` relative to `directory`. See [`FileSystem::get_files`].
pub(crate) fn get_files<I, S>(
    fs: &FileSystem,
    directory: &dyn Directory,
    patterns: I,
) -> Result<Vec<FileEntry>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut included: IndexMap<String, FileEntry> = IndexMap::new();
    let mut excluded: IndexSet<String> = IndexSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        let (exclude, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, pattern),
        };
        if pattern.is_empty() {
            continue;
        }

        for file in matches(fs, directory, pattern)? {
            let key = file.path().to_string();
            if exclude {
                excluded.insert(key);
            } else {
                included.entry(key).or_insert(file);
            }
        }
    }

    Ok(included
        .into_iter()
        .filter(|(key, _)| !excluded.contains(key))
        .map(|(_, file)| file)
        .collect())
}

fn is_glob_segment(segment: &str) -> bool {
    segment.contains(['*', '?', '[', ']', '{', '}'])
}

fn matches(fs: &FileSystem, directory: &dyn Directory, pattern: &str) -> Result<Vec<FileEntry>> {
    let path = NormalizedPath::new(pattern);
    let segments = path.segments();
    let literal = segments
        .iter()
        .take_while(|s| !is_glob_segment(s))
        .count();

    // Fully literal: a single existence check.
    if literal == segments.len() {
        let file = if path.is_absolute() {
            fs.get_file(path)?
        } else {
            directory.get_file(&path)?
        };
        return Ok(if file.exists() { vec![file] } else { Vec::new() });
    }

    let prefix = NormalizedPath::new(&segments[..literal].join("/"));
    let base: Box<dyn Directory> = if path.is_absolute() {
        let root = NormalizedPath::root().with_scheme(path.scheme());
        Box::new(fs.get_directory(root.combine(&prefix))?)
    } else {
        directory.get_directory(&prefix)?
    };
    if !base.exists() {
        return Ok(Vec::new());
    }

    let remainder = &segments[literal..];
    let search = if remainder.len() > 1 || remainder.iter().any(|s| s.contains("**")) {
        SearchOption::AllDirectories
    } else {
        SearchOption::TopDirectoryOnly
    };
    let matcher = GlobBuilder::new(&remainder.join("/"))
        .literal_separator(true)
        .case_insensitive(!base.is_case_sensitive())
        .build()
        .map_err(|_| Error::invalid_path(pattern, "invalid glob pattern"))?
        .compile_matcher();

    Ok(base
        .get_relative_files(search)?
        .into_iter()
        .filter(|(relative, _)| matcher.is_match(relative.full_path()))
        .map(|(_, file)| file)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::io::{FileProvider, MemoryFileProvider};

    /// Tree mirroring a typical site layout with two overlapping roots.
    fn file_system() -> FileSystem {
        let provider = MemoryFileProvider::new()
            .with_file("/a/b/c/foo.txt", "foo")
            .with_file("/a/b/c/baz.txt", "c-baz")
            .with_file("/a/b/c/1/2.txt", "2")
            .with_file("/a/b/d/baz.txt", "d-baz")
            .with_file("/a/x/bar.txt", "bar")
            .with_file("/a/y/baz.txt", "y-baz")
            .with_file("/a/y/foo.txt", "y-foo")
            .with_directory("/a/b/e");
        let qwerty = MemoryFileProvider::new()
            .with_file("/q/w/e.txt", "e")
            .with_file("/q/w/r/t.txt", "t");

        let mut fs = FileSystem::new();
        fs.set_root_path("/a").unwrap();
        fs.clear_input_paths();
        fs.add_input_path("b/c");
        fs.add_input_path("b/d");
        fs.add_input_path("x");
        fs.add_file_provider("", provider);
        fs.add_shared_file_provider("qwerty", Arc::new(qwerty) as Arc<dyn FileProvider>);
        fs
    }

    fn paths(files: &[FileEntry]) -> Vec<String> {
        let mut paths: Vec<_> = files.iter().map(|f| f.path().full_path()).collect();
        paths.sort();
        paths
    }

    fn glob(dir: &str, patterns: &[&str]) -> Vec<String> {
        let fs = file_system();
        let directory = fs.get_directory(dir).unwrap();
        paths(&fs.get_files(&directory, patterns).unwrap())
    }

    #[test]
    fn test_absolute_patterns() {
        assert_eq!(glob("/", &["/a/b/c/foo.txt"]), vec!["/a/b/c/foo.txt"]);
        assert_eq!(glob("/", &["/a/**/foo.txt"]), vec!["/a/b/c/foo.txt", "/a/y/foo.txt"]);
        assert_eq!(glob("/a/b", &["/a/y/*.txt"]), vec!["/a/y/baz.txt", "/a/y/foo.txt"]);
    }

    #[test]
    fn test_relative_patterns() {
        assert_eq!(glob("/a/b", &["c/foo.txt"]), vec!["/a/b/c/foo.txt"]);
        assert_eq!(glob("/a/b", &["**/baz.txt"]), vec!["/a/b/c/baz.txt", "/a/b/d/baz.txt"]);
        assert_eq!(glob("/a/b/c", &["*.txt"]), vec!["/a/b/c/baz.txt", "/a/b/c/foo.txt"]);
        assert_eq!(glob("/a/b/c", &["../d/*.txt"]), vec!["/a/b/d/baz.txt"]);
        assert!(glob("/a/b", &["c/missing.txt"]).is_empty());
    }

    #[test]
    fn test_backslash_patterns() {
        assert_eq!(glob("/", &[r"\a\b\c\foo.txt"]), vec!["/a/b/c/foo.txt"]);
        assert_eq!(glob("/a", &[r"b\**\2.txt"]), vec!["/a/b/c/1/2.txt"]);
    }

    #[test]
    fn test_exclusions() {
        assert!(glob("/", &["**/foo.txt", "!**/foo.txt"]).is_empty());
        assert_eq!(
            glob("/", &["**/foo.txt", "!**/bar.txt"]),
            vec!["/a/b/c/foo.txt", "/a/y/foo.txt"]
        );
        assert_eq!(glob("/a", &["**/*.txt", "!b/**", "!y/foo.txt"]), vec![
            "/a/x/bar.txt",
            "/a/y/baz.txt"
        ]);
    }

    #[test]
    fn test_duplicate_inclusions_collapse() {
        let fs = file_system();
        let directory = fs.get_directory("/a/b/c").unwrap();
        let files = fs
            .get_files(&directory, ["foo.txt", "*.txt", "**/foo.txt"])
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path().full_path(), "/a/b/c/foo.txt");
    }

    #[test]
    fn test_scheme_patterns() {
        for pattern in ["qwerty|/q/**/*.txt", "qwerty:///q/**/*.txt", "qwerty:///|/q/**/*.txt"] {
            assert_eq!(glob("/a", &[pattern]), vec!["/q/w/e.txt", "/q/w/r/t.txt"], "{pattern}");
        }
        let fs = file_system();
        let dir = fs.get_directory("/").unwrap();
        let files = fs.get_files(&dir, ["qwerty|/q/w/e.txt"]).unwrap();
        assert_eq!(files[0].path().to_string(), "qwerty|/q/w/e.txt");
        assert_eq!(files[0].read_to_string().unwrap(), "e");
    }

    #[test]
    fn test_unknown_scheme_fails() {
        let fs = file_system();
        let dir = fs.get_directory("/").unwrap();
        let err = fs.get_files(&dir, ["nope|/q/*.txt"]).unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound { .. }));
    }

    #[test]
    fn test_input_files_merge_roots() {
        let fs = file_system();
        let files = fs.get_input_files(["**/*.txt"]).unwrap();
        // baz.txt from b/d overrides the one from b/c.
        let mut found: Vec<_> = files
            .iter()
            .map(|f| (f.path().full_path(), f.read_to_string().unwrap()))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("/a/b/c/1/2.txt".to_string(), "2".to_string()),
                ("/a/b/c/foo.txt".to_string(), "foo".to_string()),
                ("/a/b/d/baz.txt".to_string(), "d-baz".to_string()),
                ("/a/x/bar.txt".to_string(), "bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_matching() {
        let mut fs = FileSystem::new();
        fs.set_root_path("/").unwrap();
        fs.add_file_provider("", MemoryFileProvider::case_insensitive().with_file("/Docs/Read.MD", "x"));
        let dir = fs.get_directory("/").unwrap();
        assert_eq!(paths(&fs.get_files(&dir, ["docs/*.md"]).unwrap()), vec!["/Docs/Read.MD"]);
    }
}
