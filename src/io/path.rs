//! Normalized, scheme-aware logical paths.
//!
//! Every path that crosses the [`FileSystem`](super::FileSystem) is parsed into
//! a [`NormalizedPath`]: an optional provider scheme, an absolute flag and a
//! list of segments with `.` and `..` already collapsed.
//!
//! Accepted forms:
//!
//! ```text
//! /a/b/c.txt            absolute, default provider
//! a\b\..\c.txt          relative, `\` is a separator too  -> a/c.txt
//! qwerty|/a/b           scheme `qwerty`
//! qwerty:///a/b         URI form
//! qwerty:///|/a/b       URI form with explicit separator
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Scheme of the default (local) provider. Normalized to "no scheme".
pub const DEFAULT_SCHEME: &str = "file";

/// A logical path with collapsed segments and an optional provider scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    scheme: Option<String>,
    absolute: bool,
    segments: Vec<String>,
}

impl NormalizedPath {
    /// Parse and normalize a path string.
    pub fn new(path: &str) -> Self {
        let path = path.replace('\\', "/");
        let (scheme, rest) = split_scheme(&path);

        let mut absolute = rest.starts_with('/') || scheme.is_some();
        let mut segments = Vec::new();
        for (i, segment) in rest.split('/').enumerate() {
            // `C:` as a leading segment marks a drive-absolute path.
            if i == 0 && is_drive(segment) {
                absolute = true;
                segments.push(segment.to_string());
                continue;
            }
            push_segment(&mut segments, segment, absolute);
        }

        Self {
            scheme,
            absolute,
            segments,
        }
    }

    /// The absolute root path (`/`) of the default provider.
    pub fn root() -> Self {
        Self {
            scheme: None,
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// The empty relative path (`.`).
    pub fn empty() -> Self {
        Self {
            scheme: None,
            absolute: false,
            segments: Vec::new(),
        }
    }

    /// Provider scheme, `None` for the default provider.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Same path routed to another provider scheme.
    pub fn with_scheme(mut self, scheme: Option<&str>) -> Self {
        self.scheme = scheme.and_then(normalize_scheme);
        if self.scheme.is_some() {
            self.absolute = true;
        }
        self
    }

    /// Same path on the default provider.
    pub fn without_scheme(&self) -> Self {
        Self {
            scheme: None,
            ..self.clone()
        }
    }

    /// Whether the path is rooted.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Whether the path is relative.
    pub fn is_relative(&self) -> bool {
        !self.absolute
    }

    /// Collapsed path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is a root (absolute) or `.` (relative) path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path without its scheme, using `/` separators.
    ///
    /// An empty relative path renders as `.`.
    pub fn full_path(&self) -> String {
        let joined = self.segments.join("/");
        if !self.absolute {
            return if joined.is_empty() { ".".into() } else { joined };
        }
        match self.segments.first() {
            Some(first) if is_drive(first) => {
                if self.segments.len() == 1 {
                    format!("{first}/")
                } else {
                    joined
                }
            }
            _ => format!("/{joined}"),
        }
    }

    /// Last segment.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Last segment without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.name()?;
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => Some(stem),
            _ => Some(name),
        }
    }

    /// Extension of the last segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name()?;
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Replace (or with an empty `ext`, remove) the extension of the last segment.
    pub fn change_extension(&self, ext: &str) -> Self {
        let mut path = self.clone();
        let ext = ext.trim_start_matches('.');
        if let Some(stem) = self.file_stem().map(str::to_string)
            && let Some(last) = path.segments.last_mut()
        {
            *last = if ext.is_empty() {
                stem
            } else {
                format!("{stem}.{ext}")
            };
        }
        path
    }

    /// Parent directory, `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// Join `other` onto this path. An absolute `other` replaces this path.
    pub fn combine(&self, other: &NormalizedPath) -> Self {
        if other.absolute {
            return other.clone();
        }
        let mut combined = self.clone();
        for segment in &other.segments {
            push_segment(&mut combined.segments, segment, combined.absolute);
        }
        combined
    }

    /// Join a raw string onto this path.
    pub fn join(&self, other: &str) -> Self {
        self.combine(&NormalizedPath::new(other))
    }

    /// Segment-wise prefix test. Schemes must match exactly.
    pub fn starts_with(&self, prefix: &NormalizedPath, case_sensitive: bool) -> bool {
        self.scheme == prefix.scheme
            && self.absolute == prefix.absolute
            && prefix.segments.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(&prefix.segments)
                .all(|(a, b)| segment_eq(a, b, case_sensitive))
    }

    /// This path relative to `base`, if `base` is a prefix of it.
    pub fn relative_to(&self, base: &NormalizedPath, case_sensitive: bool) -> Option<Self> {
        if !self.starts_with(base, case_sensitive) {
            return None;
        }
        Some(Self {
            scheme: None,
            absolute: false,
            segments: self.segments[base.segments.len()..].to_vec(),
        })
    }

    /// Convert to a platform path (scheme dropped).
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.full_path())
    }
}

impl Default for NormalizedPath {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheme {
            Some(scheme) => write!(f, "{scheme}|{}", self.full_path()),
            None => f.write_str(&self.full_path()),
        }
    }
}

impl FromStr for NormalizedPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for NormalizedPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for NormalizedPath {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

impl From<&String> for NormalizedPath {
    fn from(path: &String) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(path: &Path) -> Self {
        Self::new(&path.to_string_lossy())
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl From<&NormalizedPath> for NormalizedPath {
    fn from(path: &NormalizedPath) -> Self {
        path.clone()
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Compare two segments under the given case sensitivity.
pub(crate) fn segment_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
    }
}

fn split_scheme(path: &str) -> (Option<String>, &str) {
    if let Some((prefix, rest)) = path.split_once('|') {
        let scheme = prefix.split_once(':').map_or(prefix, |(s, _)| s);
        return (normalize_scheme(scheme), rest);
    }
    if let Some((scheme, rest)) = path.split_once("://")
        && scheme.len() >= 2
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return (normalize_scheme(scheme), rest);
    }
    (None, path)
}

fn normalize_scheme(scheme: &str) -> Option<String> {
    let scheme = scheme.trim();
    if scheme.is_empty() || scheme.eq_ignore_ascii_case(DEFAULT_SCHEME) {
        None
    } else {
        Some(scheme.to_string())
    }
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn push_segment(segments: &mut Vec<String>, segment: &str, absolute: bool) {
    match segment {
        "" | "." => {}
        ".." => match segments.last() {
            Some(last) if last != ".." && !is_drive(last) => {
                segments.pop();
            }
            _ if !absolute => segments.push("..".into()),
            _ => {}
        },
        _ => segments.push(segment.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_dots() {
        assert_eq!(NormalizedPath::new("/a/b/../c/./d").full_path(), "/a/c/d");
        assert_eq!(NormalizedPath::new("a/../../b").full_path(), "../b");
        assert_eq!(NormalizedPath::new("/../a").full_path(), "/a");
        assert_eq!(NormalizedPath::new("a/..").full_path(), ".");
        assert_eq!(NormalizedPath::new("/").full_path(), "/");
    }

    #[test]
    fn test_backslash_separator() {
        let path = NormalizedPath::new(r"\a\b\c\foo.txt");
        assert!(path.is_absolute());
        assert_eq!(path.full_path(), "/a/b/c/foo.txt");
    }

    #[test]
    fn test_scheme_forms() {
        for raw in ["qwerty|/a/b", "qwerty:///a/b", "qwerty:///|/a/b", r"qwerty|\a\b"] {
            let path = NormalizedPath::new(raw);
            assert_eq!(path.scheme(), Some("qwerty"), "{raw}");
            assert_eq!(path.full_path(), "/a/b", "{raw}");
            assert_eq!(path.to_string(), "qwerty|/a/b");
        }
        assert_eq!(NormalizedPath::new("file:///a/b").scheme(), None);
    }

    #[test]
    fn test_drive_letter_is_not_scheme() {
        let path = NormalizedPath::new(r"C:\a\b");
        assert_eq!(path.scheme(), None);
        assert!(path.is_absolute());
        assert_eq!(path.full_path(), "C:/a/b");
    }

    #[test]
    fn test_combine_and_parent() {
        let root = NormalizedPath::new("/a/b");
        assert_eq!(root.join("c/foo.txt").full_path(), "/a/b/c/foo.txt");
        assert_eq!(root.join("../x").full_path(), "/a/x");
        assert_eq!(root.join("/z").full_path(), "/z");
        assert_eq!(root.parent().map(|p| p.full_path()), Some("/a".into()));
        assert_eq!(NormalizedPath::root().parent(), None);
    }

    #[test]
    fn test_extension() {
        let path = NormalizedPath::new("posts/hello.md");
        assert_eq!(path.extension(), Some("md"));
        assert_eq!(path.file_stem(), Some("hello"));
        assert_eq!(path.change_extension(".html").full_path(), "posts/hello.html");
        assert_eq!(path.change_extension("").full_path(), "posts/hello");
        assert_eq!(NormalizedPath::new(".gitignore").extension(), None);
    }

    #[test]
    fn test_starts_with_and_relative_to() {
        let file = NormalizedPath::new("/a/b/c/foo.txt");
        let base = NormalizedPath::new("/a/b");
        assert!(file.starts_with(&base, true));
        assert!(!file.starts_with(&NormalizedPath::new("/a/bc"), true));
        assert!(file.starts_with(&NormalizedPath::new("/A/B"), false));
        assert!(!file.starts_with(&NormalizedPath::new("/A/B"), true));
        assert_eq!(
            file.relative_to(&base, true).map(|p| p.full_path()),
            Some("c/foo.txt".into())
        );
    }
}
