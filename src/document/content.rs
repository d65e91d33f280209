//! Lazily read document content and content fingerprints.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::io::FileEntry;

// =============================================================================
// Fingerprint
// =============================================================================

/// SHA-256 digest identifying a content value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Fingerprint of everything readable from `reader`.
    pub fn of_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Order-sensitive combination of several fingerprints.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Fingerprint>) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.0);
        }
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

// =============================================================================
// Content
// =============================================================================

/// A custom content source, opened on demand.
///
/// Each call to [`open`](Self::open) must return a fresh reader positioned at
/// the start of the content.
pub trait ContentProvider: Send + Sync {
    /// Open a new reader over the content.
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// Placeholder path for I/O errors raised by a [`ContentProvider`].
const PROVIDED_CONTENT: &str = "<provided content>";

#[derive(Clone)]
enum Kind {
    Empty,
    Bytes(Arc<[u8]>),
    File(FileEntry),
    Provider(Arc<dyn ContentProvider>),
}

/// Document content. Nothing is read until a consumer asks for it.
///
/// The fingerprint is computed at most once and shared by every clone of the
/// same content value.
#[derive(Clone)]
pub struct Content {
    kind: Kind,
    fingerprint: Arc<OnceLock<Fingerprint>>,
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl Content {
    fn with_kind(kind: Kind) -> Self {
        Self {
            kind,
            fingerprint: Arc::new(OnceLock::new()),
        }
    }

    /// No content.
    pub fn empty() -> Self {
        Self::with_kind(Kind::Empty)
    }

    /// In-memory bytes.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_kind(Kind::Bytes(bytes.into()))
    }

    /// In-memory text.
    pub fn from_text(text: impl AsRef<str>) -> Self {
        Self::from_bytes(text.as_ref().as_bytes())
    }

    /// Content of a file, read when consumed.
    pub fn from_file(file: FileEntry) -> Self {
        Self::with_kind(Kind::File(file))
    }

    /// Content of a custom provider.
    pub fn from_provider(provider: Arc<dyn ContentProvider>) -> Self {
        Self::with_kind(Kind::Provider(provider))
    }

    /// Whether this is the empty content.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Backing file, if the content is file-based.
    pub fn file(&self) -> Option<&FileEntry> {
        match &self.kind {
            Kind::File(file) => Some(file),
            _ => None,
        }
    }

    /// Open a fresh reader.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        Ok(match &self.kind {
            Kind::Empty => Box::new(std::io::empty()),
            Kind::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
            Kind::File(file) => Box::new(Cursor::new(file.read_bytes()?)),
            Kind::Provider(provider) => provider.open()?,
        })
    }

    /// Read everything.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.kind {
            Kind::Empty => Ok(Vec::new()),
            Kind::Bytes(bytes) => Ok(bytes.to_vec()),
            Kind::File(file) => file.read_bytes(),
            Kind::Provider(_) => {
                let mut buf = Vec::new();
                self.open()?
                    .read_to_end(&mut buf)
                    .map_err(|e| Error::io(PROVIDED_CONTENT, e))?;
                Ok(buf)
            }
        }
    }

    /// Read everything as UTF-8, replacing invalid sequences.
    pub fn read_string(&self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Content fingerprint, computed on first use.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        if let Some(fp) = self.fingerprint.get() {
            return Ok(*fp);
        }
        let fp = match &self.kind {
            Kind::Empty => Fingerprint::of(&[]),
            Kind::Bytes(bytes) => Fingerprint::of(bytes),
            Kind::File(file) => Fingerprint::of(&file.read_bytes()?),
            Kind::Provider(provider) => Fingerprint::of_reader(provider.open()?)
                .map_err(|e| Error::io(PROVIDED_CONTENT, e))?,
        };
        Ok(*self.fingerprint.get_or_init(|| fp))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Empty => f.write_str("Content::Empty"),
            Kind::Bytes(bytes) => write!(f, "Content::Bytes({} bytes)", bytes.len()),
            Kind::File(file) => write!(f, "Content::File({file})"),
            Kind::Provider(_) => f.write_str("Content::Provider"),
        }
    }
}
