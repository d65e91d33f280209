//! Read input files into documents and write documents to the output directory.

use crate::document::Document;
use crate::error::Result;
use crate::execution::{ExecutionContext, Module};
use crate::io::{FileEntry, NormalizedPath};
use crate::meta::{keys, MetaValue};

// =============================================================================
// ReadFiles
// =============================================================================

/// Reads files matching glob patterns across all input roots.
///
/// Replaces its inputs with one new document per file. The source is the
/// file's absolute path and the content is read lazily. Metadata:
///
/// | Key                | Value                                  |
/// |--------------------|----------------------------------------|
/// | `SourceFilePath`   | absolute path                          |
/// | `SourceFileName`   | `post.md`                              |
/// | `SourceFileBase`   | `post`                                 |
/// | `SourceFileExt`    | `.md`                                  |
/// | `SourceFileRoot`   | containing input root                  |
/// | `RelativeFilePath` | path relative to the input root        |
///
/// When two roots hold the same relative path, the later root wins.
pub struct ReadFiles {
    patterns: Vec<String>,
}

impl ReadFiles {
    /// Read files matching `patterns`; `!` patterns exclude.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn document(&self, file: FileEntry, ctx: &ExecutionContext) -> Result<Document> {
        let path = file.path().clone();
        let root = ctx.file_system().get_containing_input_path(path.clone())?;
        let relative = root
            .as_ref()
            .and_then(|root| path.relative_to(root, file.is_case_sensitive()))
            .unwrap_or_else(|| NormalizedPath::new(path.name().unwrap_or_default()));

        let mut items: Vec<(&str, MetaValue)> = vec![
            (keys::SOURCE_FILE_PATH, path.clone().into()),
            (keys::RELATIVE_FILE_PATH, relative.into()),
        ];
        if let Some(name) = path.name() {
            items.push((keys::SOURCE_FILE_NAME, name.into()));
        }
        if let Some(stem) = path.file_stem() {
            items.push((keys::SOURCE_FILE_BASE, stem.into()));
        }
        if let Some(ext) = path.extension() {
            items.push((keys::SOURCE_FILE_EXT, format!(".{ext}").into()));
        }
        if let Some(root) = root {
            items.push((keys::SOURCE_FILE_ROOT, root.into()));
        }

        ctx.new_document()
            .source(path)
            .file(file)
            .metadata(items)
            .build()
    }
}

impl Module for ReadFiles {
    fn execute(&self, _inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        let files = ctx.file_system().get_input_files(&self.patterns)?;
        tracing::debug!(
            patterns = ?self.patterns,
            files = files.len(),
            "matched input files"
        );
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let path = file.path().to_string();
            if let Some(doc) = ctx.isolate(&path, self.document(file, ctx))? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }
}

// =============================================================================
// WriteFiles
// =============================================================================

/// Writes each document's content under the output directory.
///
/// The destination is `DestinationPath` if set, else `RelativeFilePath`,
/// with the extension optionally replaced. Written documents gain
/// `DestinationFilePath`; documents with no destination pass through
/// unwritten.
#[derive(Default)]
pub struct WriteFiles {
    extension: Option<String>,
}

impl WriteFiles {
    /// Write to the document's own destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the destination extension, e.g. `"html"`.
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    fn destination(&self, doc: &Document) -> Option<NormalizedPath> {
        let path = doc
            .get_as::<NormalizedPath>(keys::DESTINATION_PATH)
            .or_else(|| doc.get_as(keys::RELATIVE_FILE_PATH))?;
        Some(match &self.extension {
            Some(ext) => path.change_extension(ext),
            None => path,
        })
    }
}

impl Module for WriteFiles {
    fn execute(&self, inputs: Vec<Document>, ctx: &ExecutionContext) -> Result<Vec<Document>> {
        ctx.map_documents(inputs, |doc| {
            let Some(destination) = self.destination(doc) else {
                tracing::debug!(document = %doc.source_string(), "no destination, not writing");
                return Ok(vec![doc.clone()]);
            };
            let file = ctx.file_system().get_output_file(destination)?;
            file.write(doc.read_bytes()?)?;
            tracing::trace!(document = %doc.source_string(), path = %file.path(), "wrote file");
            Ok(vec![
                doc.derive()
                    .meta(keys::DESTINATION_FILE_PATH, file.path().clone())
                    .build()?,
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::execution::Pipeline;
    use crate::io::{FileProvider, MemoryFileProvider};
    use crate::testing;

    fn provider() -> Arc<MemoryFileProvider> {
        Arc::new(
            MemoryFileProvider::new()
                .with_file("/site/theme/posts/a.md", "theme a")
                .with_file("/site/theme/layout.html", "layout")
                .with_file("/site/input/posts/a.md", "site a")
                .with_file("/site/input/posts/b.md", "site b"),
        )
    }

    #[test]
    fn test_read_files_overlays_roots() {
        let ctx = testing::context_with(testing::file_system_with(provider()));
        let docs = ReadFiles::new(["**/*.md"]).execute(Vec::new(), &ctx).unwrap();
        let mut found: Vec<_> = docs
            .iter()
            .map(|d| (d.source_string(), d.read_string().unwrap()))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("/site/input/posts/a.md".to_string(), "site a".to_string()),
                ("/site/input/posts/b.md".to_string(), "site b".to_string()),
            ]
        );
    }

    #[test]
    fn test_read_files_metadata() {
        let ctx = testing::context_with(testing::file_system_with(provider()));
        let docs = ReadFiles::new(["posts/b.md"]).execute(Vec::new(), &ctx).unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.string(keys::RELATIVE_FILE_PATH).as_deref(), Some("posts/b.md"));
        assert_eq!(doc.string(keys::SOURCE_FILE_NAME).as_deref(), Some("b.md"));
        assert_eq!(doc.string(keys::SOURCE_FILE_BASE).as_deref(), Some("b"));
        assert_eq!(doc.string(keys::SOURCE_FILE_EXT).as_deref(), Some(".md"));
        assert_eq!(
            doc.get_as::<NormalizedPath>(keys::SOURCE_FILE_ROOT).map(|p| p.full_path()).as_deref(),
            Some("/site/input")
        );
    }

    #[test]
    fn test_write_files() {
        let provider = provider();
        let ctx = testing::context_with(testing::file_system_with(provider.clone()));
        let docs = ReadFiles::new(["posts/*.md", "layout.html"])
            .execute(Vec::new(), &ctx)
            .unwrap();
        let unsourced = ctx.new_document().text("skip").build().unwrap();
        let moved = ctx
            .new_document()
            .text("feed")
            .meta(keys::DESTINATION_PATH, "feed.xml")
            .build()
            .unwrap();

        let mut inputs = docs;
        inputs.push(unsourced);
        inputs.push(moved);
        let written = WriteFiles::new()
            .extension("html")
            .execute(inputs, &ctx)
            .unwrap();
        assert_eq!(written.len(), 5);

        let fs = ctx.file_system();
        let read = |p: &str| fs.get_file(p).unwrap().read_to_string().unwrap();
        assert_eq!(read("/site/output/posts/a.html"), "site a");
        assert_eq!(read("/site/output/posts/b.html"), "site b");
        assert_eq!(read("/site/output/layout.html"), "layout");
        assert_eq!(read("/site/output/feed.html"), "feed");
        assert!(provider.file_exists(&NormalizedPath::new("/site/output/feed.html")));

        assert_eq!(
            written[0].string(keys::DESTINATION_FILE_PATH).as_deref(),
            Some("/site/output/posts/a.html")
        );
        assert!(written[3].get(keys::DESTINATION_FILE_PATH).is_none());
    }

    #[test]
    fn test_unreadable_document_skipped_on_write() {
        let provider = Arc::new(MemoryFileProvider::new());
        let ctx = testing::context_with(testing::file_system_with(provider.clone()));
        let good = ctx
            .new_document()
            .source("/good")
            .text("good")
            .meta(keys::DESTINATION_PATH, "good.txt")
            .build()
            .unwrap();
        let bad = testing::unreadable_document("/bad")
            .derive()
            .meta(keys::DESTINATION_PATH, "bad.txt")
            .build()
            .unwrap();

        let written = ctx
            .run_module(&crate::shared(WriteFiles::new()), vec![bad, good])
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].source_string(), "/good");
        assert!(provider.file_exists(&NormalizedPath::new("/site/output/good.txt")));
    }

    #[test]
    fn test_local_round_trip_and_clean_output() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("input/notes")).unwrap();
        fs::write(dir.path().join("input/notes/one.txt"), "one").unwrap();
        fs::create_dir_all(dir.path().join("output")).unwrap();
        fs::write(dir.path().join("output/stale.txt"), "stale").unwrap();

        let mut engine = crate::Engine::new();
        engine.file_system_mut().set_root_path(dir.path()).unwrap();
        engine.settings_mut().set(keys::CLEAN_OUTPUT_PATH, true);
        engine
            .pipelines_mut()
            .add(
                Pipeline::new("Notes")
                    .with(ReadFiles::new(["**/*.txt"]))
                    .with(WriteFiles::new()),
            )
            .unwrap();
        engine.execute().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("output/notes/one.txt")).unwrap(),
            "one"
        );
        assert!(!dir.path().join("output/stale.txt").exists());
        assert_eq!(engine.documents().from_pipeline("Notes").len(), 1);
    }
}
