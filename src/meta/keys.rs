//! Well-known metadata keys.

/// Setting: enable per-module execution caches (default `true`).
pub const USE_CACHE: &str = "UseCache";
/// Setting: delete the output directory before a pass (default `false`).
pub const CLEAN_OUTPUT_PATH: &str = "CleanOutputPath";

/// Absolute path of the file a document was read from.
pub const SOURCE_FILE_PATH: &str = "SourceFilePath";
/// File name (with extension) of the source file.
pub const SOURCE_FILE_NAME: &str = "SourceFileName";
/// File name without extension of the source file.
pub const SOURCE_FILE_BASE: &str = "SourceFileBase";
/// Extension of the source file, with leading dot.
pub const SOURCE_FILE_EXT: &str = "SourceFileExt";
/// Path of the source file relative to its input root.
pub const RELATIVE_FILE_PATH: &str = "RelativeFilePath";
/// Input root containing the source file.
pub const SOURCE_FILE_ROOT: &str = "SourceFileRoot";
/// Output path override, relative to the output directory.
pub const DESTINATION_PATH: &str = "DestinationPath";
/// Absolute path a document was written to.
pub const DESTINATION_FILE_PATH: &str = "DestinationFilePath";

/// Grouping key of a group document.
pub const GROUP_KEY: &str = "GroupKey";
/// Members of a group document.
pub const GROUP_DOCUMENTS: &str = "GroupDocuments";

/// Documents on this page.
pub const PAGE_DOCUMENTS: &str = "PageDocuments";
/// One-based page number.
pub const CURRENT_PAGE: &str = "CurrentPage";
/// Total number of pages.
pub const TOTAL_PAGES: &str = "TotalPages";
/// Total number of paged items.
pub const TOTAL_ITEMS: &str = "TotalItems";
/// Whether a later page exists.
pub const HAS_NEXT_PAGE: &str = "HasNextPage";
/// Whether an earlier page exists.
pub const HAS_PREVIOUS_PAGE: &str = "HasPreviousPage";
