//! Engine configuration.
//!
//! [`Settings`] is the global metadata every new document starts from.
//! [`ConfigBuilder`] assembles an [`EngineConfig`] (paths, settings, worker
//! threads) at application startup:
//!
//! ```ignore
//! let config = ConfigBuilder::new()
//!     .root_path("/srv/site")
//!     .input_path("content")
//!     .setting("Host", "example.com")
//!     .settings_json(r#"{ "Title": "Notes" }"#)
//!     .threads(4)
//!     .build()?;
//! let engine = Engine::with_config(config)?;
//! ```

use crate::error::{Error, Result};
use crate::io::{FileSystem, NormalizedPath};
use crate::meta::{keys, FromMeta, MetaValue, MetadataStack};

// =============================================================================
// Settings
// =============================================================================

/// Global settings, stored as an immutable metadata stack.
///
/// Cloning is cheap. [`with`](Self::with) returns a new value; the original
/// keeps its view.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    metadata: MetadataStack,
}

impl Settings {
    /// Empty settings; every typed accessor returns its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from key/value pairs.
    pub fn from_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self {
            metadata: MetadataStack::from_items(items),
        }
    }

    /// New settings with `items` layered on top.
    pub fn with<K, V>(&self, items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        Self {
            metadata: self.metadata.push(items),
        }
    }

    /// Layer one value on top of these settings in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.metadata = self.metadata.push([(key.into(), value.into())]);
    }

    /// Backing metadata stack.
    pub fn metadata(&self) -> &MetadataStack {
        &self.metadata
    }

    /// Raw value.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Coerced value.
    pub fn get_as<T: FromMeta>(&self, key: &str) -> Option<T> {
        self.metadata.get_as(key)
    }

    /// Whether per-module execution caches are enabled. Defaults to `true`.
    pub fn use_cache(&self) -> bool {
        self.metadata.get_or(keys::USE_CACHE, true)
    }

    /// Whether the output directory is cleaned before each pass. Defaults to `false`.
    pub fn clean_output_path(&self) -> bool {
        self.metadata.get_or(keys::CLEAN_OUTPUT_PATH, false)
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Validated engine configuration, produced by [`ConfigBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Root path; the current directory when unset.
    pub root_path: Option<NormalizedPath>,
    /// Input roots replacing the defaults, in registration order.
    pub input_paths: Option<Vec<NormalizedPath>>,
    /// Output path replacing the default.
    pub output_path: Option<NormalizedPath>,
    /// Global settings.
    pub settings: Settings,
    /// Worker threads for per-document fan-out; the global pool when unset.
    pub threads: Option<usize>,
}

impl EngineConfig {
    /// Apply the path settings to `fs`.
    pub fn apply(&self, fs: &mut FileSystem) -> Result<()> {
        if let Some(root) = &self.root_path {
            fs.set_root_path(root.clone())?;
        }
        if let Some(inputs) = &self.input_paths {
            fs.clear_input_paths();
            for input in inputs {
                fs.add_input_path(input.clone());
            }
        }
        if let Some(output) = &self.output_path {
            fs.set_output_path(output.clone());
        }
        Ok(())
    }
}

// =============================================================================
// ConfigBuilder
// =============================================================================

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ConfigBuilder {
    root_path: Option<NormalizedPath>,
    input_paths: Option<Vec<NormalizedPath>>,
    output_path: Option<NormalizedPath>,
    settings: Vec<(String, MetaValue)>,
    json: Vec<String>,
    threads: Option<usize>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root path. Must be absolute.
    pub fn root_path(mut self, path: impl Into<NormalizedPath>) -> Self {
        self.root_path = Some(path.into());
        self
    }

    /// Register an input root. The first call replaces the default roots.
    pub fn input_path(mut self, path: impl Into<NormalizedPath>) -> Self {
        self.input_paths.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    /// Replace the input roots.
    pub fn input_paths<P: Into<NormalizedPath>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.input_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Set the output path.
    pub fn output_path(mut self, path: impl Into<NormalizedPath>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Add one setting. Later values shadow earlier ones.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    /// Enable or disable execution caches.
    ///
    /// Default: enabled
    pub fn use_cache(self, enabled: bool) -> Self {
        self.setting(keys::USE_CACHE, enabled)
    }

    /// Clean the output directory before each pass.
    ///
    /// Default: disabled
    pub fn clean_output_path(self, enabled: bool) -> Self {
        self.setting(keys::CLEAN_OUTPUT_PATH, enabled)
    }

    /// Merge the members of a JSON object into the settings.
    ///
    /// Parsed by [`build`](Self::build); a malformed document or a non-object
    /// top level fails there.
    pub fn settings_json(mut self, json: impl Into<String>) -> Self {
        self.json.push(json.into());
        self
    }

    /// Size of the worker pool used for per-document fan-out.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        if let Some(root) = &self.root_path
            && root.is_relative()
        {
            return Err(Error::invalid_path(root, "root path must be absolute"));
        }
        if self.threads == Some(0) {
            return Err(Error::Config("thread count must be greater than zero".into()));
        }

        let mut settings = Settings::new().with(self.settings);
        for json in &self.json {
            let value: serde_json::Value = serde_json::from_str(json)?;
            let serde_json::Value::Object(members) = value else {
                return Err(Error::Config("settings JSON must be an object".into()));
            };
            settings = settings.with(members.into_iter().map(|(k, v)| (k, MetaValue::from(v))));
        }

        Ok(EngineConfig {
            root_path: self.root_path,
            input_paths: self.input_paths,
            output_path: self.output_path,
            settings,
            threads: self.threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::new();
        assert!(settings.use_cache());
        assert!(!settings.clean_output_path());

        let off = settings.with([(keys::USE_CACHE, false)]);
        assert!(!off.use_cache());
        assert!(settings.use_cache());
    }

    #[test]
    fn test_settings_accept_string_flags() {
        let settings = Settings::from_items([("usecache", "false"), ("CleanOutputPath", "true")]);
        assert!(!settings.use_cache());
        assert!(settings.clean_output_path());
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .root_path("/site")
            .input_path("content")
            .input_path("extra")
            .output_path("public")
            .setting("Host", "example.com")
            .use_cache(false)
            .threads(2)
            .build()
            .unwrap();

        assert_eq!(config.threads, Some(2));
        assert!(!config.settings.use_cache());
        assert_eq!(config.settings.get_as::<String>("host").as_deref(), Some("example.com"));

        let mut fs = FileSystem::new();
        config.apply(&mut fs).unwrap();
        assert_eq!(fs.root_path().full_path(), "/site");
        assert_eq!(
            fs.input_paths().iter().map(|p| p.full_path()).collect::<Vec<_>>(),
            vec!["content", "extra"]
        );
        assert_eq!(fs.output_path().full_path(), "public");
    }

    #[test]
    fn test_settings_json() {
        let config = ConfigBuilder::new()
            .setting("Title", "Old")
            .settings_json(r#"{ "Title": "New", "PageSize": 10, "Tags": ["a", "b"] }"#)
            .build()
            .unwrap();
        let settings = config.settings;
        assert_eq!(settings.get_as::<String>("Title").as_deref(), Some("New"));
        assert_eq!(settings.get_as::<i64>("pagesize"), Some(10));
        assert_eq!(settings.get_as::<Vec<String>>("Tags"), Some(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_build_validation() {
        let err = ConfigBuilder::new().root_path("relative").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let err = ConfigBuilder::new().threads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ConfigBuilder::new().settings_json("[1, 2]").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ConfigBuilder::new().settings_json("{ nope").build().unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
