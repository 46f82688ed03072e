use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

/// Default name of the configuration file.
pub const CONFIG_FILENAME: &str = "infolink.json";

/// One infobase taking part in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Identifier stored in the index as `collectionId`.
    pub id: String,
    /// Display name; links refer to collections by this name.
    #[serde(default)]
    pub name: String,
}

impl CollectionConfig {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the display name, falling back to the id when none was given.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// The ordered, run-constant set of collections being exported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSet {
    collections: Vec<CollectionConfig>,
}

impl CollectionSet {
    pub fn new(collections: Vec<CollectionConfig>) -> Self {
        Self { collections }
    }

    pub fn by_id(&self, id: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.display_name() == name)
    }

    /// Looks up a collection referenced from a link: by name first, then by id.
    pub fn lookup(&self, reference: &str) -> Option<&CollectionConfig> {
        self.by_name(reference).or_else(|| self.by_id(reference))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Configuration for an export run.
///
/// Paths are relative to the directory holding the configuration file unless
/// they are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Collections exported together, in order.
    pub collections: Vec<CollectionConfig>,
    /// Location of the pre-built link index.
    pub index_path: String,
    /// Directory holding one sub-directory of documents per collection id.
    pub input_dir: String,
    /// Directory receiving the rewritten documents.
    pub output_dir: String,
    /// Directory receiving the diagnostic streams.
    pub report_dir: String,
    /// Glob patterns for document files to process.
    pub include: Vec<String>,
    /// Glob patterns for document files to skip.
    pub exclude: Vec<String>,
    /// Whether bookmarks and jump links are rewritten. Unset means `true`.
    pub resolve_jump_links: Option<bool>,
    /// Whether query links are rewritten. Unset means `true`.
    pub resolve_query_links: Option<bool>,
    /// Hash jump link fragments with the host collection id instead of the
    /// target collection id, reproducing older exports.
    pub legacy_fragment_hashing: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            version: 1,
            collections: Vec::new(),
            index_path: "index/links.db".to_string(),
            input_dir: "input".to_string(),
            output_dir: "output".to_string(),
            report_dir: "reports".to_string(),
            include: vec!["**/*.xml".to_string()],
            exclude: vec![".*/**".to_string(), "**/*.tmp".to_string()],
            resolve_jump_links: None,
            resolve_query_links: None,
            legacy_fragment_hashing: false,
        }
    }
}

impl ExportConfig {
    /// Builds the collection set described by this configuration.
    pub fn collection_set(&self) -> CollectionSet {
        CollectionSet::new(self.collections.clone())
    }

    pub fn resolve_jump_links(&self) -> bool {
        self.resolve_jump_links.unwrap_or(true)
    }

    pub fn resolve_query_links(&self) -> bool {
        self.resolve_query_links.unwrap_or(true)
    }
}

/// Resolves a configured path against `base_dir` unless it is absolute.
pub fn resolve_relative(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Returns the path to the default configuration file inside `project_root`.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// Files ending in `.toml` are read as TOML, anything else as JSON.
pub fn load_config(config_path: &Path) -> Result<ExportConfig> {
    let contents = fs::read_to_string(config_path).map_err(|e| LinkError::Configuration {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let is_toml = config_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: ExportConfig = if is_toml {
        toml::from_str(&contents).map_err(|e| LinkError::Configuration {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?
    } else {
        serde_json::from_str(&contents).map_err(|e| LinkError::Configuration {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Saves the configuration as JSON using an atomic write.
pub fn save_config(config_path: &Path, config: &ExportConfig) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| LinkError::Configuration {
                message: format!(
                    "failed to create config directory '{}': {}",
                    parent.display(),
                    e
                ),
            })?;
        }
    }

    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| LinkError::Configuration {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| LinkError::Configuration {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, config_path).map_err(|e| LinkError::Configuration {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}

/// Rejects configurations with empty or duplicate collection ids.
fn validate_config(config: &ExportConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for collection in &config.collections {
        if collection.id.trim().is_empty() {
            return Err(LinkError::Configuration {
                message: "collection with an empty id".to_string(),
            });
        }
        if !seen.insert(collection.id.as_str()) {
            return Err(LinkError::Configuration {
                message: format!("collection '{}' is configured twice", collection.id),
            });
        }
    }
    Ok(())
}

/// Determines whether a document file should be processed based on the
/// configuration's include and exclude glob patterns.
///
/// Exclude patterns take precedence.
pub fn should_include_file(file_path: &str, config: &ExportConfig) -> bool {
    let match_opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    for pattern_str in &config.exclude {
        if let Ok(pattern) = Pattern::new(pattern_str) {
            if pattern.matches_with(file_path, match_opts) {
                return false;
            }
        }
    }

    config.include.iter().any(|pattern_str| {
        Pattern::new(pattern_str)
            .map(|pattern| pattern.matches_with(file_path, match_opts))
            .unwrap_or(false)
    })
}
