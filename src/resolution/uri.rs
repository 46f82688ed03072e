use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::errors::{LinkError, Result};
use crate::types::{FileContext, IndexedRecord};

/// Characters escaped inside a URI path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The exporter's path-resolution service.
pub trait PathResolver {
    /// Returns the URI of `record`'s output file as seen from the host
    /// document, or `None` if the record has no output location.
    fn resolve(&self, record: &IndexedRecord, host: &FileContext) -> Option<String>;
}

/// Output layout where each collection is exported into a directory named
/// after its id, and record paths are relative to that directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportLayout;

impl ExportLayout {
    /// Path of a record's output file relative to the output root.
    pub fn output_path(record: &IndexedRecord) -> Option<String> {
        let relative = record
            .relative_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())?;
        Some(format!(
            "{}/{}",
            record.collection_id,
            relative.trim_start_matches('/')
        ))
    }
}

impl PathResolver for ExportLayout {
    fn resolve(&self, record: &IndexedRecord, host: &FileContext) -> Option<String> {
        let target = Self::output_path(record)?;
        Some(relative_uri(&host.relative_path, &target))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Computes the relative URI from the file `from_file` to the file `to_file`,
/// both given relative to the same root.
pub fn relative_uri(from_file: &str, to_file: &str) -> String {
    let mut from_dirs = segments(from_file);
    from_dirs.pop();
    let to = segments(to_file);
    let to_dirs = &to[..to.len().saturating_sub(1)];

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(from_dirs.len() - common)
        .collect();
    parts.extend(
        to[common..]
            .iter()
            .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string()),
    );
    parts.join("/")
}

/// Computes output-relative URIs for resolved records.
pub struct UriBuilder {
    paths: Box<dyn PathResolver>,
}

impl Default for UriBuilder {
    fn default() -> Self {
        Self::new(Box::new(ExportLayout))
    }
}

impl UriBuilder {
    pub fn new(paths: Box<dyn PathResolver>) -> Self {
        Self { paths }
    }

    /// Builds the URI of `record` as linked from `host`.
    ///
    /// `fragment_override` (`"#token"`) replaces the record's own fragment.
    /// Fails with [`LinkError::MissingPrerequisite`] when no base URI can be
    /// produced, which means output paths were never assigned to the index.
    pub fn build_uri(
        &self,
        record: &IndexedRecord,
        host: &FileContext,
        fragment_override: Option<&str>,
    ) -> Result<String> {
        let base = self
            .paths
            .resolve(record, host)
            .ok_or_else(|| LinkError::MissingPrerequisite {
                message: format!(
                    "a record of collection '{}' has no output path; hyperlinks cannot be resolved \
                     unless output paths are assigned to records before indexing",
                    record.collection_id
                ),
            })?;

        let fragment = fragment_override
            .or(record.uri_fragment.as_deref())
            .unwrap_or_default();
        Ok(format!("{base}{fragment}"))
    }
}
