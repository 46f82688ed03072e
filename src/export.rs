use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::TextAnalysisCache;
use crate::config::{resolve_relative, should_include_file, ExportConfig};
use crate::errors::{LinkError, Result};
use crate::index::{IndexDatabase, IndexStats, SearchGateway, SqliteGateway};
use crate::markup::parse_document;
use crate::report::FileReportSink;
use crate::resolution::ResolveOptions;
use crate::session;
use crate::types::{FileContext, ResolutionStats};

/// Extension given to exported documents.
pub const OUTPUT_EXTENSION: &str = "html";

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Number of documents written.
    pub documents: usize,
    /// True when no index was available and documents were copied verbatim.
    pub passthrough: bool,
    pub stats: ResolutionStats,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Index health as reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub index_path: PathBuf,
    pub stats: IndexStats,
    /// Searchable fields per configured collection, in configuration order.
    pub profiles: Vec<(String, Vec<String>)>,
}

/// Path of a document's output file relative to the output root.
pub fn output_relative_path(collection_id: &str, document: &str) -> String {
    let renamed = Path::new(document).with_extension(OUTPUT_EXTENSION);
    format!(
        "{}/{}",
        collection_id,
        renamed.to_string_lossy().replace('\\', "/")
    )
}

/// Lists the documents of one collection directory, relative to it and
/// sorted, respecting the configured include and exclude patterns.
fn scan_documents(dir: &Path, config: &ExportConfig) -> Vec<String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            let rel_str = relative.to_string_lossy().replace('\\', "/");
            if should_include_file(&rel_str, config) {
                files.push(rel_str);
            }
        }
    }
    files
}

/// Runs one export: every document of every configured collection is
/// resolved against the index and written under the output directory.
///
/// Without a usable index the documents are copied unchanged.
pub fn run_export(config: &ExportConfig, base_dir: &Path) -> Result<ExportSummary> {
    let start = Instant::now();
    let collections = config.collection_set();
    let index_path = resolve_relative(base_dir, &config.index_path);
    let input_dir = resolve_relative(base_dir, &config.input_dir);
    let output_dir = resolve_relative(base_dir, &config.output_dir);
    let report_dir = resolve_relative(base_dir, &config.report_dir);

    let reports = Arc::new(FileReportSink::new(&report_dir));
    let mut handle = session::initialize(
        collections.clone(),
        &index_path,
        ResolveOptions::from_config(config),
        reports,
    )?;

    let mut documents = 0;
    for collection in collections.iter() {
        let collection_dir = input_dir.join(&collection.id);
        if !collection_dir.is_dir() {
            warn!(collection = %collection.id, dir = %collection_dir.display(), "no input directory for collection");
            continue;
        }

        for document in scan_documents(&collection_dir, config) {
            let source = collection_dir.join(&document);
            let output_rel = output_relative_path(&collection.id, &document);
            let target = output_dir.join(&output_rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            if handle.is_passthrough() {
                fs::copy(&source, &target)?;
            } else {
                let xml = fs::read_to_string(&source)?;
                let mut tree = parse_document(&xml, &output_rel)?;
                handle.resolve_document(&mut tree, &collection.id, &FileContext::new(&output_rel))?;
                fs::write(&target, tree.to_xml_string())?;
            }
            debug!(document = %output_rel, "exported");
            documents += 1;
        }
    }

    let passthrough = handle.is_passthrough();
    let stats = handle.shutdown()?;
    let summary = ExportSummary {
        documents,
        passthrough,
        stats,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        documents = summary.documents,
        passthrough = summary.passthrough,
        duration_ms = summary.duration_ms,
        "export complete"
    );
    Ok(summary)
}

/// Opens the configured index and checks that every collection has a root
/// record with a readable field profile.
pub fn check_index(config: &ExportConfig, base_dir: &Path) -> Result<IndexStatus> {
    let index_path = resolve_relative(base_dir, &config.index_path);
    let db = IndexDatabase::open_read_only(&index_path)?;
    let stats = db.stats()?;

    let collections = config.collection_set();
    let mut gateway = SqliteGateway::new(db);
    let profiles = TextAnalysisCache::load(&collections, &gateway);
    gateway.close();
    let profiles = profiles?;

    let profiles = collections
        .iter()
        .map(|collection| {
            let fields = profiles
                .get(&collection.id)
                .map(|p| p.fields().map(|(name, _)| name.to_string()).collect())
                .ok_or_else(|| LinkError::Configuration {
                    message: format!("no profile loaded for collection '{}'", collection.id),
                })?;
            Ok((collection.id.clone(), fields))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(IndexStatus {
        index_path,
        stats,
        profiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_relative_path_renames_extension() {
        assert_eq!(
            output_relative_path("manual_a", "chapters/intro.xml"),
            "manual_a/chapters/intro.html"
        );
        assert_eq!(output_relative_path("m", "plain"), "m/plain.html");
    }
}
