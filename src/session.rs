use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::TextAnalysisCache;
use crate::config::CollectionSet;
use crate::errors::{LinkError, Result};
use crate::index::{IndexDatabase, SearchGateway, SqliteGateway};
use crate::markup::Element;
use crate::report::ReportSink;
use crate::resolution::{
    process_document, DocumentScope, LinkResolver, PathResolver, ResolveOptions, UriBuilder,
};
use crate::types::{FileContext, ResolutionStats};

/// Everything resolution reads, built once at run start.
struct ResolverContext {
    collections: CollectionSet,
    profiles: TextAnalysisCache,
    gateway: Box<dyn SearchGateway>,
    uris: UriBuilder,
}

/// An initialized resolution run.
///
/// A handle without an index is in passthrough mode: documents are never
/// touched. The index connection is not shared between threads, so parallel
/// processing needs one handle per worker.
pub struct ResolverHandle {
    context: Option<ResolverContext>,
    options: ResolveOptions,
    reports: Arc<dyn ReportSink>,
    stats: ResolutionStats,
}

/// Opens the index and loads every collection's analysis profile.
///
/// A missing or unreadable index is not an error: the returned handle is in
/// passthrough mode. A collection without a root record in the index is.
pub fn initialize(
    collections: CollectionSet,
    index_path: &Path,
    options: ResolveOptions,
    reports: Arc<dyn ReportSink>,
) -> Result<ResolverHandle> {
    info!(
        resolve_jump_links = options.resolve_jump_links,
        resolve_query_links = options.resolve_query_links,
        "link resolution options"
    );

    let db = match IndexDatabase::open_read_only(index_path) {
        Ok(db) => db,
        Err(e) => {
            warn!(
                index = %index_path.display(),
                error = %e,
                "failed to open link index; links will not be resolved"
            );
            return Ok(ResolverHandle::passthrough(options, reports));
        }
    };

    info!(index = %index_path.display(), collections = collections.len(), "opened link index");
    ResolverHandle::with_gateway(collections, Box::new(SqliteGateway::new(db)), options, reports)
}

impl ResolverHandle {
    /// A handle that leaves every document untouched.
    pub fn passthrough(options: ResolveOptions, reports: Arc<dyn ReportSink>) -> Self {
        Self {
            context: None,
            options,
            reports,
            stats: ResolutionStats::default(),
        }
    }

    /// Builds an active handle over any search gateway.
    pub fn with_gateway(
        collections: CollectionSet,
        gateway: Box<dyn SearchGateway>,
        options: ResolveOptions,
        reports: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        let profiles = TextAnalysisCache::load(&collections, gateway.as_ref())?;
        Ok(Self {
            context: Some(ResolverContext {
                collections,
                profiles,
                gateway,
                uris: UriBuilder::default(),
            }),
            options,
            reports,
            stats: ResolutionStats::default(),
        })
    }

    /// Replaces the default output layout used to compute URIs.
    pub fn with_path_resolver(mut self, paths: Box<dyn PathResolver>) -> Self {
        if let Some(context) = self.context.as_mut() {
            context.uris = UriBuilder::new(paths);
        }
        self
    }

    pub fn is_passthrough(&self) -> bool {
        self.context.is_none()
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolves the links of one document belonging to `collection_id`.
    pub fn resolve_document(
        &mut self,
        tree: &mut Element,
        collection_id: &str,
        file: &FileContext,
    ) -> Result<ResolutionStats> {
        let Some(context) = &self.context else {
            return Ok(ResolutionStats::default());
        };

        let collection =
            context
                .collections
                .by_id(collection_id)
                .ok_or_else(|| LinkError::Configuration {
                    message: format!(
                        "document '{}' belongs to collection '{}', which is not configured",
                        file.relative_path, collection_id
                    ),
                })?;

        let resolver = LinkResolver::new(
            &context.collections,
            &context.profiles,
            context.gateway.as_ref(),
            &context.uris,
            self.options,
        );
        let scope = DocumentScope { collection, file };

        let stats = process_document(&resolver, self.reports.as_ref(), tree, &scope)?;
        self.stats.merge(&stats);
        Ok(stats)
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    /// Releases the index, flushes the reports and returns the run totals.
    pub fn shutdown(mut self) -> Result<ResolutionStats> {
        if let Some(context) = self.context.as_mut() {
            context.gateway.close();
        }
        self.reports.flush()?;

        let stats = self.stats;
        info!(
            documents = stats.documents,
            bookmarks = stats.bookmarks,
            query_resolved = stats.query_links.resolved,
            query_no_result = stats.query_links.no_result,
            query_parse_errors = stats.query_links.parse_errors,
            query_out_of_scope = stats.query_links.out_of_scope,
            query_skipped = stats.query_links.skipped,
            jump_resolved = stats.jump_links.resolved,
            jump_broken = stats.jump_links.no_result,
            jump_out_of_scope = stats.jump_links.out_of_scope,
            jump_skipped = stats.jump_links.skipped,
            "link resolution finished"
        );
        Ok(stats)
    }
}
