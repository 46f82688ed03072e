use tracing::debug;

use super::hasher::{destination_fragment, hash_destination};
use super::uri::UriBuilder;
use crate::analysis::TextAnalysisCache;
use crate::config::{CollectionConfig, CollectionSet, ExportConfig};
use crate::errors::{LinkError, Result};
use crate::index::{FreeTextResult, SearchGateway};
use crate::markup::{BookmarkElement, LinkElement};
use crate::types::{Clause, FileContext, IndexedRecord, ResolutionOutcome, SearchField};

/// Detail recorded when a link names a collection outside the configured set.
pub const OUT_OF_SCOPE_DETAIL: &str = "destination infobase is external to configuration set";

/// Run-wide switches of the resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub resolve_jump_links: bool,
    pub resolve_query_links: bool,
    /// Hash jump link fragments with the host collection id.
    pub legacy_fragment_hashing: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            resolve_jump_links: true,
            resolve_query_links: true,
            legacy_fragment_hashing: false,
        }
    }
}

impl ResolveOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            resolve_jump_links: config.resolve_jump_links(),
            resolve_query_links: config.resolve_query_links(),
            legacy_fragment_hashing: config.legacy_fragment_hashing,
        }
    }
}

/// The document currently being processed.
#[derive(Debug, Clone, Copy)]
pub struct DocumentScope<'s> {
    /// Collection the document belongs to.
    pub collection: &'s CollectionConfig,
    pub file: &'s FileContext,
}

/// Resolves bookmarks, query links and jump links against the index.
///
/// Owns every policy decision; applying the outcomes to markup is left to
/// [`super::process_document`].
pub struct LinkResolver<'a> {
    collections: &'a CollectionSet,
    profiles: &'a TextAnalysisCache,
    gateway: &'a dyn SearchGateway,
    uris: &'a UriBuilder,
    options: ResolveOptions,
}

impl<'a> LinkResolver<'a> {
    pub fn new(
        collections: &'a CollectionSet,
        profiles: &'a TextAnalysisCache,
        gateway: &'a dyn SearchGateway,
        uris: &'a UriBuilder,
        options: ResolveOptions,
    ) -> Self {
        Self {
            collections,
            profiles,
            gateway,
            uris,
            options,
        }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Anchor id given to a bookmark of the current document.
    pub fn bookmark_anchor(&self, scope: &DocumentScope<'_>, bookmark: &BookmarkElement) -> String {
        hash_destination(&scope.collection.id, &bookmark.name)
    }

    /// Resolves one link of either kind.
    pub fn resolve(&self, scope: &DocumentScope<'_>, link: &LinkElement) -> Result<ResolutionOutcome> {
        match link {
            LinkElement::Query { collection, query } => {
                self.resolve_query(scope, collection.as_deref(), query)
            }
            LinkElement::Destination { collection, name } => {
                self.resolve_destination(scope, collection.as_deref(), name)
            }
        }
    }

    /// Picks the collection a link targets: the referenced one, or the
    /// current one when the link names none.
    fn target_collection<'s>(
        &'s self,
        scope: &DocumentScope<'s>,
        reference: Option<&str>,
    ) -> Option<&'s CollectionConfig> {
        match reference {
            None => Some(scope.collection),
            Some(reference) => self.collections.lookup(reference),
        }
    }

    /// Resolves a query link by running its (entity-encoded) query against
    /// the target collection and linking to the first hit.
    pub fn resolve_query(
        &self,
        scope: &DocumentScope<'_>,
        reference: Option<&str>,
        raw_query: &str,
    ) -> Result<ResolutionOutcome> {
        let Some(target) = self.target_collection(scope, reference) else {
            return Ok(ResolutionOutcome::OutOfScope {
                detail: OUT_OF_SCOPE_DETAIL.to_string(),
            });
        };

        let profile = self
            .profiles
            .get(&target.id)
            .ok_or_else(|| LinkError::Configuration {
                message: format!("no analysis profile loaded for collection '{}'", target.id),
            })?;

        // The markup parser only undoes XML escaping; attribute values still
        // carry one layer of entity encoding from conversion, removed here.
        let query = html_escape::decode_html_entities(raw_query);
        match self.gateway.free_text_search(&query, profile) {
            Err(LinkError::QueryParse(e)) => {
                debug!(query = %query, error = %e, "failed to parse query link");
                Ok(ResolutionOutcome::ParseError {
                    detail: format!("failed to parse query: {e}"),
                })
            }
            Err(e) => Err(e),
            Ok(FreeTextResult {
                normalized,
                hit: None,
            }) => {
                debug!(query = %query, normalized = %normalized, "no results for query link");
                Ok(ResolutionOutcome::NoResult {
                    detail: format!("no results for query {normalized}"),
                })
            }
            Ok(FreeTextResult {
                hit: Some(handle), ..
            }) => {
                let record = self.gateway.fetch(handle)?;
                self.outcome_for(&record, scope.file, None)
            }
        }
    }

    /// Resolves a jump link by exact lookup of the bookmark name, preferring
    /// records of the target collection.
    pub fn resolve_destination(
        &self,
        scope: &DocumentScope<'_>,
        reference: Option<&str>,
        name: &str,
    ) -> Result<ResolutionOutcome> {
        let Some(target) = self.target_collection(scope, reference) else {
            return Ok(ResolutionOutcome::OutOfScope {
                detail: OUT_OF_SCOPE_DETAIL.to_string(),
            });
        };

        let clauses = [
            Clause::must(SearchField::Destinations, name),
            Clause::should(SearchField::CollectionId, &target.id),
        ];

        let Some(handle) = self.gateway.structured_search(&clauses)? else {
            debug!(collection = %target.id, destination = %name, "jump destination not found");
            return Ok(ResolutionOutcome::NoResult {
                detail: format!(
                    "no corresponding jump destination found for infobase {} and bookmark '{}'.",
                    target.id, name
                ),
            });
        };

        let record = self.gateway.fetch(handle)?;
        // Bookmarks are hashed with the id of the collection that owns them.
        let anchor_collection = if self.options.legacy_fragment_hashing {
            scope.collection.id.as_str()
        } else {
            record.collection_id.as_str()
        };
        let fragment = destination_fragment(anchor_collection, name);
        self.outcome_for(&record, scope.file, Some(&fragment))
    }

    fn outcome_for(
        &self,
        record: &IndexedRecord,
        host: &FileContext,
        fragment_override: Option<&str>,
    ) -> Result<ResolutionOutcome> {
        match self.uris.build_uri(record, host, fragment_override) {
            Ok(uri) => Ok(ResolutionOutcome::Resolved { uri }),
            Err(LinkError::MissingPrerequisite { message }) => {
                Ok(ResolutionOutcome::MissingPrerequisite { detail: message })
            }
            Err(e) => Err(e),
        }
    }
}
