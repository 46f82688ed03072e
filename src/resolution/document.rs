use tracing::debug;

use super::resolver::{DocumentScope, LinkResolver};
use crate::errors::{LinkError, Result};
use crate::markup::{
    BookmarkElement, Element, LinkElement, Visit, ANCHOR_TAG, FOLIO_ID_ATTR, RECORD_ID_ATTR,
};
use crate::report::{DiagnosticEntry, ReportSink};
use crate::types::{DiagnosticStream, LinkKind, ResolutionOutcome, ResolutionStats};

/// Attribute recording the outcome of a link: `"true"` or the failure detail.
pub const RESOLVED_ATTR: &str = "resolved";

fn broken_label(kind: LinkKind, outcome: &ResolutionOutcome) -> &'static str {
    let out_of_scope = matches!(outcome, ResolutionOutcome::OutOfScope { .. });
    match (kind, out_of_scope) {
        (LinkKind::Query, false) => "Broken query link",
        (LinkKind::Query, true) => "Out-of-scope query link",
        (LinkKind::Destination, false) => "Broken jump link",
        (LinkKind::Destination, true) => "Out-of-scope jump link",
    }
}

fn unresolved_label(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Query => "Query link",
        LinkKind::Destination => "Jump link",
    }
}

fn report(
    reports: &dyn ReportSink,
    stream: DiagnosticStream,
    label: &str,
    document_id: &str,
    element: &Element,
) -> Result<()> {
    let element_xml = element.to_xml_string();
    reports.append(
        stream,
        &DiagnosticEntry {
            label,
            document_id,
            element_xml: &element_xml,
        },
    )
}

/// Rewrites the bookmarks and links of one document in place.
///
/// Bookmarks become anchors first, then query links and jump links are
/// resolved in document order. Resolved links become anchors with an `href`.
/// Broken query links stay in place; broken jump links are pulled, leaving
/// their content behind. Every failure and every link skipped because its
/// kind is disabled is appended to the matching diagnostic stream.
pub fn process_document(
    resolver: &LinkResolver<'_>,
    reports: &dyn ReportSink,
    tree: &mut Element,
    scope: &DocumentScope<'_>,
) -> Result<ResolutionStats> {
    let options = resolver.options();
    let document_id = tree
        .get(RECORD_ID_ATTR)
        .or_else(|| tree.get(FOLIO_ID_ATTR))
        .map(str::to_string)
        .unwrap_or_else(|| scope.file.relative_path.clone());

    let mut stats = ResolutionStats {
        documents: 1,
        ..ResolutionStats::default()
    };

    if options.resolve_jump_links {
        tree.visit_mut(&mut |element: &mut Element| -> Result<Visit> {
            if let Some(bookmark) = BookmarkElement::from_element(element) {
                element.set("id", &resolver.bookmark_anchor(scope, &bookmark));
                element.set_tag(ANCHOR_TAG);
                stats.bookmarks += 1;
            }
            Ok(Visit::Keep)
        })?;
    }

    for (kind, enabled) in [
        (LinkKind::Query, options.resolve_query_links),
        (LinkKind::Destination, options.resolve_jump_links),
    ] {
        tree.visit_mut(&mut |element: &mut Element| -> Result<Visit> {
            let Some(link) = LinkElement::from_element(element).filter(|l| l.kind() == kind) else {
                return Ok(Visit::Keep);
            };

            if !enabled {
                report(
                    reports,
                    DiagnosticStream::unresolved(kind),
                    unresolved_label(kind),
                    &document_id,
                    element,
                )?;
                stats.record_skipped(kind);
                return Ok(Visit::Keep);
            }

            let outcome = resolver.resolve(scope, &link)?;
            if let ResolutionOutcome::MissingPrerequisite { detail } = &outcome {
                return Err(LinkError::MissingPrerequisite {
                    message: detail.clone(),
                });
            }
            stats.record(kind, &outcome);
            element.set(RESOLVED_ATTR, outcome.detail());

            if let Some(uri) = outcome.uri() {
                element.set("href", uri);
                element.set_tag(ANCHOR_TAG);
                return Ok(Visit::Keep);
            }

            debug!(document = %document_id, detail = %outcome.detail(), "broken link");
            report(
                reports,
                DiagnosticStream::broken(kind),
                broken_label(kind, &outcome),
                &document_id,
                element,
            )?;
            Ok(match kind {
                LinkKind::Query => Visit::Keep,
                LinkKind::Destination => Visit::Pull,
            })
        })?;
    }

    Ok(stats)
}
