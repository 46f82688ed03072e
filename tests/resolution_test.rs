use std::sync::Arc;

use infolink::analysis::TextAnalysisCache;
use infolink::config::{CollectionConfig, CollectionSet};
use infolink::errors::LinkError;
use infolink::index::{IndexDatabase, RecordInput, SqliteGateway};
use infolink::markup::{parse_document, Element};
use infolink::report::MemoryReportSink;
use infolink::resolution::*;
use infolink::session::ResolverHandle;
use infolink::types::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const ROOT_XML: &str = r#"<record><field-def name="keyword"/></record>"#;
const HOST: &str = "manual_b/page.html";

fn collections() -> CollectionSet {
    CollectionSet::new(vec![
        CollectionConfig::new("manual_a", "Manual A"),
        CollectionConfig::new("manual_b", "Manual B"),
    ])
}

/// Helper: an index with two collections and a few linkable records.
fn build_index(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("links.db");
    let db = IndexDatabase::initialize(&path).expect("failed to initialize index");
    db.insert_records(&[
        RecordInput::root("manual_a", ROOT_XML),
        RecordInput::root("manual_b", ROOT_XML),
        RecordInput::document("manual_a", "section", "intro.html")
            .with_destination("intro")
            .with_field("text", "Installing the printer")
            .with_field("keyword", "setup"),
        RecordInput::document("manual_b", "section", "page.html")
            .with_destination("setup")
            .with_field("text", "Scanner setup"),
        RecordInput::document("manual_b", "section", "faq/answers.html")
            .with_uri_fragment("#q1")
            .with_field("text", "Frequently asked questions"),
        RecordInput {
            collection_id: "manual_a".to_string(),
            level: "section".to_string(),
            destinations: vec!["orphan".to_string()],
            ..RecordInput::default()
        },
    ])
    .expect("failed to insert records");
    db.close();
    path
}

struct Fixture {
    handle: ResolverHandle,
    reports: Arc<MemoryReportSink>,
    _dir: TempDir,
}

fn fixture(options: ResolveOptions) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = build_index(&dir);
    let gateway = SqliteGateway::new(IndexDatabase::open_read_only(&path).unwrap());
    let reports = Arc::new(MemoryReportSink::new());
    let handle =
        ResolverHandle::with_gateway(collections(), Box::new(gateway), options, reports.clone())
            .unwrap();
    Fixture {
        handle,
        reports,
        _dir: dir,
    }
}

fn resolve_in_b(fixture: &mut Fixture, body: &str) -> (Element, ResolutionStats) {
    let mut tree = parse_document(&format!("<doc recordId=\"b-page\">{body}</doc>"), HOST).unwrap();
    let stats = fixture
        .handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST))
        .unwrap();
    (tree, stats)
}

fn xml_of(body: &str) -> String {
    format!("<doc recordId=\"b-page\">{body}</doc>")
}

#[test]
fn test_jump_link_across_collections() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(
        &mut f,
        r#"<link infobase="Manual A" jumpDestination="intro">Intro</link>"#,
    );

    let expected_href = format!("../manual_a/intro.html#{}", hash_destination("manual_a", "intro"));
    assert_eq!(
        tree.to_xml_string(),
        xml_of(&format!(
            r#"<a infobase="Manual A" jumpDestination="intro" resolved="true" href="{expected_href}">Intro</a>"#
        ))
    );
    assert_eq!(stats.jump_links.resolved, 1);
    assert_eq!(f.reports.total(), 0);
}

#[test]
fn test_jump_link_defaults_to_current_collection() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, _) = resolve_in_b(&mut f, r#"<link jumpDestination="setup">Setup</link>"#);
    let link = tree.descendants()[0];
    assert_eq!(link.tag(), "a");
    assert_eq!(
        link.get("href"),
        Some(format!("page.html#{}", hash_destination("manual_b", "setup")).as_str())
    );
}

#[test]
fn test_collection_reference_by_id() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, _) = resolve_in_b(
        &mut f,
        r#"<link infobase="manual_a" jumpDestination="intro">Intro</link>"#,
    );
    assert_eq!(tree.descendants()[0].get(RESOLVED_ATTR), Some("true"));
}

#[test]
fn test_broken_jump_link_is_pulled_and_reported() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(
        &mut f,
        r#"<p>See <link jumpDestination="nowhere">the <i>missing</i> page</link>.</p>"#,
    );

    assert_eq!(
        tree.to_xml_string(),
        xml_of("<p>See the <i>missing</i> page.</p>")
    );
    assert_eq!(stats.jump_links.no_result, 1);

    let entries = f.reports.entries(DiagnosticStream::BrokenJumpLinks);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("Broken jump link in record b-page: <link"));
    assert!(entries[0].contains(
        "no corresponding jump destination found for infobase manual_b and bookmark"
    ));
}

#[test]
fn test_out_of_scope_links() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(
        &mut f,
        r#"<link infobase="Manual Z" jumpDestination="intro">gone</link><link infobase="Manual Z" query="printer">kept</link>"#,
    );

    assert_eq!(
        tree.to_xml_string(),
        xml_of(&format!(
            r#"gone<link infobase="Manual Z" query="printer" resolved="{OUT_OF_SCOPE_DETAIL}">kept</link>"#
        ))
    );
    assert_eq!(stats.jump_links.out_of_scope, 1);
    assert_eq!(stats.query_links.out_of_scope, 1);

    let jump = f.reports.entries(DiagnosticStream::BrokenJumpLinks);
    assert!(jump[0].starts_with("Out-of-scope jump link"));
    let query = f.reports.entries(DiagnosticStream::BrokenQueryLinks);
    assert!(query[0].starts_with("Out-of-scope query link"));
}

#[test]
fn test_query_link_resolves_to_first_hit() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(
        &mut f,
        r#"<link infobase="Manual A" query="printer">Printing</link><link query="frequently">FAQ</link>"#,
    );

    let links = tree.descendants();
    assert_eq!(links[0].get("href"), Some("../manual_a/intro.html"));
    assert_eq!(links[1].get("href"), Some("faq/answers.html#q1"));
    assert_eq!(stats.query_links.resolved, 2);
}

#[test]
fn test_query_link_decodes_entities() {
    let mut f = fixture(ResolveOptions::default());
    let mut tree = Element::new("doc").with_child(
        Element::new("link")
            .with_attr("infobase", "Manual A")
            .with_attr("query", "printer &amp; install*"),
    );
    f.handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST))
        .unwrap();
    assert_eq!(tree.descendants()[0].get(RESOLVED_ATTR), Some("true"));
}

#[test]
fn test_query_link_without_results_is_kept() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(&mut f, r#"<link query="zebra">Zebras</link>"#);

    let link = tree.descendants()[0];
    assert_eq!(link.tag(), "link");
    assert_eq!(link.get(RESOLVED_ATTR), Some("no results for query text:zebra"));
    assert_eq!(link.get("href"), None);
    assert_eq!(stats.query_links.no_result, 1);
    assert_eq!(f.reports.entries(DiagnosticStream::BrokenQueryLinks).len(), 1);
}

#[test]
fn test_query_link_parse_error_is_kept() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(&mut f, r#"<link query="(scanner">Scanners</link>"#);

    let link = tree.descendants()[0];
    assert_eq!(link.tag(), "link");
    assert!(link
        .get(RESOLVED_ATTR)
        .is_some_and(|d| d.starts_with("failed to parse query:")));
    assert_eq!(stats.query_links.parse_errors, 1);
}

#[test]
fn test_bookmarks_become_anchors() {
    let mut f = fixture(ResolveOptions::default());
    let (tree, stats) = resolve_in_b(&mut f, r#"<bookmark name="setup"/>"#);

    assert_eq!(
        tree.to_xml_string(),
        xml_of(&format!(
            r#"<a name="setup" id="{}"/>"#,
            hash_destination("manual_b", "setup")
        ))
    );
    assert_eq!(stats.bookmarks, 1);
}

#[test]
fn test_disabled_jump_links_are_left_alone() {
    let mut f = fixture(ResolveOptions {
        resolve_jump_links: false,
        ..ResolveOptions::default()
    });
    let body = r#"<bookmark name="setup"/><link jumpDestination="intro">x</link><link jumpDestination="nowhere">y</link>"#;
    let (tree, stats) = resolve_in_b(&mut f, &format!("{body}<link query=\"scanner\">z</link>"));

    assert!(tree.to_xml_string().starts_with(&xml_of(body).replace("</doc>", "")));
    assert_eq!(stats.bookmarks, 0);
    assert_eq!(stats.jump_links.skipped, 2);
    assert_eq!(stats.query_links.resolved, 1);
    assert_eq!(f.reports.entries(DiagnosticStream::UnresolvedJumpLinks).len(), 2);
    assert!(f.reports.entries(DiagnosticStream::BrokenJumpLinks).is_empty());
}

#[test]
fn test_disabled_query_links_are_left_alone() {
    let mut f = fixture(ResolveOptions {
        resolve_query_links: false,
        ..ResolveOptions::default()
    });
    let body = r#"<link query="scanner">z</link>"#;
    let (tree, stats) = resolve_in_b(&mut f, body);

    assert_eq!(tree.to_xml_string(), xml_of(body));
    assert_eq!(stats.query_links.skipped, 1);
    let entries = f.reports.entries(DiagnosticStream::UnresolvedQueryLinks);
    assert_eq!(entries, vec![format!("Query link in record b-page: {body}")]);
}

#[test]
fn test_legacy_fragment_hashing_uses_host_collection() {
    let mut f = fixture(ResolveOptions {
        legacy_fragment_hashing: true,
        ..ResolveOptions::default()
    });
    let (tree, _) = resolve_in_b(
        &mut f,
        r#"<link infobase="Manual A" jumpDestination="intro">Intro</link>"#,
    );
    assert_eq!(
        tree.descendants()[0].get("href"),
        Some(format!("../manual_a/intro.html#{}", hash_destination("manual_b", "intro")).as_str())
    );
}

#[test]
fn test_missing_output_path_is_fatal() {
    let mut f = fixture(ResolveOptions::default());
    let mut tree = parse_document(
        r#"<doc><link infobase="Manual A" jumpDestination="orphan">x</link></doc>"#,
        HOST,
    )
    .unwrap();
    let result = f
        .handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST));
    assert!(matches!(result, Err(LinkError::MissingPrerequisite { .. })));
}

#[test]
fn test_unknown_host_collection_is_rejected() {
    let mut f = fixture(ResolveOptions::default());
    let mut tree = Element::new("doc");
    let result = f
        .handle
        .resolve_document(&mut tree, "manual_z", &FileContext::new("manual_z/x.html"));
    assert!(matches!(result, Err(LinkError::Configuration { .. })));
}

#[test]
fn test_document_id_falls_back_to_path() {
    let mut f = fixture(ResolveOptions::default());
    let mut tree = parse_document(r#"<doc><link query="zebra">z</link></doc>"#, HOST).unwrap();
    f.handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST))
        .unwrap();
    let entries = f.reports.entries(DiagnosticStream::BrokenQueryLinks);
    assert!(entries[0].starts_with(&format!("Broken query link in record {HOST}:")));
}

#[test]
fn test_document_id_falls_back_to_folio_id() {
    let mut f = fixture(ResolveOptions::default());
    let mut tree =
        parse_document(r#"<doc folioId="F42"><link query="zebra">z</link></doc>"#, HOST).unwrap();
    f.handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST))
        .unwrap();
    let entries = f.reports.entries(DiagnosticStream::BrokenQueryLinks);
    assert!(entries[0].starts_with("Broken query link in record F42:"));
}

#[test]
fn test_query_attribute_is_decoded_once_after_parsing() {
    // `&amp;amp;` in the markup leaves `&amp;` in the attribute value,
    // which must decode to the `&` operator rather than an `amp;` term.
    let mut f = fixture(ResolveOptions::default());
    let mut tree = parse_document(
        r#"<doc><link infobase="Manual A" query="printer &amp;amp; install*">p</link></doc>"#,
        HOST,
    )
    .unwrap();
    assert_eq!(
        tree.descendants()[0].get("query"),
        Some("printer &amp; install*")
    );
    f.handle
        .resolve_document(&mut tree, "manual_b", &FileContext::new(HOST))
        .unwrap();
    assert_eq!(tree.descendants()[0].get(RESOLVED_ATTR), Some("true"));
}

#[test]
fn test_stats_accumulate_until_shutdown() {
    let mut f = fixture(ResolveOptions::default());
    resolve_in_b(&mut f, r#"<link jumpDestination="setup">a</link>"#);
    resolve_in_b(&mut f, r#"<link query="zebra">b</link>"#);
    assert_eq!(f.handle.stats().documents, 2);

    let Fixture { handle, _dir, .. } = f;
    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.jump_links.resolved, 1);
    assert_eq!(stats.query_links.no_result, 1);
    assert_eq!(stats.jump_links.total(), 1);
    assert_eq!(stats.query_links.total(), 1);
}

struct FlatLayout;

impl PathResolver for FlatLayout {
    fn resolve(&self, record: &IndexedRecord, _host: &FileContext) -> Option<String> {
        record
            .relative_path
            .as_ref()
            .map(|p| format!("/{}/{}", record.collection_id, p))
    }
}

#[test]
fn test_custom_path_resolver() {
    let f = fixture(ResolveOptions::default());
    let Fixture { handle, reports, _dir } = f;
    let mut f = Fixture {
        handle: handle.with_path_resolver(Box::new(FlatLayout)),
        reports,
        _dir,
    };
    let (tree, _) = resolve_in_b(&mut f, r#"<link infobase="Manual A" query="printer">p</link>"#);
    assert_eq!(tree.descendants()[0].get("href"), Some("/manual_a/intro.html"));
}

#[test]
fn test_link_resolver_outcomes() {
    let dir = TempDir::new().unwrap();
    let path = build_index(&dir);
    let gateway = SqliteGateway::new(IndexDatabase::open_read_only(&path).unwrap());
    let collections = collections();
    let profiles = TextAnalysisCache::load(&collections, &gateway).unwrap();
    let uris = UriBuilder::default();
    let resolver = LinkResolver::new(
        &collections,
        &profiles,
        &gateway,
        &uris,
        ResolveOptions::default(),
    );

    let file = FileContext::new(HOST);
    let scope = DocumentScope {
        collection: collections.by_id("manual_b").unwrap(),
        file: &file,
    };

    assert_eq!(
        resolver.resolve_query(&scope, Some("Manual A"), "keyword:setup").unwrap(),
        ResolutionOutcome::Resolved {
            uri: "../manual_a/intro.html".to_string()
        }
    );
    assert_eq!(
        resolver.resolve_destination(&scope, None, "intro").unwrap(),
        ResolutionOutcome::Resolved {
            uri: format!("../manual_a/intro.html#{}", hash_destination("manual_a", "intro"))
        }
    );
    assert!(matches!(
        resolver.resolve_destination(&scope, Some("Nope"), "intro").unwrap(),
        ResolutionOutcome::OutOfScope { .. }
    ));
    assert!(matches!(
        resolver.resolve_destination(&scope, Some("Manual A"), "orphan").unwrap(),
        ResolutionOutcome::MissingPrerequisite { .. }
    ));
}
