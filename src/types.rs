use serde::{Deserialize, Serialize};

/// Value of the `level` field carried by each collection's root record.
pub const ROOT_LEVEL: &str = "root";

/// Exact-term fields that structured searches can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchField {
    CollectionId,
    Level,
    Destinations,
}

impl SearchField {
    /// Returns the index field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::CollectionId => "collectionId",
            SearchField::Level => "level",
            SearchField::Destinations => "destinations",
        }
    }
}

/// Boolean occurrence of a structured search clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    Must,
    Should,
}

/// One `(field, value, requirement)` term of a structured search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub field: SearchField,
    pub value: String,
    pub requirement: Requirement,
}

impl Clause {
    pub fn must(field: SearchField, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
            requirement: Requirement::Must,
        }
    }

    pub fn should(field: SearchField, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
            requirement: Requirement::Should,
        }
    }
}

/// Opaque handle to a search hit, valid for the lifetime of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultHandle(pub i64);

/// An entry of the link index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub collection_id: String,
    pub level: String,
    /// Serialized root content; only present on root records.
    pub xml: Option<String>,
    pub relative_path: Option<String>,
    pub uri_fragment: Option<String>,
    /// Bookmark names contained in the record.
    pub destinations: Vec<String>,
}

impl IndexedRecord {
    pub fn is_root(&self) -> bool {
        self.level == ROOT_LEVEL
    }
}

/// Output file of the document currently being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    /// Path of the host document relative to the output root, `/`-separated.
    pub relative_path: String,
}

impl FileContext {
    pub fn new(relative_path: &str) -> Self {
        Self {
            relative_path: relative_path.to_string(),
        }
    }
}

/// Result of resolving a single link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    Resolved { uri: String },
    NoResult { detail: String },
    ParseError { detail: String },
    /// The referenced collection is not part of the configured set.
    OutOfScope { detail: String },
    /// The target record lacks the URI metadata an earlier stage must provide.
    MissingPrerequisite { detail: String },
}

impl ResolutionOutcome {
    /// Value recorded on the element's `resolved` attribute.
    pub fn detail(&self) -> &str {
        match self {
            ResolutionOutcome::Resolved { .. } => "true",
            ResolutionOutcome::NoResult { detail }
            | ResolutionOutcome::ParseError { detail }
            | ResolutionOutcome::OutOfScope { detail }
            | ResolutionOutcome::MissingPrerequisite { detail } => detail,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved { .. })
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            ResolutionOutcome::Resolved { uri } => Some(uri),
            _ => None,
        }
    }
}

/// Discriminator of the two link shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    Query,
    Destination,
}

impl LinkKind {
    /// Attribute whose presence marks a `link` element as this kind.
    pub fn attribute(&self) -> &'static str {
        match self {
            LinkKind::Query => "query",
            LinkKind::Destination => "jumpDestination",
        }
    }
}

/// Named, append-only diagnostic streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticStream {
    BrokenQueryLinks,
    UnresolvedQueryLinks,
    BrokenJumpLinks,
    UnresolvedJumpLinks,
}

impl DiagnosticStream {
    pub const ALL: [DiagnosticStream; 4] = [
        DiagnosticStream::BrokenQueryLinks,
        DiagnosticStream::UnresolvedQueryLinks,
        DiagnosticStream::BrokenJumpLinks,
        DiagnosticStream::UnresolvedJumpLinks,
    ];

    /// Returns the stream name, also used as the report file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticStream::BrokenQueryLinks => "broken_query_links",
            DiagnosticStream::UnresolvedQueryLinks => "unresolved_query_links",
            DiagnosticStream::BrokenJumpLinks => "broken_jump_links",
            DiagnosticStream::UnresolvedJumpLinks => "unresolved_jump_links",
        }
    }

    /// Stream receiving failures for a link kind.
    pub fn broken(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Query => DiagnosticStream::BrokenQueryLinks,
            LinkKind::Destination => DiagnosticStream::BrokenJumpLinks,
        }
    }

    /// Stream receiving links left alone because resolution is disabled.
    pub fn unresolved(kind: LinkKind) -> Self {
        match kind {
            LinkKind::Query => DiagnosticStream::UnresolvedQueryLinks,
            LinkKind::Destination => DiagnosticStream::UnresolvedJumpLinks,
        }
    }
}

/// Per-kind counters of link outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounts {
    pub resolved: u64,
    pub no_result: u64,
    pub parse_errors: u64,
    pub out_of_scope: u64,
    /// Links left untouched because resolution of their kind is disabled.
    pub skipped: u64,
}

impl LinkCounts {
    pub fn total(&self) -> u64 {
        self.resolved + self.no_result + self.parse_errors + self.out_of_scope + self.skipped
    }

    pub fn broken(&self) -> u64 {
        self.no_result + self.parse_errors + self.out_of_scope
    }

    fn merge(&mut self, other: &LinkCounts) {
        self.resolved += other.resolved;
        self.no_result += other.no_result;
        self.parse_errors += other.parse_errors;
        self.out_of_scope += other.out_of_scope;
        self.skipped += other.skipped;
    }
}

/// Statistics accumulated over one document or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub documents: u64,
    pub bookmarks: u64,
    pub query_links: LinkCounts,
    pub jump_links: LinkCounts,
}

impl ResolutionStats {
    fn counts_mut(&mut self, kind: LinkKind) -> &mut LinkCounts {
        match kind {
            LinkKind::Query => &mut self.query_links,
            LinkKind::Destination => &mut self.jump_links,
        }
    }

    /// Counts one link outcome.
    pub fn record(&mut self, kind: LinkKind, outcome: &ResolutionOutcome) {
        let counts = self.counts_mut(kind);
        match outcome {
            ResolutionOutcome::Resolved { .. } => counts.resolved += 1,
            ResolutionOutcome::NoResult { .. } => counts.no_result += 1,
            ResolutionOutcome::ParseError { .. } => counts.parse_errors += 1,
            ResolutionOutcome::OutOfScope { .. } => counts.out_of_scope += 1,
            ResolutionOutcome::MissingPrerequisite { .. } => {}
        }
    }

    /// Counts one link left alone because its kind is disabled.
    pub fn record_skipped(&mut self, kind: LinkKind) {
        self.counts_mut(kind).skipped += 1;
    }

    pub fn merge(&mut self, other: &ResolutionStats) {
        self.documents += other.documents;
        self.bookmarks += other.bookmarks;
        self.query_links.merge(&other.query_links);
        self.jump_links.merge(&other.jump_links);
    }
}
