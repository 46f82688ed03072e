/// Link resolution module.
///
/// Turns bookmarks into anchors and rewrites query links and jump links into
/// relative URIs found through the link index.
mod document;
mod hasher;
mod resolver;
mod uri;

pub use document::{process_document, RESOLVED_ATTR};
pub use hasher::{destination_fragment, hash_destination};
pub use resolver::{DocumentScope, LinkResolver, ResolveOptions, OUT_OF_SCOPE_DETAIL};
pub use uri::{relative_uri, ExportLayout, PathResolver, UriBuilder};
