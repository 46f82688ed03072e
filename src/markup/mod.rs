/// Link and bookmark elements recognized in converted documents.
pub mod links;

/// Mutable element tree for converted documents.
pub mod tree;

pub use links::{BookmarkElement, LinkElement};
pub use tree::{parse_document, Element, Node, Visit, ANCHOR_TAG, FOLIO_ID_ATTR, RECORD_ID_ATTR};
