use super::tree::Element;
use crate::types::LinkKind;

/// Tag of link elements emitted by the conversion pipeline.
pub const LINK_TAG: &str = "link";

/// Tag of named anchor points.
pub const BOOKMARK_TAG: &str = "bookmark";

/// Attribute naming the target collection of a link.
pub const COLLECTION_ATTR: &str = "infobase";

/// A link element, in one of its two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkElement {
    /// Resolved by running a free-text query.
    Query {
        collection: Option<String>,
        /// Query text as written in the markup, still entity-encoded.
        query: String,
    },
    /// Resolved by exact lookup of a bookmark name.
    Destination {
        collection: Option<String>,
        name: String,
    },
}

impl LinkElement {
    /// Classifies a `link` element by its discriminating attribute.
    ///
    /// A `query` attribute wins over `jumpDestination`; any other element
    /// yields `None`.
    pub fn from_element(element: &Element) -> Option<Self> {
        if element.tag() != LINK_TAG {
            return None;
        }
        let collection = element
            .get(COLLECTION_ATTR)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if let Some(query) = element.get(LinkKind::Query.attribute()) {
            return Some(LinkElement::Query {
                collection,
                query: query.to_string(),
            });
        }
        element
            .get(LinkKind::Destination.attribute())
            .map(|name| LinkElement::Destination {
                collection,
                name: name.to_string(),
            })
    }

    pub fn kind(&self) -> LinkKind {
        match self {
            LinkElement::Query { .. } => LinkKind::Query,
            LinkElement::Destination { .. } => LinkKind::Destination,
        }
    }

    pub fn collection(&self) -> Option<&str> {
        match self {
            LinkElement::Query { collection, .. } | LinkElement::Destination { collection, .. } => {
                collection.as_deref()
            }
        }
    }
}

/// A named anchor point inside the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkElement {
    pub name: String,
}

impl BookmarkElement {
    pub fn from_element(element: &Element) -> Option<Self> {
        if element.tag() != BOOKMARK_TAG {
            return None;
        }
        Some(Self {
            name: element.get("name").unwrap_or_default().to_string(),
        })
    }
}
