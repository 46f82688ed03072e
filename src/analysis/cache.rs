use std::collections::HashMap;

use tracing::debug;

use super::profile::AnalysisProfile;
use crate::config::{CollectionConfig, CollectionSet};
use crate::errors::{LinkError, Result};
use crate::index::SearchGateway;
use crate::types::{Clause, SearchField, ROOT_LEVEL};

/// Analysis profiles of every configured collection, keyed by collection id.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TextAnalysisCache {
    profiles: HashMap<String, AnalysisProfile>,
}

impl TextAnalysisCache {
    /// Loads the profile of every collection in the set from its root record.
    ///
    /// Fails if any collection has no root record in the index: links across
    /// collections cannot be checked against a partially indexed set.
    pub fn load(collections: &CollectionSet, gateway: &dyn SearchGateway) -> Result<Self> {
        let mut profiles = HashMap::with_capacity(collections.len());
        for collection in collections.iter() {
            let profile = load_profile(collection, gateway)?;
            debug!(
                collection = %collection.id,
                fields = profile.fields().count(),
                "loaded analysis profile"
            );
            profiles.insert(collection.id.clone(), profile);
        }
        Ok(Self { profiles })
    }

    pub fn get(&self, collection_id: &str) -> Option<&AnalysisProfile> {
        self.profiles.get(collection_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn load_profile(
    collection: &CollectionConfig,
    gateway: &dyn SearchGateway,
) -> Result<AnalysisProfile> {
    let clauses = [
        Clause::must(SearchField::CollectionId, &collection.id),
        Clause::must(SearchField::Level, ROOT_LEVEL),
    ];

    let handle = gateway
        .structured_search(&clauses)?
        .ok_or_else(|| LinkError::Configuration {
            message: format!(
                "collection '{}' is present in the set, but its root record is missing from the index",
                collection.id
            ),
        })?;

    let root = gateway.fetch(handle)?;
    let xml = root.xml.as_deref().ok_or_else(|| LinkError::Configuration {
        message: format!(
            "root record of collection '{}' carries no xml",
            collection.id
        ),
    })?;

    AnalysisProfile::from_root_xml(&collection.id, xml)
}
