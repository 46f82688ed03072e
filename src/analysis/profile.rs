use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

/// Field searched by query terms that name no field.
pub const DEFAULT_FIELD: &str = "text";

/// Element in a root record declaring a searchable field.
const FIELD_DEF_TAG: &str = "field-def";

/// How the values of a field are matched by free-text queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldAnalysis {
    /// Tokenized, case- and diacritic-insensitive full-text matching.
    Text,
    /// Verbatim comparison of the whole value.
    Exact,
}

#[allow(clippy::should_implement_trait)]
impl FieldAnalysis {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldAnalysis::Text => "text",
            FieldAnalysis::Exact => "exact",
        }
    }

    /// Parses an `analysis` attribute value, returning `None` if unrecognized.
    pub fn from_str(s: &str) -> Option<FieldAnalysis> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "analyzed" | "tokenized" => Some(FieldAnalysis::Text),
            "exact" | "keyword" | "unanalyzed" => Some(FieldAnalysis::Exact),
            _ => None,
        }
    }
}

/// Text-analysis configuration used to parse free-text queries aimed at one
/// collection.
///
/// Derived from the collection's root record. Field names are
/// case-insensitive and stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisProfile {
    collection_id: String,
    fields: BTreeMap<String, FieldAnalysis>,
}

impl AnalysisProfile {
    /// A profile that only knows the default field.
    pub fn new(collection_id: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(DEFAULT_FIELD.to_string(), FieldAnalysis::Text);
        Self {
            collection_id: collection_id.to_string(),
            fields,
        }
    }

    pub fn with_field(mut self, name: &str, analysis: FieldAnalysis) -> Self {
        self.fields.insert(name.to_lowercase(), analysis);
        self
    }

    /// Builds the profile from the serialized root markup of a collection.
    ///
    /// Every `<field-def name=".." analysis="text|exact"/>` element, at any
    /// depth, declares a field; `analysis` defaults to `text`.
    pub fn from_root_xml(collection_id: &str, xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| LinkError::Configuration {
            message: format!("root record of collection '{collection_id}' is not valid xml: {e}"),
        })?;

        let mut profile = Self::new(collection_id);
        for node in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == FIELD_DEF_TAG)
        {
            let name = node
                .attribute("name")
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| LinkError::Configuration {
                    message: format!(
                        "field definition without a name in root record of collection '{collection_id}'"
                    ),
                })?;

            let analysis = match node.attribute("analysis") {
                None => FieldAnalysis::Text,
                Some(value) => {
                    FieldAnalysis::from_str(value).ok_or_else(|| LinkError::Configuration {
                        message: format!(
                            "field '{name}' of collection '{collection_id}' has unknown analysis '{value}'"
                        ),
                    })?
                }
            };

            profile = profile.with_field(name, analysis);
        }

        Ok(profile)
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn default_field(&self) -> &str {
        DEFAULT_FIELD
    }

    /// Returns the analysis of a field, ignoring case.
    pub fn field(&self, name: &str) -> Option<FieldAnalysis> {
        self.fields.get(&name.to_lowercase()).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldAnalysis)> {
        self.fields.iter().map(|(name, analysis)| (name.as_str(), *analysis))
    }
}
