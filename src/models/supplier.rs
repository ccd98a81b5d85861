use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata document kept in the `suppliers` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

/// Per-SKU URL overrides from the `urlMappings` collection, keyed by supplier id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlMapping {
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

impl UrlMapping {
    pub fn url_for(&self, supplier_id: &str) -> Option<&str> {
        self.urls
            .get(supplier_id)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }
}
