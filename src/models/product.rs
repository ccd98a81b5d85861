use serde::{Deserialize, Serialize};

/// A catalog entry from the `products` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "code")]
    pub sku: String,
    pub name: Option<String>,
}

impl Product {
    pub fn new(sku: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            sku: sku.into(),
            name: name.map(str::to_string),
        }
    }

    /// Built-in catalog used when the store has no products yet.
    pub fn sample_catalog() -> Vec<Product> {
        vec![
            Product::new("HMH.QUYDR2.23E", Some("Sample Product 1")),
            Product::new("HBD46PPI60", Some("Sample Product 2")),
        ]
    }
}
