use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CURRENCY_VND, ScrapeStatus, generate_id};

/// One (product, site) observation. Append-only history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub id: String,
    pub session_id: String,
    pub sku: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub product_name: Option<String>,
    pub raw_price_text: Option<String>,
    pub numeric_price: Option<Decimal>,
    pub price_formatted: Option<String>,
    pub currency: String,
    pub status: ScrapeStatus,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub error: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
    pub is_scheduled: bool,
}

#[derive(Debug, Clone)]
pub struct NewPriceRecord {
    pub session_id: String,
    pub sku: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub source_url: String,
    pub is_scheduled: bool,
    pub scraped_at: DateTime<Utc>,
}

impl PriceRecord {
    /// Status follows from what was found: a price means `found_with_price`,
    /// a name without a price means `found_no_price`, nothing means `no_info`.
    pub fn found(
        new: NewPriceRecord,
        product_name: Option<String>,
        raw_price_text: Option<String>,
        numeric_price: Option<Decimal>,
        brand: Option<String>,
        category: Option<String>,
    ) -> Self {
        let status = match (&product_name, numeric_price) {
            (_, Some(_)) => ScrapeStatus::FoundWithPrice,
            (Some(_), None) => ScrapeStatus::FoundNoPrice,
            (None, None) => ScrapeStatus::NoInfo,
        };

        Self {
            id: generate_id(),
            session_id: new.session_id,
            sku: new.sku,
            supplier_id: new.supplier_id,
            supplier_name: new.supplier_name,
            product_name,
            raw_price_text,
            price_formatted: numeric_price.map(crate::normalizer::format_vnd),
            numeric_price,
            currency: CURRENCY_VND.to_string(),
            status,
            brand,
            category,
            error: None,
            scraped_at: new.scraped_at,
            source_url: new.source_url,
            is_scheduled: new.is_scheduled,
        }
    }

    pub fn failed(new: NewPriceRecord, error: String) -> Self {
        Self {
            id: generate_id(),
            session_id: new.session_id,
            sku: new.sku,
            supplier_id: new.supplier_id,
            supplier_name: new.supplier_name,
            product_name: None,
            raw_price_text: None,
            numeric_price: None,
            price_formatted: None,
            currency: CURRENCY_VND.to_string(),
            status: ScrapeStatus::Error,
            brand: None,
            category: None,
            error: Some(error),
            scraped_at: new.scraped_at,
            source_url: new.source_url,
            is_scheduled: new.is_scheduled,
        }
    }
}
