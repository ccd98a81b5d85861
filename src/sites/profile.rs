use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::ElementRef;
use std::time::Duration;
use url::Url;

use crate::browser::{PageSnapshot, element_attribute, element_text, select_first};
use crate::normalizer::{parse_price, parse_price_attribute};
use crate::sites::traits::{RawResult, SiteAdapter};
use crate::utils::error::{AppError, Result};

/// Anything at or below this is an accessory or a placeholder price.
pub const PRICE_FLOOR: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

pub const BRAND_TOKENS: &[&str] = &["BOSCH"];

/// Where a candidate's product name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Attribute(&'static str),
    Descendant(&'static str),
    /// A descendant of the candidate's parent, with a `{sku}` template used
    /// when the parent has none.
    Sibling {
        selector: &'static str,
        fallback: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSource {
    pub attribute: Option<&'static str>,
    /// `None` reads the candidate's own text.
    pub text_selector: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub search_url: &'static str,
    pub search_params: &'static [(&'static str, &'static str)],
    pub sku_param: &'static str,
    pub candidate_selector: &'static str,
    pub label: LabelSource,
    pub price: PriceSource,
    pub brand_attribute: Option<&'static str>,
    pub category_attribute: Option<&'static str>,
    pub default_brand: Option<&'static str>,
    pub default_category: Option<&'static str>,
    pub settle_delay_ms: u64,
}

impl SiteProfile {
    pub fn dienmayxanh() -> Self {
        Self {
            id: "dmx",
            name: "Điện Máy Xanh",
            base_url: "https://www.dienmayxanh.com",
            search_url: "https://www.dienmayxanh.com/search",
            search_params: &[],
            sku_param: "key",
            candidate_selector: "a[data-name], .item[data-name]",
            label: LabelSource::Attribute("data-name"),
            price: PriceSource {
                attribute: Some("data-price"),
                text_selector: Some("strong.price, .price strong"),
            },
            brand_attribute: Some("data-brand"),
            category_attribute: Some("data-cate"),
            default_brand: None,
            default_category: None,
            settle_delay_ms: 8000,
        }
    }

    pub fn wellhome() -> Self {
        Self {
            id: "wh",
            name: "WellHome",
            base_url: "https://wellhome.asia",
            search_url: "https://wellhome.asia/search",
            search_params: &[("type", "product")],
            sku_param: "q",
            candidate_selector: ".product-inner",
            label: LabelSource::Descendant("h3"),
            price: PriceSource {
                attribute: None,
                text_selector: Some("span.price"),
            },
            brand_attribute: None,
            category_attribute: None,
            default_brand: Some("Bosch"),
            default_category: Some("Gia dụng"),
            settle_delay_ms: 3000,
        }
    }

    pub fn quanghanh() -> Self {
        Self {
            id: "qh",
            name: "Điện Máy Quang Hạnh",
            base_url: "https://dienmayquanghanh.com",
            search_url: "https://dienmayquanghanh.com/tu-khoa",
            search_params: &[],
            sku_param: "q",
            candidate_selector: ".prPrice",
            label: LabelSource::Sibling {
                selector: "h3, .title",
                fallback: "Sản phẩm {sku}",
            },
            price: PriceSource {
                attribute: None,
                text_selector: None,
            },
            brand_attribute: None,
            category_attribute: None,
            default_brand: Some("Bosch"),
            default_category: Some("Gia dụng"),
            settle_delay_ms: 4000,
        }
    }
}

/// A [`SiteAdapter`] driven entirely by a [`SiteProfile`].
#[derive(Debug, Clone)]
pub struct ConfiguredSite {
    profile: SiteProfile,
}

struct Candidate {
    label: String,
    price_text: Option<String>,
    price: Option<Decimal>,
    brand: Option<String>,
    category: Option<String>,
}

impl ConfiguredSite {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn label_of(&self, element: ElementRef<'_>, sku: &str) -> Result<Option<String>> {
        let label = match self.profile.label {
            LabelSource::Attribute(name) => element_attribute(element, name),
            LabelSource::Descendant(selector) => {
                select_first(element, selector)?.map(element_text).filter(|t| !t.is_empty())
            }
            LabelSource::Sibling { selector, fallback } => {
                let from_parent = match element.parent().and_then(ElementRef::wrap) {
                    Some(parent) => select_first(parent, selector)?.map(element_text),
                    None => None,
                };
                Some(
                    from_parent
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| fallback.replace("{sku}", sku)),
                )
            }
        };
        Ok(label)
    }

    fn read_candidate(&self, element: ElementRef<'_>, label: String) -> Result<Candidate> {
        let price_source = self.profile.price;

        let price_text = match price_source.text_selector {
            Some(selector) => select_first(element, selector)?.map(element_text),
            None => Some(element_text(element)),
        }
        .filter(|t| !t.is_empty());

        let attribute_raw = price_source
            .attribute
            .and_then(|name| element_attribute(element, name));

        // Structured attribute first; fall back to the rendered text when the
        // attribute is missing or below the floor.
        let price = attribute_raw
            .as_deref()
            .and_then(parse_price_attribute)
            .filter(|p| *p > PRICE_FLOOR)
            .or_else(|| {
                price_text
                    .as_deref()
                    .and_then(parse_price)
                    .filter(|p| *p > PRICE_FLOOR)
            });

        let brand = self
            .profile
            .brand_attribute
            .and_then(|name| element_attribute(element, name))
            .or_else(|| self.profile.default_brand.map(str::to_string));
        let category = self
            .profile
            .category_attribute
            .and_then(|name| element_attribute(element, name))
            .or_else(|| self.profile.default_category.map(str::to_string));

        Ok(Candidate {
            label,
            price_text: price_text.or(attribute_raw),
            price,
            brand,
            category,
        })
    }
}

/// Keeps search hits that name the SKU or a known brand.
pub fn label_matches(label: &str, sku: &str) -> bool {
    let label = label.to_uppercase();
    label.contains(&sku.to_uppercase()) || BRAND_TOKENS.iter().any(|token| label.contains(token))
}

#[async_trait]
impl SiteAdapter for ConfiguredSite {
    fn site_id(&self) -> &str {
        self.profile.id
    }

    fn display_name(&self) -> &str {
        self.profile.name
    }

    fn base_url(&self) -> &str {
        self.profile.base_url
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.profile.settle_delay_ms)
    }

    fn build_url(&self, sku: &str) -> Result<String> {
        let params = self
            .profile
            .search_params
            .iter()
            .copied()
            .chain(std::iter::once((self.profile.sku_param, sku.trim())));

        Url::parse_with_params(self.profile.search_url, params)
            .map(String::from)
            .map_err(|e| AppError::Parse {
                message: format!("Invalid search URL for {}: {}", self.profile.id, e),
            })
    }

    fn extract(&self, page: &PageSnapshot, sku: &str) -> Result<RawResult> {
        let elements = page.select_all(self.profile.candidate_selector)?;
        tracing::debug!(site = self.profile.id, sku, candidates = elements.len(), "Scanning candidates");

        let mut unpriced: Option<Candidate> = None;

        for element in elements {
            let Some(label) = self.label_of(element, sku)? else {
                continue;
            };
            if !label_matches(&label, sku) {
                continue;
            }

            let candidate = self.read_candidate(element, label)?;
            if candidate.price.is_some() {
                return Ok(RawResult {
                    name: Some(candidate.label),
                    price_text: candidate.price_text,
                    price: candidate.price,
                    brand: candidate.brand,
                    category: candidate.category,
                    found: true,
                });
            }

            if unpriced.is_none() {
                unpriced = Some(candidate);
            }
        }

        Ok(match unpriced {
            Some(candidate) => RawResult {
                name: Some(candidate.label),
                price_text: candidate.price_text,
                price: None,
                brand: candidate.brand,
                category: candidate.category,
                found: true,
            },
            None => RawResult::not_found(),
        })
    }
}
