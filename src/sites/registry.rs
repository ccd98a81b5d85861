use std::sync::Arc;

use super::profile::{ConfiguredSite, SiteProfile};
use super::traits::SiteAdapter;
use crate::utils::error::AppError;

pub type SiteAdapterBox = Arc<dyn SiteAdapter>;

/// Site adapters in the order they are visited for every product.
#[derive(Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<SiteAdapterBox>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Điện Máy Xanh, WellHome, Quang Hạnh.
    pub fn standard() -> Self {
        Self {
            sites: vec![
                Arc::new(ConfiguredSite::new(SiteProfile::dienmayxanh())),
                Arc::new(ConfiguredSite::new(SiteProfile::wellhome())),
                Arc::new(ConfiguredSite::new(SiteProfile::quanghanh())),
            ],
        }
    }

    /// Register a site adapter after the existing ones
    pub fn register(&mut self, site: SiteAdapterBox) -> Result<(), AppError> {
        if self.get(site.site_id()).is_some() {
            return Err(AppError::config(format!(
                "Site '{}' is already registered",
                site.site_id()
            )));
        }
        self.sites.push(site);
        Ok(())
    }

    pub fn get(&self, site_id: &str) -> Option<&SiteAdapterBox> {
        self.sites.iter().find(|site| site.site_id() == site_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteAdapterBox> {
        self.sites.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sites.iter().map(|site| site.site_id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl std::fmt::Debug for SiteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteRegistry").field("sites", &self.ids()).finish()
    }
}
