pub mod profile;
pub mod registry;
pub mod traits;

pub use profile::{ConfiguredSite, LabelSource, PriceSource, SiteProfile};
pub use registry::{SiteAdapterBox, SiteRegistry};
pub use traits::{FetchOptions, RawResult, SiteAdapter};
