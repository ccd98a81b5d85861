pub mod browser;
pub mod config;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod oracle;
pub mod orchestrator;
pub mod retry;
pub mod sites;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use orchestrator::{RunOrchestrator, RunOutcome};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
