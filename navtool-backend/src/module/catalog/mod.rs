pub mod cache;
pub mod cell_name;
pub mod client;
pub mod metadata_parser;
pub mod rate_limiter;
pub mod retry;
pub mod store;

pub use cache::{BootstrapReport, ChartCatalogCache, SearchFilters};
pub use client::{CatalogClient, CatalogFilters, RawCatalog};
pub use metadata_parser::{MetadataParser, ParseReport, ParserOptions};
pub use rate_limiter::RateLimiter;
pub use store::{ChartRepository, KeyValueStore, MemoryStore};
