pub mod service;

pub use service::{ChartDiscoveryService, ChartFeatures};
