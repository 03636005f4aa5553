//! Shared domain types for the NavTool chart pipeline.
//!
//! `chart` holds the catalog-side model (charts, bounds, classification);
//! `maritime` holds the feature model handed to the rendering layer.

pub mod chart;
pub mod maritime;

pub use chart::{Chart, ChartSource, ChartStatus, ChartType, GeographicBounds};
pub use maritime::{
    AreaFeature, AttributeValue, DepthContour, LatLng, LineFeature, MaritimeFeature,
    MaritimeFeatureType, PointFeature,
};
