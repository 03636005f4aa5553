pub mod mapper;
pub mod states;

pub use mapper::StateRegionMapper;
pub use states::{StateRegion, StateRegionTable};
