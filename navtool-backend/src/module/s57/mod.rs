pub mod adapter;
pub mod archive;
pub mod catalogue;
pub mod iso8211;
pub mod parser;
pub mod types;

pub use adapter::{AdapterOptions, S57MaritimeAdapter};
pub use archive::parse_archive_async;
pub use catalogue::S57Catalogue;
pub use parser::S57Parser;
pub use types::{S57Feature, S57Geometry, S57Metadata, S57ParseResult};
