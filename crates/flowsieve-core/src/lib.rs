pub mod models;
pub mod counter;
pub mod ingest;
pub mod cidr;
pub mod cluster;
pub mod suggest;
pub mod analyzer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
