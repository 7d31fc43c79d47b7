pub mod env;
mod loader;

pub use env::{AppConfig, CacheConfig, DirectoryConfig, ScanConfig, ServiceConfig};
pub use loader::load_config;
