pub mod address_cache;
pub mod cache;
pub mod loader;
pub mod project_cache;
pub mod storage;

pub use address_cache::AddressCache;
pub use project_cache::{Lookup, ProjectCache};
pub use storage::RuntimeStorage;
