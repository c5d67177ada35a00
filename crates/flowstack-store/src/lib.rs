pub mod blocks;
pub mod store;

pub use blocks::{normalize_blocks, parse_blocks};
pub use store::SqliteStackStore;
