// src/store/mod.rs
pub mod cache;
pub mod csv_store;
pub mod memory;

pub use cache::RedisCache;
pub use csv_store::CsvStore;
pub use memory::MemoryStore;
