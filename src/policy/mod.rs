pub mod cache;
pub mod cached_client;
pub mod client;
pub mod filter;
pub mod service;
pub mod types;

#[cfg(test)]
pub mod testing;
