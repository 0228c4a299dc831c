//! The Movie Database API: domain types and HTTP client.

pub mod client;
pub mod types;
