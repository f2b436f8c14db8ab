//! Twitter API v2 implementation of [`archiver_core::Fetcher`].

pub mod api;

pub use api::*;
