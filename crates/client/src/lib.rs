//! Network side of fieldcache.
//!
//! This crate provides the [`Fetcher`] seam the interception layer talks to,
//! its reqwest-backed implementation, and URL resolution helpers.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Fetcher, UrlError, resolve};
