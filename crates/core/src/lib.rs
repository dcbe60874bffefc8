//! Core types and shared functionality for fieldcache.
//!
//! This crate provides:
//! - Request and response snapshot types shared by the client and server
//! - The cache store abstraction, with SQLite and in-memory backends
//! - The versioned cache registry
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, CacheHandle, CacheRegistry, CacheStorage, MemoryStore, Purpose, RequestKey, ResponseSnapshot};
pub use config::AppConfig;
pub use error::Error;
pub use request::InterceptedRequest;
