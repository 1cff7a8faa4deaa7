//! Offline support for the web bundle.
//!
//! A [`worker::CacheWorker`] owns one versioned cache bucket. The
//! [`service::CacheService`] task decides which worker is active and routes
//! fetches to it, and the proxy exposes all of that over HTTP.

pub mod fetcher;
pub mod proxy;
pub mod service;
pub mod storage;
pub mod types;
pub mod update;
pub mod worker;
