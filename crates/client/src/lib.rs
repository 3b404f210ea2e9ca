//! Network side of lantern.
//!
//! This crate provides URL canonicalization for cache keys and the
//! [`Fetcher`] seam the engine uses to reach the upstream origin.

pub mod fetch;

pub use fetch::{FetchConfig, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use fetch::url::{UrlError, canonicalize, path_only, resolve};
pub use reqwest::{Method, StatusCode, header};
