//! Core types and shared functionality for lantern.
//!
//! This crate provides:
//! - Namespaced response store with SQLite backend
//! - Cache registry and consent tracking
//! - Control and notification message types
//! - Unified error types
//! - Configuration structures

pub mod bus;
pub mod config;
pub mod consent;
pub mod error;
pub mod manifest;
pub mod message;
pub mod registry;
pub mod store;

pub use bus::NotificationBus;
pub use consent::{ConsentState, ConsentStore};
pub use error::Error;
pub use manifest::Manifest;
pub use message::{ControlMessage, Notification};
pub use registry::{CacheRegistry, Namespace, Retention};
pub use store::{CacheDb, StoredResponse};
