//! Intake Storage Library
//!
//! The pipeline never moves bytes to object storage itself: it asks a
//! [`Storage`] backend for a single-use upload target and the client transfers
//! the bytes directly. This crate holds that abstraction, the shared key
//! layout, and an in-memory backend for development and tests.
//!
//! # Storage key format
//!
//! `uploads/{owner}/{file_id}/{sanitized_name}` where `owner` is the user id,
//! or `anonymous`. Keys must not contain `..` or a leading `/`.

pub mod keys;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use keys::{generate_upload_key, validate_storage_key};
pub use memory::{IssuedTarget, MemoryStorage};
pub use traits::{Storage, StorageError, StorageResult};
