//! # WBS Common Library
//!
//! Shared code for the warehouse box scanning services including:
//! - Scan session models (session record, scan entries, aggregates)
//! - Keyed record store abstraction with TTL, plus memory and SQLite backends
//! - Distributed session lock built on the store's conditional set
//! - Invoice name matching and weight inference
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod inference;
pub mod lock;
pub mod matching;
pub mod models;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use lock::{LockSettings, SessionLock};
pub use store::{MemoryStore, RecordStore};
