//! # HashLog
//!
//! An embeddable key-value storage engine with:
//! - An append-only log split into size-bounded segments
//! - An in-memory hash index per segment for O(1) point lookups
//! - Crash recovery that discards a torn final record
//! - Serialized writes through a single writer thread, lock-light reads
//! - Eager compaction of immutable segments on the write path
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Callers (HTTP handlers, CLI)                 │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!           writes│                             │reads
//! ┌───────────────▼─────────────┐               │
//! │      Write Serializer       │               │
//! │ (mailbox + writer thread)   │               │
//! └───────────────┬─────────────┘               │
//!                 │                             │
//! ┌───────────────▼─────────────────────────────▼───────────────┐
//! │                       Segment Store                          │
//! │     rotation · compaction · newest → oldest resolution       │
//! └───────┬─────────────────────┬─────────────────────┬─────────┘
//!         ▼                     ▼                     ▼
//!   ┌───────────┐         ┌───────────┐         ┌───────────┐
//!   │ segment-1 │         │ segment-2 │   ...   │   tail    │
//!   │ + index   │         │ + index   │         │ + index   │
//!   └───────────┘         └───────────┘         └───────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod segment;
pub mod store;
mod writer;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FrameError, HashLogError, Result};
pub use config::{Config, DeleteMode, SyncStrategy};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HashLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
