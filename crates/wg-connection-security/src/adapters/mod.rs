//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `storage`: in-memory and file-backed `KeyValueStore`
//! - `environment`: fixed `BrowserEnvironment` for hosts that know their origin up front
//! - `cooldown`: cancelable countdown that drives cooldown displays

pub mod cooldown;
pub mod environment;
pub mod storage;

pub use cooldown::CooldownTicker;
pub use environment::StaticEnvironment;
pub use storage::{FileStore, MemoryStore};
