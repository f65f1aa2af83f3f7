//! # Wallet-Guard Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared managers, clock and configuration
//! │
//! ├── integration/      # Cross-component flows
//! │   ├── flows.rs      # Orchestrated connect, sign-in, reconnect
//! │   └── multi_tab.rs  # Several managers over one shared store
//! │
//! └── exploits/         # Attack simulations
//!     ├── hijack.rs     # Impersonating and tampered providers
//!     └── replay.rs     # Stolen or stale sign-in responses
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p wg-tests
//!
//! # By category
//! cargo test -p wg-tests integration::
//! cargo test -p wg-tests exploits::
//! ```

pub mod exploits;
pub mod fixtures;
pub mod integration;
