//! # Domain Layer
//!
//! Pure decision logic with no I/O of its own. Durable storage and time are
//! reached only through the outbound ports.

pub mod assessment;
pub mod audit;
pub mod auth_message;
pub mod config;
pub mod entities;
pub mod errors;
pub mod hijack;
pub mod lifecycle;
pub mod monitor;
pub mod origin;
pub mod provider;
pub mod rate_limiter;
pub mod session;
pub mod verifier;
