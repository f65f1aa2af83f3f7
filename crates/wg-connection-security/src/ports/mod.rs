//! # Ports Layer
//!
//! - `inbound`: the API the host application drives
//! - `outbound`: storage, clock, browser environment and the injected provider

pub mod inbound;
pub mod outbound;
