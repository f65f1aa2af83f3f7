//! Attack simulations against provider verification and sign-in.

pub mod hijack;
pub mod replay;
