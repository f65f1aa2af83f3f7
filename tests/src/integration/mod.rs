//! Cross-component flows driven through the `SecurityManager` facade.

pub mod flows;
pub mod multi_tab;
