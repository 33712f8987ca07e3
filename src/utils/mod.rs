// src/utils/mod.rs
//! Shared helpers: error types and configuration loading.

pub mod config;
pub mod errors;

#[cfg(test)]
pub(crate) mod test_support;
