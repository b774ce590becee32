//! Client configuration loading.

pub mod config;
