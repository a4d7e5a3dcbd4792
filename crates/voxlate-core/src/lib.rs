//! Core types, config, errors, and language catalog for Voxlate.

pub mod config;
pub mod error;
pub mod languages;
pub mod types;
