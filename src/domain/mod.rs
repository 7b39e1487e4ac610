//! Domain layer types and invariants.

pub mod cascade;
pub mod entities;
pub mod error;
pub mod languages;
pub mod redirects;
pub mod types;
