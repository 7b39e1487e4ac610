//! Language-aware XML sitemaps and an ordered redirect layer for multilingual
//! content sites.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
