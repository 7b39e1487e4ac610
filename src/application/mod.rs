//! Application services: language resolution, cataloging, rendering,
//! redirects and request dispatch.

pub mod admin;
pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod language;
pub mod redirects;
pub mod repos;
pub mod settings;
pub mod sitemap;
