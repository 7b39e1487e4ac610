//! Application services for the administrative surface.

pub mod content_events;
pub mod languages;
pub mod sitemap;

pub use content_events::{ContentEvent, ContentEventError, ContentEventService};
pub use languages::{AdminLanguageError, AdminLanguageService};
pub use sitemap::{AdminSitemapError, AdminSitemapService};
