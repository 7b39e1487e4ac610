//! HTTP surfaces: the public dispatcher and the admin JSON API.

pub mod api;
mod middleware;
mod public;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;
pub use public::{HttpState, build_router};
