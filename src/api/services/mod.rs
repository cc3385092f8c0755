pub mod health;
pub mod serve;

pub use health::{AppStartTime, HealthService};
pub use serve::{ServeContext, ServeService, serve_routes};
