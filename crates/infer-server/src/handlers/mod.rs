//! HTTP request handlers for API endpoints.

pub mod generated;
pub mod health;
pub mod infer;
pub mod status;
pub mod stop;

pub use generated::handle_get_generated;
pub use health::handle_health;
pub use infer::handle_infer;
pub use status::handle_status;
pub use stop::handle_stop;
