mod admin;
mod middleware;

pub use admin::{AdminState, AdminToken, ApiError, Envelope, build_admin_router};
