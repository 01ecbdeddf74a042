pub mod auth;
pub mod client;
pub mod guard;
pub mod rate_limit;
pub mod response;

pub use auth::{bearer_auth_middleware, BearerToken};
pub use client::client_ip;
pub use guard::{origin_middleware, request_guard_middleware};
pub use rate_limit::rate_limit_middleware;
pub use response::{ApiResponse, ApiResult};
