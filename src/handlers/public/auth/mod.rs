// handlers/public/auth/mod.rs - token acquisition
//
// Both handlers delegate to the identity provider. Credentials never touch
// the store; only the resulting audit events do.

pub mod login;
pub mod register;

pub use login::login_post;
pub use register::register_post;

use axum::extract::Request;

use crate::middleware::client::{client_ip, user_agent};
use crate::services::sessions::ClientInfo;

pub(crate) fn client_info(request: &Request, trust_forwarded_for: bool) -> ClientInfo {
    ClientInfo {
        ip: client_ip(request, trust_forwarded_for),
        user_agent: user_agent(request.headers()),
    }
}
