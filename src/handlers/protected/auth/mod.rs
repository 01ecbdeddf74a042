// handlers/protected/auth/mod.rs - session endpoints for an authenticated caller

pub mod logout;
pub mod me;

pub use logout::logout_post;
pub use me::me_get;
