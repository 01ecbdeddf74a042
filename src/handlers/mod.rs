// handlers/mod.rs - handler tiers
//
// public    no authentication (/, /health, /auth/login, /auth/register)
// protected bearer token required (/auth/logout, /auth/me)
// admin     bearer token plus the authorization gate (/admin/*)

pub mod admin;
pub mod protected;
pub mod public;
