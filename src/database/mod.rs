pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod resilient;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use repository::AdminStore;
pub use resilient::ResilientStore;
