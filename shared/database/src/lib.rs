pub mod models;
pub mod store;
pub mod postgres;
pub mod memory;
pub mod connection;
pub mod migrations;

pub use models::*;
pub use store::*;
pub use postgres::PgStore;
pub use memory::MemoryStore;
pub use connection::*;
pub use migrations::*;
