pub mod app_config;
pub mod database;
pub mod memory;
pub mod ticket_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use ticket_repo::PgTicketStore;
