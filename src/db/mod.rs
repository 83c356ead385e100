pub mod analyses;
pub mod changes;
pub mod connection;
pub mod periods;
pub mod price_history;
pub mod properties;
pub mod rooms;
pub mod trends;

pub use connection::Database;
