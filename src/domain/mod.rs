pub mod keys;
pub mod matcher;
pub mod parser;
pub mod room;
pub mod trends;
