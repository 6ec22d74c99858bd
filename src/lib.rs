// Re-export modules for benchmarking and testing
pub mod database;
pub mod filter;
pub mod format;
pub mod parser;
pub mod pending;
pub mod processor;
pub mod signals;
pub mod tracefs;
pub mod types;
