pub mod cli;
pub mod config;
pub mod log_tail;
pub mod logger;
pub mod port;
pub mod server;
pub mod supervisor;
pub mod terminal;
