pub mod client;
pub mod config;
pub mod date;
pub mod error;
pub mod handlers;
pub mod resource;
pub mod send_queue;
pub mod server;
