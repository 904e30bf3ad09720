pub mod scripted;
pub mod server;
