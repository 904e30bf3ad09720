pub mod config;
pub mod logging;

pub mod error;
pub mod file;
pub mod loader;
pub mod locator;
pub mod transport;
