pub mod config;
pub mod error;
pub mod host;
pub mod kernel;
pub mod services;

// Entry points for embedders
pub use config::TrackerConfig;
pub use error::TrackerError;
pub use kernel::reactor::Reactor;
