pub mod config;
pub mod error;
pub mod models;
pub mod update;

pub use config::Config;
pub use error::{UpdateError, UpdateFailure};
pub use models::{Stage, Version, VersionCheck};
