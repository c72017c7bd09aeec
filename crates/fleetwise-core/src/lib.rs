//! `fleetwise-core` provides shared types, configuration and errors for the
//! plugin-update schedule engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::FleetwiseConfig;
pub use error::{FleetwiseError, Result};
pub use types::SiteId;
