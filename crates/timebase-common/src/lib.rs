#![doc = "Common types shared across the MBot time-base workspace."]

pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod timestamp;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use state::*;
pub use timestamp::*;
