pub mod align;
pub mod cli;
pub mod config;
pub mod equipment;
pub mod error;
pub mod health;
pub mod metrics;
pub mod naming;
pub mod roles;
pub mod scoring;
pub mod series;
pub mod time;
pub mod zone_pairs;

pub use error::{EngineError, EngineResult};
