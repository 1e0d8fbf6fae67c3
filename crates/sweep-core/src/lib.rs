//! sweep-core — launch plans and experiment generation.
//!
//! A `SweepRequest` holds the raw launcher inputs; `resolve()` validates
//! them into a `LaunchPlan`, which expands the seed × game product into
//! `Experiment` configurations in a fixed, documented order.

pub mod error;
pub mod games;
pub mod plan;

pub use error::{ConfigError, ConfigResult};
pub use games::DEFAULT_GAMES;
pub use plan::{Experiment, LaunchPlan, SweepRequest};
