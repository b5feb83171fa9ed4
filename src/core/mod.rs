//! Engine-wide constants, configuration, clocks and errors.

#![allow(unused_imports)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CombatTuning, ConfigError, EngineConfig};
pub use error::{EngineError, Result, TargetUnavailableReason};
