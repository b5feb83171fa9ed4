//! Level curve and XP bookkeeping.

#![allow(unused_imports)]

pub mod curve;
pub mod types;

pub use curve::*;
pub use types::*;
