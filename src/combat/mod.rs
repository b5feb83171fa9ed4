//! Combat system types and logic.

#![allow(unused_imports)]

pub mod logic;
pub mod math;
pub mod templates;
pub mod types;

pub use logic::*;
pub use templates::*;
pub use types::*;
