//! Skirmish - turn-based combat and progression engine
//!
//! Players level up along an XP curve, fight mobs and each other, and climb an
//! Elo ladder. The chat or UI layer drives everything through [`engine::Engine`].

pub mod autoplay;
pub mod combat;
pub mod core;
pub mod engine;
pub mod progression;
pub mod rating;
pub mod records;
pub mod reward;
pub mod session;
