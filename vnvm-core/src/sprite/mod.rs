//! Sprite bank and surface model (§4.2, §4.9).

pub mod bank;
pub mod surface;

pub use bank::SpriteBank;
pub use surface::{SpriteSnapshot, SpriteSurface};
