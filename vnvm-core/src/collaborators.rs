//! Narrow trait seams the core depends on but does not implement.
//!
//! Mirrors the teacher's `drivers.rs` split (`WindowInterface` /
//! `InputInterface` / `RenderInterface` / `AudioInterface`): the core names
//! the interface it needs from the host and nothing more. Rendering
//! fidelity, input handling, and audio mixing are out of scope (§1
//! Non-goals); these seams exist so the core can be driven headlessly in
//! tests and the CLI.

use crate::errors::CResult;
use crate::sprite::SpriteSnapshot;

/// One RGBA pixel buffer, decoded by an [`ImageLoader`].
///
/// The core never interprets pixel contents beyond alpha-multiplying them
/// (§4.9); width/height are carried only so a host compositor can use them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitmap {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Row-major RGBA8 pixels, `4 * width * height` bytes.
    pub rgba: Vec<u8>,
}

impl Bitmap {
    /// Build a bitmap from raw RGBA bytes.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }
}

/// Resolves a manifest path entry to pixel data.
pub trait ImageLoader: Send + Sync {
    /// Load the bitmap at `path`.
    fn load(&self, path: &str) -> CResult<Bitmap>;
}

/// Receives presentation updates after `show`/`layer` mutate a sprite slot.
pub trait DisplaySink: Send {
    /// Called after a bank's alpha or z-order changed.
    fn present(&mut self, bank: usize, surface_snapshot: &SpriteSnapshot);
}

/// Dispatches `say` to a host narration system and blocks for completion.
///
/// The spec's contract ("call it and wait for its completion callback") is
/// modeled as a blocking call: the core has no async runtime, so the host
/// is expected to return only once its side of the presentation is done.
pub trait SayDispatch: Send {
    /// Narrate `message` on behalf of sprite bank `bank`.
    fn say(&mut self, bank: usize, message: &str) -> CResult<()>;
}

/// Monotonic millisecond time source, for `wait ri` and fade interpolation.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, monotonic epoch.
    fn now_ms(&self) -> u64;
}
