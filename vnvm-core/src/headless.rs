//! Default, best-effort collaborator implementations.
//!
//! Used by the CLI's `run` subcommand and by the test suite: none of these
//! render anything (rendering is out of scope, §1), they just let the core
//! run to completion without a real host attached.

use std::time::Instant;

use crate::collaborators::{Bitmap, Clock, DisplaySink, ImageLoader, SayDispatch};
use crate::errors::CResult;
use crate::sprite::SpriteSnapshot;

/// Reads image files from disk without decoding them: the byte length
/// becomes a 1-pixel-tall placeholder bitmap. Good enough for a host that
/// has no renderer but still wants manifests to resolve.
#[derive(Debug, Default)]
pub struct NullImageLoader;

impl ImageLoader for NullImageLoader {
    fn load(&self, path: &str) -> CResult<Bitmap> {
        let bytes = std::fs::read(path)?;
        let width = bytes.len().max(1) as u32;
        Ok(Bitmap::new(width, 1, vec![0, 0, 0, 255]))
    }
}

/// Drops every presentation update on the floor.
#[derive(Debug, Default)]
pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {
    fn present(&mut self, bank: usize, surface_snapshot: &SpriteSnapshot) {
        tracing::trace!(bank, alpha = surface_snapshot.alpha, layer = surface_snapshot.layer, "present");
    }
}

/// Logs the narration line and returns immediately, standing in for a host
/// dialogue system's completion callback.
#[derive(Debug, Default)]
pub struct NullSayDispatch;

impl SayDispatch for NullSayDispatch {
    fn say(&mut self, bank: usize, message: &str) -> CResult<()> {
        tracing::info!(bank, message, "say");
        Ok(())
    }
}

/// Monotonic clock backed by `std::time::Instant`.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
