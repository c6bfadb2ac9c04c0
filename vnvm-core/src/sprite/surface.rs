//! SpriteSurface: a named-bitmap manifest plus an alpha-modulated derived
//! bitmap, kept in sync the way the teacher's `Color` carries both its raw
//! channels and conveniences derived from them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::collaborators::{Bitmap, ImageLoader};
use crate::errors::RuntimeFault;

/// A snapshot of one bank's presentation state, handed to a [`DisplaySink`]
/// after `show`/`layer` mutate it.
///
/// [`DisplaySink`]: crate::collaborators::DisplaySink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteSnapshot {
    /// Current alpha, `0..=255`.
    pub alpha: u8,
    /// Current z-order; higher draws later.
    pub layer: i32,
}

/// One occupied sprite-bank slot: a manifest of named bitmaps, a selected
/// entry, and the alpha-modulated bitmap derived from it.
#[derive(Debug, Clone)]
pub struct SpriteSurface {
    images: HashMap<String, Bitmap>,
    current_name: String,
    alpha: u8,
    alpha_modulated: Bitmap,
    layer: i32,
}

impl SpriteSurface {
    /// Parse a manifest of `name=path` lines and load each path through
    /// `loader`. A path that fails to load is reported but does not abort
    /// construction — that entry is simply absent from the manifest,
    /// mirroring the original loader's "couldn't load image" tolerance.
    pub fn load_manifest<P: AsRef<Path>>(
        path: P,
        loader: &dyn ImageLoader,
    ) -> Result<Self, RuntimeFault> {
        let text = fs::read_to_string(&path).map_err(|e| RuntimeFault::BankFault {
            detail: format!("reading sprite manifest: {e}"),
        })?;

        let mut images = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, image_path)) = line.split_once('=') else {
                continue;
            };
            let (name, image_path) = (name.trim(), image_path.trim());
            match loader.load(image_path) {
                Ok(bitmap) => {
                    images.insert(name.to_owned(), bitmap);
                }
                Err(err) => {
                    tracing::warn!(line = lineno + 1, name, image_path, %err, "could not load sprite image");
                }
            }
        }

        Self::from_images(images)
    }

    /// Build directly from an already-resolved name→bitmap map, for tests
    /// and programmatic construction.
    pub fn from_images(images: HashMap<String, Bitmap>) -> Result<Self, RuntimeFault> {
        let default_bitmap = images.get("default").cloned().unwrap_or_default();
        let mut surface = Self {
            images,
            current_name: "default".to_owned(),
            alpha: 255,
            alpha_modulated: default_bitmap,
            layer: 0,
        };
        surface.recompute_alpha();
        Ok(surface)
    }

    /// The manifest entry currently selected.
    pub fn current_name(&self) -> &str {
        &self.current_name
    }

    /// Switch to a different manifest entry. Faults if `name` is absent.
    pub fn set_current_name(&mut self, name: &str) -> Result<(), RuntimeFault> {
        if !self.images.contains_key(name) {
            return Err(RuntimeFault::BankFault {
                detail: format!("no sprite named {name:?} in this surface"),
            });
        }
        self.current_name = name.to_owned();
        self.recompute_alpha();
        Ok(())
    }

    /// Current alpha, `0..=255`.
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Set alpha. Faults if `value` is outside `0..=255`.
    ///
    /// `u8` already excludes out-of-range values at the type level; the
    /// runtime calls this with a widened `VmInt` so the bounds check still
    /// happens where the spec puts it (§4.9), not silently at truncation.
    pub fn set_alpha(&mut self, value: i64) -> Result<(), RuntimeFault> {
        if !(0..=255).contains(&value) {
            return Err(RuntimeFault::AlphaRange { value });
        }
        self.alpha = value as u8;
        self.recompute_alpha();
        Ok(())
    }

    /// Current z-order; higher draws later.
    pub fn layer(&self) -> i32 {
        self.layer
    }

    /// Set z-order.
    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    /// A snapshot suitable for handing to a [`DisplaySink`].
    ///
    /// [`DisplaySink`]: crate::collaborators::DisplaySink
    pub fn snapshot(&self) -> SpriteSnapshot {
        SpriteSnapshot { alpha: self.alpha, layer: self.layer }
    }

    /// The alpha-modulated bitmap for the currently selected entry: an
    /// alias of the source bitmap when `alpha == 255`, otherwise a copy
    /// multiplied by `(255, 255, 255, alpha)` in premultiplied-alpha
    /// semantics.
    pub fn alpha_modulated_bitmap(&self) -> &Bitmap {
        &self.alpha_modulated
    }

    fn recompute_alpha(&mut self) {
        let source = self.images.get(&self.current_name).cloned().unwrap_or_default();
        self.alpha_modulated = if self.alpha == 255 {
            source
        } else {
            modulate_alpha(&source, self.alpha)
        };
    }
}

/// Multiply every pixel's alpha channel by `alpha / 255`, leaving color
/// channels untouched (premultiplied-alpha modulation, not a color tint).
fn modulate_alpha(source: &Bitmap, alpha: u8) -> Bitmap {
    let mut rgba = source.rgba.clone();
    for pixel in rgba.chunks_exact_mut(4) {
        let a = pixel[3] as u16 * alpha as u16 / 255;
        pixel[3] = a as u8;
    }
    Bitmap::new(source.width, source.height, rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(a: u8) -> Bitmap {
        Bitmap::new(1, 1, vec![10, 20, 30, a])
    }

    fn one_entry_surface(alpha_value: u8) -> SpriteSurface {
        let mut images = HashMap::new();
        images.insert("default".to_owned(), bitmap(alpha_value));
        SpriteSurface::from_images(images).unwrap()
    }

    #[test]
    fn full_alpha_aliases_the_source_bitmap() {
        let surface = one_entry_surface(200);
        assert_eq!(surface.alpha_modulated_bitmap(), &bitmap(200));
    }

    #[test]
    fn half_alpha_scales_the_alpha_channel_only() {
        let mut surface = one_entry_surface(255);
        surface.set_alpha(128).unwrap();
        let modulated = surface.alpha_modulated_bitmap();
        assert_eq!(&modulated.rgba[0..3], &[10, 20, 30]);
        assert_eq!(modulated.rgba[3], (255u16 * 128 / 255) as u8);
    }

    #[test]
    fn alpha_out_of_range_is_a_fault() {
        let mut surface = one_entry_surface(255);
        assert!(matches!(surface.set_alpha(256), Err(RuntimeFault::AlphaRange { value: 256 })));
        assert!(matches!(surface.set_alpha(-1), Err(RuntimeFault::AlphaRange { value: -1 })));
    }

    #[test]
    fn switching_to_unknown_name_is_a_fault() {
        let mut surface = one_entry_surface(255);
        assert!(surface.set_current_name("missing").is_err());
    }

    #[test]
    fn switching_current_name_recomputes_alpha_modulation() {
        let mut images = HashMap::new();
        images.insert("default".to_owned(), bitmap(255));
        images.insert("dim".to_owned(), bitmap(50));
        let mut surface = SpriteSurface::from_images(images).unwrap();
        surface.set_alpha(128).unwrap();
        surface.set_current_name("dim").unwrap();
        assert_eq!(surface.alpha_modulated_bitmap().rgba[3], (50u16 * 128 / 255) as u8);
    }
}
