//! Sprite bank: a fixed-size table of optionally-occupied slots.

use crate::bytecode::MAX_BANKS;
use crate::errors::RuntimeFault;

use super::surface::SpriteSurface;

/// A fixed `MAX_BANKS`-slot table of sprite surfaces.
///
/// Slots are addressed by index and never reallocate; `first_empty` is the
/// only operation that isn't O(1), since it scans for the lowest free slot.
#[derive(Debug, Default)]
pub struct SpriteBank {
    slots: Vec<Option<SpriteSurface>>,
}

impl SpriteBank {
    /// Build an all-empty bank.
    pub fn new() -> Self {
        Self { slots: (0..MAX_BANKS).map(|_| None).collect() }
    }

    /// True if slot `i` holds no surface.
    pub fn slot_free(&self, i: usize) -> Result<bool, RuntimeFault> {
        self.bounds_check(i)?;
        Ok(self.slots[i].is_none())
    }

    /// Occupy slot `i` with `surface`, replacing whatever was there.
    pub fn slot_set(&mut self, i: usize, surface: SpriteSurface) -> Result<(), RuntimeFault> {
        self.bounds_check(i)?;
        self.slots[i] = Some(surface);
        Ok(())
    }

    /// Empty slot `i`. Clearing an already-empty slot is not a fault.
    pub fn slot_clear(&mut self, i: usize) -> Result<(), RuntimeFault> {
        self.bounds_check(i)?;
        self.slots[i] = None;
        Ok(())
    }

    /// Borrow the surface at slot `i`. Faults if the slot is empty.
    pub fn slot(&self, i: usize) -> Result<&SpriteSurface, RuntimeFault> {
        self.bounds_check(i)?;
        self.slots[i].as_ref().ok_or_else(|| RuntimeFault::BankFault {
            detail: format!("slot {i} is empty"),
        })
    }

    /// Mutably borrow the surface at slot `i`. Faults if the slot is empty.
    pub fn slot_mut(&mut self, i: usize) -> Result<&mut SpriteSurface, RuntimeFault> {
        self.bounds_check(i)?;
        self.slots[i].as_mut().ok_or_else(|| RuntimeFault::BankFault {
            detail: format!("slot {i} is empty"),
        })
    }

    /// The lowest empty slot index, or `None` if the bank is full.
    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Empty every slot, as `reset` does.
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    fn bounds_check(&self, i: usize) -> Result<(), RuntimeFault> {
        if i >= MAX_BANKS {
            return Err(RuntimeFault::BankFault {
                detail: format!("slot index {i} out of range (max {MAX_BANKS})"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::collaborators::Bitmap;

    fn dummy_surface() -> SpriteSurface {
        let mut images = HashMap::new();
        images.insert("default".to_owned(), Bitmap::new(1, 1, vec![0, 0, 0, 255]));
        SpriteSurface::from_images(images).unwrap()
    }

    #[test]
    fn new_bank_is_all_empty() {
        let bank = SpriteBank::new();
        assert_eq!(bank.first_empty(), Some(0));
        for i in 0..MAX_BANKS {
            assert!(bank.slot_free(i).unwrap());
        }
    }

    #[test]
    fn first_empty_scans_left_to_right() {
        let mut bank = SpriteBank::new();
        bank.slot_set(0, dummy_surface()).unwrap();
        bank.slot_set(1, dummy_surface()).unwrap();
        assert_eq!(bank.first_empty(), Some(2));
    }

    #[test]
    fn full_bank_has_no_first_empty() {
        let mut bank = SpriteBank::new();
        for i in 0..MAX_BANKS {
            bank.slot_set(i, dummy_surface()).unwrap();
        }
        assert_eq!(bank.first_empty(), None);
    }

    #[test]
    fn out_of_range_index_is_a_fault() {
        let bank = SpriteBank::new();
        assert!(bank.slot_free(MAX_BANKS).is_err());
    }

    #[test]
    fn slot_on_empty_slot_is_a_fault() {
        let bank = SpriteBank::new();
        assert!(bank.slot(0).is_err());
    }

    #[test]
    fn clear_all_empties_every_slot() {
        let mut bank = SpriteBank::new();
        bank.slot_set(3, dummy_surface()).unwrap();
        bank.clear_all();
        assert_eq!(bank.first_empty(), Some(0));
        assert!(bank.slot_free(3).unwrap());
    }
}
