use super::bus::Bus;
use crate::LcdResult;
use log::debug;

/// Number of user-defined glyphs the character generator RAM can hold.
pub(crate) const SLOT_COUNT: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    pattern: [u8; 8],
    last_used: u64,
}

/// Cache of the glyph patterns currently resident in CGRAM.
///
/// The hardware copy cannot be read back, so this table is the only
/// record of which pattern lives behind which character code. A slot's
/// pattern matches the hardware from the moment it is written until the
/// slot is reassigned.
#[derive(Debug)]
pub(crate) struct GlyphCache {
    slots: [Option<Slot>; SLOT_COUNT],
    tick: u64,
}

impl GlyphCache {
    pub(crate) fn new() -> Self {
        GlyphCache {
            slots: Default::default(),
            tick: 0,
        }
    }

    /// Gets whether a pattern is already resident, without touching its
    /// recency. The renderer peeks with this to flush a pending run
    /// before [GlyphCache::resolve] moves the address register to CGRAM.
    pub(crate) fn contains(&self, pattern: &[u8; 8]) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|slot| slot.pattern == *pattern)
    }

    /// Maps a pattern to a character code in `0..8`, uploading it to the
    /// controller if it is not already resident.
    ///
    /// A hit refreshes the slot's recency and writes nothing. A miss
    /// takes the lowest free code, or evicts the least recently used slot
    /// (lowest code on a tie) when all eight are live, then writes the
    /// pattern through `set CGRAM address` plus an 8-byte data burst.
    pub(crate) fn resolve(&mut self, bus: &mut Bus<'_>, pattern: [u8; 8]) -> LcdResult<u8> {
        self.tick += 1;

        for (code, slot) in self.slots.iter_mut().enumerate() {
            if let Some(slot) = slot {
                if slot.pattern == pattern {
                    slot.last_used = self.tick;
                    return Ok(code as u8);
                }
            }
        }

        let code = match self.slots.iter().position(|slot| slot.is_none()) {
            Some(free) => free,
            None => {
                // least recently used, lowest code on a tie
                let mut victim = 0;
                let mut oldest = u64::MAX;
                for (code, slot) in self.slots.iter().enumerate() {
                    if let Some(slot) = slot {
                        if slot.last_used < oldest {
                            oldest = slot.last_used;
                            victim = code;
                        }
                    }
                }
                debug!("cgram full, evicting slot {}", victim);
                victim
            }
        };

        debug!("uploading glyph {:02x?} to cgram slot {}", pattern, code);
        bus.set_cgram_address((code as u8) << 3)?;
        bus.write_data(&pattern)?;
        self.slots[code] = Some(Slot {
            pattern,
            last_used: self.tick,
        });
        Ok(code as u8)
    }
}
