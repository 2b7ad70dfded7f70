//! A player's collection of colours

use serde::{Deserialize, Serialize};

use super::artwork::ColourId;
use super::{WorldError, WorldResult};

/// Maximum number of colours a player can hold
pub const MAX_COLOURS: usize = 6;

/// Wire form of a palette: its slots and the selected slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteSnapshot {
    pub colours: Vec<Option<ColourId>>,
    pub selected: Option<usize>,
}

/// A player's colours. One of these is selected for painting at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colours: [Option<ColourId>; MAX_COLOURS],
    selected: Option<usize>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    pub fn new() -> Self {
        Self {
            colours: [None; MAX_COLOURS],
            selected: None,
        }
    }

    /// The selected colour, if any
    pub fn selected(&self) -> Option<ColourId> {
        self.selected.and_then(|i| self.colours[i])
    }

    pub fn selected_slot(&self) -> Option<usize> {
        self.selected
    }

    pub fn colours(&self) -> &[Option<ColourId>] {
        &self.colours
    }

    /// Add a colour to the first free slot, or replace the selected colour
    /// when the palette is full.
    pub fn add_colour(&mut self, colour: ColourId) {
        if let Some(i) = self.colours.iter().position(Option::is_none) {
            self.colours[i] = Some(colour);
            if self.selected.is_none() {
                self.selected = Some(i);
            }
        } else if let Some(i) = self.selected {
            self.colours[i] = Some(colour);
        }
    }

    /// Select the next filled slot after the current one, wrapping around
    pub fn next_colour(&mut self) {
        let start = self.selected.map_or(0, |i| i + 1);
        self.selected = (0..MAX_COLOURS)
            .map(|n| (start + n) % MAX_COLOURS)
            .find(|&i| self.colours[i].is_some())
            .or(self.selected);
    }

    pub fn snapshot(&self) -> PaletteSnapshot {
        PaletteSnapshot {
            colours: self.colours.to_vec(),
            selected: self.selected,
        }
    }

    /// Replace this palette with a snapshot received from the peer
    pub fn restore(&mut self, snapshot: &PaletteSnapshot) -> WorldResult<()> {
        if snapshot.colours.len() != MAX_COLOURS {
            return Err(WorldError::InvalidPalette(format!(
                "expected {} slots, got {}",
                MAX_COLOURS,
                snapshot.colours.len()
            )));
        }
        if let Some(i) = snapshot.selected {
            if snapshot.colours.get(i).copied().flatten().is_none() {
                return Err(WorldError::InvalidPalette(format!(
                    "selected slot {} is empty",
                    i
                )));
            }
        }

        self.colours.copy_from_slice(&snapshot.colours);
        self.selected = snapshot.selected;
        Ok(())
    }
}
