//! Tools for painting onto an artwork

use serde::{Deserialize, Serialize};

use super::artwork::ArtworkPosition;

/// The tools a player can paint with. A player starts with the brush and
/// can pick up others from toolbox powerups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// A single pixel
    Pencil,
    /// A 3x3 square
    #[default]
    Brush,
    /// A 5x1 horizontal strip
    Roller,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Pencil, ToolKind::Brush, ToolKind::Roller];

    /// Pixel offsets covered by the tool relative to its position
    fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            ToolKind::Pencil => &[(0, 0)],
            ToolKind::Brush => &[
                (-1, -1),
                (0, -1),
                (1, -1),
                (-1, 0),
                (0, 0),
                (1, 0),
                (-1, 1),
                (0, 1),
                (1, 1),
            ],
            ToolKind::Roller => &[(-2, 0), (-1, 0), (0, 0), (1, 0), (2, 0)],
        }
    }

    /// Pixels painted when the tool is applied at `pos`, clipped to the artwork
    pub fn footprint(self, pos: ArtworkPosition, width: usize, height: usize) -> Vec<(i32, i32)> {
        self.offsets()
            .iter()
            .map(|(dx, dy)| (pos.x + dx, pos.y + dy))
            .filter(|&(x, y)| x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_footprint() {
        let pixels = ToolKind::Brush.footprint(ArtworkPosition::new(0, 5, 5), 10, 10);
        assert_eq!(pixels.len(), 9);
        assert!(pixels.contains(&(4, 4)));
        assert!(pixels.contains(&(6, 6)));
    }

    #[test]
    fn test_footprint_clipped_in_border() {
        let pixels = ToolKind::Brush.footprint(ArtworkPosition::new(0, -1, -1), 10, 10);
        assert_eq!(pixels, vec![(0, 0)]);

        let pixels = ToolKind::Roller.footprint(ArtworkPosition::new(0, 9, 3), 10, 10);
        assert_eq!(pixels, vec![(7, 3), (8, 3), (9, 3)]);
    }

    #[test]
    fn test_pencil_footprint() {
        let pixels = ToolKind::Pencil.footprint(ArtworkPosition::new(1, 2, 3), 10, 10);
        assert_eq!(pixels, vec![(2, 3)]);
    }
}
