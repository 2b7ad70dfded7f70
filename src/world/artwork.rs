//! Paintings and the artworks players copy them onto
//!
//! A `Painting` is the reference image (the "level"); each player owns an
//! `Artwork` that starts blank and is painted pixel by pixel.

use serde::{Deserialize, Serialize};

use super::{WorldError, WorldResult};

/// Index into a painting's colour table
pub type ColourId = u8;

/// Width of every built-in painting, in pixels
pub const PAINTING_WIDTH: usize = 60;

/// Height of every built-in painting, in pixels
pub const PAINTING_HEIGHT: usize = 40;

/// Artwork painted by the red player
pub const LEFT_ARTWORK: u8 = 0;

/// Artwork painted by the blue player
pub const RIGHT_ARTWORK: u8 = 1;

/// Number of artworks in a match
pub const ARTWORK_COUNT: u8 = 2;

/// Identifiers of the paintings shipped with the game
pub const PAINTINGS: &[&str] = &["desert-island", "sunset", "mondrian"];

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// The original painting players are trying to reproduce
#[derive(Debug, Clone)]
pub struct Painting {
    id: String,
    width: usize,
    height: usize,
    pixels: Vec<ColourId>,
    colours: Vec<Rgb>,
}

impl Painting {
    /// Build a painting from raw pixel data
    pub fn new(
        id: impl Into<String>,
        width: usize,
        height: usize,
        pixels: Vec<ColourId>,
        colours: Vec<Rgb>,
    ) -> WorldResult<Self> {
        let id = id.into();
        if width == 0 || height == 0 || pixels.len() != width * height {
            return Err(WorldError::InvalidPainting(format!(
                "{}: expected {}x{} pixels, got {}",
                id,
                width,
                height,
                pixels.len()
            )));
        }
        if colours.is_empty() || colours.len() > usize::from(ColourId::MAX) + 1 {
            return Err(WorldError::InvalidPainting(format!(
                "{}: colour table has {} entries",
                id,
                colours.len()
            )));
        }
        if let Some(bad) = pixels.iter().find(|&&c| usize::from(c) >= colours.len()) {
            return Err(WorldError::InvalidPainting(format!(
                "{}: pixel references colour {} outside the table",
                id, bad
            )));
        }

        Ok(Self {
            id,
            width,
            height,
            pixels,
            colours,
        })
    }

    /// Look up one of the built-in paintings by identifier
    pub fn by_id(id: &str) -> WorldResult<Self> {
        let generate: fn(usize, usize) -> ColourId = match id {
            "desert-island" => desert_island,
            "sunset" => sunset,
            "mondrian" => mondrian,
            _ => return Err(WorldError::UnknownPainting(id.to_string())),
        };

        let colours = match id {
            "desert-island" => vec![
                Rgb::new(110, 170, 240),
                Rgb::new(20, 80, 160),
                Rgb::new(230, 200, 130),
                Rgb::new(110, 70, 30),
                Rgb::new(40, 140, 50),
                Rgb::new(250, 220, 40),
            ],
            "sunset" => vec![
                Rgb::new(60, 20, 90),
                Rgb::new(170, 40, 90),
                Rgb::new(240, 110, 40),
                Rgb::new(250, 200, 60),
                Rgb::new(20, 20, 40),
            ],
            _ => vec![
                Rgb::new(245, 245, 235),
                Rgb::new(200, 30, 30),
                Rgb::new(30, 60, 170),
                Rgb::new(240, 210, 30),
                Rgb::new(15, 15, 15),
            ],
        };

        let (width, height) = (PAINTING_WIDTH, PAINTING_HEIGHT);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(generate(x, y));
            }
        }

        Self::new(id, width, height, pixels, colours)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The colour table, indexed by `ColourId`
    pub fn colours(&self) -> &[Rgb] {
        &self.colours
    }

    /// Colour index of the reference pixel at (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> Option<ColourId> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Whether `colour` is a valid index into this painting's colour table
    pub fn has_colour(&self, colour: ColourId) -> bool {
        usize::from(colour) < self.colours.len()
    }
}

fn circle(x: usize, y: usize, cx: f32, cy: f32, r: f32) -> bool {
    let dx = x as f32 + 0.5 - cx;
    let dy = y as f32 + 0.5 - cy;
    dx * dx + dy * dy <= r * r
}

fn desert_island(x: usize, y: usize) -> ColourId {
    if circle(x, y, 50.0, 8.0, 5.0) {
        5
    } else if (20..23).contains(&x) && (12..30).contains(&y) {
        3
    } else if circle(x, y, 21.5, 11.0, 6.0) && y < 14 {
        4
    } else if circle(x, y, 22.0, 40.0, 14.0) {
        2
    } else if y >= 26 {
        1
    } else {
        0
    }
}

fn sunset(x: usize, y: usize) -> ColourId {
    if y >= 30 {
        4
    } else if circle(x, y, 30.0, 30.0, 9.0) {
        3
    } else {
        match y / 8 {
            0 => 0,
            1 => 1,
            _ => 2,
        }
    }
}

fn mondrian(x: usize, y: usize) -> ColourId {
    if x == 18 || x == 45 || y == 14 || (y == 28 && x > 18) {
        4
    } else if x < 18 && y < 14 {
        1
    } else if x > 45 && y > 28 {
        2
    } else if x > 18 && x < 45 && y > 28 {
        3
    } else {
        0
    }
}

/// A player's in-progress copy of the painting
#[derive(Debug, Clone)]
pub struct Artwork {
    width: usize,
    height: usize,
    pixels: Vec<Option<ColourId>>,
}

impl Artwork {
    /// A blank artwork the size of `painting`
    pub fn blank(painting: &Painting) -> Self {
        Self {
            width: painting.width(),
            height: painting.height(),
            pixels: vec![None; painting.width() * painting.height()],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Colour at (x, y), `None` if blank or out of bounds
    pub fn pixel(&self, x: i32, y: i32) -> Option<ColourId> {
        self.index(x, y).and_then(|i| self.pixels[i])
    }

    /// Paint a single pixel; out-of-bounds pixels are ignored
    pub fn paint_pixel(&mut self, x: i32, y: i32, colour: ColourId) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = Some(colour);
        }
    }

    /// Count pixels matching the painting, returning (correct, total)
    pub fn completeness(&self, painting: &Painting) -> (usize, usize) {
        let mut correct = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let painted = self.pixels[y * self.width + x];
                if painted.is_some() && painted == painting.pixel(x, y) {
                    correct += 1;
                }
            }
        }
        (correct, self.width * self.height)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }
}

/// A pixel position within the pair of artworks.
///
/// The domain is each artwork plus a 1-pixel border outside it, which lets a
/// 3x3 brush reach the edge pixels. Offsetting a position moves the cursor
/// across from one artwork to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtworkPosition {
    pub artwork: u8,
    pub x: i32,
    pub y: i32,
}

impl ArtworkPosition {
    pub fn new(artwork: u8, x: i32, y: i32) -> Self {
        Self { artwork, x, y }
    }

    /// The centre pixel of an artwork
    pub fn centre(artwork: u8, width: usize, height: usize) -> Self {
        Self::new(artwork, (width / 2) as i32, (height / 2) as i32)
    }

    /// Return this position moved by (dx, dy).
    ///
    /// `y` is clamped to the bordered domain. `x` overflowing the border
    /// carries into the neighbouring artwork, clamping at the outermost ones.
    pub fn offset(self, dx: i32, dy: i32, width: usize, height: usize, artworks: u8) -> Self {
        let w = width as i32;
        let h = height as i32;
        let span = w + 2;
        let last = i32::from(artworks.saturating_sub(1));

        let mut nx = self.x.saturating_add(dx);
        let ny = self.y.saturating_add(dy).clamp(-1, h);
        let mut a = i32::from(self.artwork);

        if nx < -1 {
            if a > 0 {
                let carried = nx.saturating_add(1);
                a = (a + carried.div_euclid(span)).max(0);
                nx = carried.rem_euclid(span) - 1;
            } else {
                nx = -1;
            }
        } else if nx > w {
            if a < last {
                let carried = nx.saturating_add(1);
                a = (a + carried.div_euclid(span)).min(last);
                nx = carried.rem_euclid(span) - 1;
            } else {
                nx = w;
            }
        }

        Self::new(a as u8, nx, ny)
    }

    /// Whether this position lies within the bordered domain of an artwork
    pub fn is_valid(&self, width: usize, height: usize, artworks: u8) -> bool {
        self.artwork < artworks
            && (-1..=width as i32).contains(&self.x)
            && (-1..=height as i32).contains(&self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: usize = PAINTING_WIDTH;
    const H: usize = PAINTING_HEIGHT;

    #[test]
    fn test_builtin_paintings() {
        for id in PAINTINGS {
            let painting = Painting::by_id(id).unwrap();
            assert_eq!(painting.width(), W);
            assert_eq!(painting.height(), H);
            assert!(painting.has_colour(painting.pixel(0, 0).unwrap()));
        }
        assert!(matches!(
            Painting::by_id("mona-lisa"),
            Err(WorldError::UnknownPainting(_))
        ));
    }

    #[test]
    fn test_invalid_painting() {
        let result = Painting::new("tiny", 2, 2, vec![0, 1, 2], vec![Rgb::new(0, 0, 0)]);
        assert!(result.is_err());

        let result = Painting::new("tiny", 1, 1, vec![3], vec![Rgb::new(0, 0, 0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_offset_within_artwork() {
        let pos = ArtworkPosition::new(LEFT_ARTWORK, 10, 10);
        assert_eq!(pos.offset(3, -2, W, H, 2), ArtworkPosition::new(0, 13, 8));
    }

    #[test]
    fn test_offset_clamps_y() {
        let pos = ArtworkPosition::new(LEFT_ARTWORK, 10, 0);
        assert_eq!(pos.offset(0, -5, W, H, 2).y, -1);
        assert_eq!(pos.offset(0, 500, W, H, 2).y, H as i32);
    }

    #[test]
    fn test_offset_wraps_to_next_artwork() {
        let pos = ArtworkPosition::new(LEFT_ARTWORK, W as i32, 5);
        assert_eq!(pos.offset(1, 0, W, H, 2), ArtworkPosition::new(RIGHT_ARTWORK, -1, 5));

        let pos = ArtworkPosition::new(RIGHT_ARTWORK, -1, 5);
        assert_eq!(pos.offset(-1, 0, W, H, 2), ArtworkPosition::new(LEFT_ARTWORK, W as i32, 5));
    }

    #[test]
    fn test_offset_clamps_outer_edges() {
        let pos = ArtworkPosition::new(LEFT_ARTWORK, -1, 5);
        assert_eq!(pos.offset(-4, 0, W, H, 2), ArtworkPosition::new(LEFT_ARTWORK, -1, 5));

        let pos = ArtworkPosition::new(RIGHT_ARTWORK, W as i32, 5);
        assert_eq!(pos.offset(4, 0, W, H, 2), ArtworkPosition::new(RIGHT_ARTWORK, W as i32, 5));
    }

    #[test]
    fn test_offset_extreme_deltas_stay_in_domain() {
        let pos = ArtworkPosition::new(LEFT_ARTWORK, 10, 10);
        let moved = pos.offset(i32::MAX, i32::MIN, W, H, 2);
        assert_eq!(moved.artwork, RIGHT_ARTWORK);
        assert_eq!(moved.y, -1);
        assert!(moved.is_valid(W, H, 2));

        let pos = ArtworkPosition::new(RIGHT_ARTWORK, 10, 10);
        let moved = pos.offset(i32::MIN, i32::MAX, W, H, 2);
        assert_eq!(moved.artwork, LEFT_ARTWORK);
        assert_eq!(moved.y, H as i32);
        assert!(moved.is_valid(W, H, 2));
    }

    #[test]
    fn test_artwork_paint_and_completeness() {
        let painting = Painting::by_id("sunset").unwrap();
        let mut artwork = Artwork::blank(&painting);
        assert_eq!(artwork.completeness(&painting), (0, W * H));

        let target = painting.pixel(3, 3).unwrap();
        artwork.paint_pixel(3, 3, target);
        artwork.paint_pixel(-1, 3, target);
        artwork.paint_pixel(W as i32, 3, target);
        assert_eq!(artwork.pixel(3, 3), Some(target));
        assert_eq!(artwork.completeness(&painting), (1, W * H));
    }
}
