//! World module - The replicated simulation state of a match
//!
//! Both endpoints hold a full copy of the world and keep it consistent by
//! applying the same sequence of semantic events (paint, move, attack,
//! spawn). Every mutation here is driven by plain data (ids, positions,
//! colour indices) so either side reproduces it exactly.
//!
//! There are two coordinate spaces:
//! - Artwork space, addressed by `ArtworkPosition`
//! - Floor space, a `Vec2` where characters and powerups live

mod actor;
mod artwork;
mod palette;
mod powerups;
mod tools;

pub use actor::*;
pub use artwork::*;
pub use palette::*;
pub use powerups::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum distance between characters for an attack to land
pub const ATTACK_RANGE: f32 = 48.0;

/// Seconds between attacks
pub const ATTACK_COOLDOWN: f32 = 0.5;

/// Seconds a hit player is stunned for
pub const STUN_TIME: f32 = 1.5;

/// Distance a hit knocks the victim back
pub const KNOCKBACK: f32 = 60.0;

/// Floor units of knockback per pixel of cursor displacement
pub const HIT_CURSOR_SCALE: f32 = 12.0;

/// World errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorldError {
    #[error("Unknown painting: {0}")]
    UnknownPainting(String),

    #[error("Invalid painting: {0}")]
    InvalidPainting(String),

    #[error("Invalid palette: {0}")]
    InvalidPalette(String),

    #[error("Position outside the artworks: {0:?}")]
    InvalidPosition(ArtworkPosition),

    #[error("Colour {0} is not in the painting")]
    InvalidColour(ColourId),

    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),

    #[error("Invalid hit: {0}")]
    InvalidHit(String),
}

pub type WorldResult<T> = Result<T, WorldError>;

/// Result of a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Winner(PlayerId),
    Draw,
}

/// A paint action, as applied locally and replayed remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub player: PlayerId,
    pub tool: ToolKind,
    pub pos: ArtworkPosition,
    pub colour: ColourId,
}

/// A landed attack
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub actor: ActorId,
    pub vector: Vec2,
    pub stun: f32,
}

/// Feedback for the renderer, queued as the world changes
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Paint { player: PlayerId, pos: ArtworkPosition },
    Attack { player: PlayerId },
    Hit { player: PlayerId },
    Pickup { player: PlayerId, kind: PowerupKind },
}

/// Per-player state
#[derive(Debug, Clone)]
pub struct Player {
    pub palette: Palette,
    pub tool: ToolKind,
    pub cursor: ArtworkPosition,
    pub character: Character,
}

impl Player {
    fn new(cursor: ArtworkPosition) -> Self {
        Self {
            palette: Palette::new(),
            tool: ToolKind::default(),
            cursor,
            character: Character::new(floor_pos_for(cursor)),
        }
    }
}

/// The data model underlying a match
#[derive(Debug, Clone)]
pub struct World {
    painting: Painting,
    artworks: Vec<Artwork>,
    players: [Player; 2],
    powerups: Vec<Powerup>,
    effects: Vec<Effect>,
}

impl World {
    pub fn new(painting: Painting) -> Self {
        let artworks = (0..ARTWORK_COUNT).map(|_| Artwork::blank(&painting)).collect();
        let start = |p: PlayerId| ArtworkPosition::centre(p.artwork(), painting.width(), painting.height());
        let players = [Player::new(start(PlayerId::Red)), Player::new(start(PlayerId::Blue))];

        Self {
            painting,
            artworks,
            players,
            powerups: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Build a world for `painting` with both players' palettes preset
    pub fn with_palettes(painting: Painting, palettes: &[PaletteSnapshot; 2]) -> WorldResult<Self> {
        let mut world = Self::new(painting);
        for player in PlayerId::ALL {
            world.apply_palette(player, &palettes[player.index()])?;
        }
        Ok(world)
    }

    pub fn painting(&self) -> &Painting {
        &self.painting
    }

    pub fn artwork(&self, index: u8) -> Option<&Artwork> {
        self.artworks.get(usize::from(index))
    }

    pub fn player(&self, player: PlayerId) -> &Player {
        &self.players[player.index()]
    }

    pub fn palette(&self, player: PlayerId) -> &Palette {
        &self.players[player.index()].palette
    }

    pub fn tool_position(&self, player: PlayerId) -> ArtworkPosition {
        self.players[player.index()].cursor
    }

    pub fn is_stunned(&self, player: PlayerId) -> bool {
        self.players[player.index()].character.is_stunned()
    }

    pub fn powerups(&self) -> &[Powerup] {
        &self.powerups
    }

    /// Move a player's tool by a pixel offset, returning the new position
    pub fn move_tool(&mut self, player: PlayerId, dx: i32, dy: i32) -> ArtworkPosition {
        let (w, h) = (self.painting.width(), self.painting.height());
        let cursor = &mut self.players[player.index()].cursor;
        *cursor = cursor.offset(dx, dy, w, h, ARTWORK_COUNT);
        *cursor
    }

    pub fn set_tool_position(&mut self, player: PlayerId, pos: ArtworkPosition) -> WorldResult<()> {
        self.check_position(pos)?;
        self.players[player.index()].cursor = pos;
        Ok(())
    }

    /// Give a player a random colour from the painting
    pub fn give_random_colour<R: rand::Rng + ?Sized>(&mut self, player: PlayerId, rng: &mut R) {
        let colour = rng.gen_range(0..self.painting.colours().len()) as ColourId;
        self.players[player.index()].palette.add_colour(colour);
    }

    /// Cycle the selected colour, returning the palette to replicate
    pub fn next_colour(&mut self, player: PlayerId) -> PaletteSnapshot {
        let palette = &mut self.players[player.index()].palette;
        palette.next_colour();
        palette.snapshot()
    }

    pub fn apply_palette(&mut self, player: PlayerId, snapshot: &PaletteSnapshot) -> WorldResult<()> {
        if let Some(colour) = snapshot.colours.iter().flatten().find(|&&c| !self.painting.has_colour(c)) {
            return Err(WorldError::InvalidColour(*colour));
        }
        self.players[player.index()].palette.restore(snapshot)
    }

    /// Paint with the player's current tool and colour.
    ///
    /// Returns `None` when the player has no colour selected.
    pub fn paint(&mut self, player: PlayerId) -> Option<Stroke> {
        let p = &self.players[player.index()];
        let stroke = Stroke {
            player,
            tool: p.tool,
            pos: p.cursor,
            colour: p.palette.selected()?,
        };
        self.paint_stroke(&stroke);
        Some(stroke)
    }

    /// Replay a stroke made by `player` on the other endpoint
    pub fn apply_paint(
        &mut self,
        player: PlayerId,
        tool: ToolKind,
        pos: ArtworkPosition,
        colour: ColourId,
    ) -> WorldResult<()> {
        self.check_position(pos)?;
        if !self.painting.has_colour(colour) {
            return Err(WorldError::InvalidColour(colour));
        }

        let p = &mut self.players[player.index()];
        p.cursor = pos;
        p.tool = tool;
        self.paint_stroke(&Stroke {
            player,
            tool,
            pos,
            colour,
        });
        Ok(())
    }

    fn paint_stroke(&mut self, stroke: &Stroke) {
        let (w, h) = (self.painting.width(), self.painting.height());
        if let Some(artwork) = self.artworks.get_mut(usize::from(stroke.pos.artwork)) {
            for (x, y) in stroke.tool.footprint(stroke.pos, w, h) {
                artwork.paint_pixel(x, y, stroke.colour);
            }
        }
        self.effects.push(Effect::Paint {
            player: stroke.player,
            pos: stroke.pos,
        });
    }

    /// Start an attack if the player's character is able to
    pub fn start_attack(&mut self, player: PlayerId) -> bool {
        let character = &mut self.players[player.index()].character;
        if !character.can_attack() {
            return false;
        }
        character.attack_cooldown = ATTACK_COOLDOWN;
        self.effects.push(Effect::Attack { player });
        true
    }

    /// Replay an attack made on the other endpoint from `pos`
    pub fn apply_attack(&mut self, actor: ActorId, pos: Vec2) -> WorldResult<()> {
        let player = PlayerId::from_actor(actor).ok_or(WorldError::UnknownActor(actor))?;
        let character = &mut self.players[player.index()].character;
        character.pos = pos.clamp_to_floor();
        character.attack_cooldown = ATTACK_COOLDOWN;
        self.effects.push(Effect::Attack { player });
        Ok(())
    }

    /// Decide whether an attack by `attacker` lands on the other character
    pub fn resolve_attack(&self, attacker: PlayerId) -> Option<Hit> {
        let from = self.players[attacker.index()].character.pos;
        let victim = &self.players[attacker.other().index()].character;
        let delta = victim.pos - from;

        if victim.is_stunned() || delta.length_squared() > ATTACK_RANGE * ATTACK_RANGE {
            return None;
        }

        // Characters standing on top of each other knock away from the attacker's side
        let mut direction = delta.normalized();
        if direction == Vec2::ZERO {
            direction = match attacker {
                PlayerId::Red => Vec2::new(1.0, 0.0),
                PlayerId::Blue => Vec2::new(-1.0, 0.0),
            };
        }

        Some(Hit {
            actor: attacker.other().actor(),
            vector: direction * KNOCKBACK,
            stun: STUN_TIME,
        })
    }

    /// Stun and knock back the hit character, jolting their tool
    pub fn apply_hit(&mut self, hit: &Hit) -> WorldResult<()> {
        let player = PlayerId::from_actor(hit.actor).ok_or(WorldError::UnknownActor(hit.actor))?;
        if !(hit.vector.x.is_finite() && hit.vector.y.is_finite() && hit.stun.is_finite() && hit.stun >= 0.0) {
            return Err(WorldError::InvalidHit(format!(
                "vector {:?}, stun {}",
                hit.vector, hit.stun
            )));
        }
        {
            let character = &mut self.players[player.index()].character;
            character.stun = hit.stun;
            character.pos = (character.pos + hit.vector).clamp_to_floor();
        }

        let dx = (hit.vector.x / HIT_CURSOR_SCALE).round() as i32;
        let dy = (hit.vector.y / HIT_CURSOR_SCALE).round() as i32;
        self.move_tool(player, dx, dy);
        self.effects.push(Effect::Hit { player });
        Ok(())
    }

    pub fn spawn_powerup(&mut self, powerup: Powerup) {
        self.powerups.retain(|p| p.id != powerup.id);
        self.powerups.push(powerup);
    }

    /// Landed powerups currently touched by a character
    pub fn detect_pickups(&self) -> Vec<(PlayerId, ActorId)> {
        let reach = 2.0 * ACTOR_RADIUS;
        self.powerups
            .iter()
            .filter(|p| p.has_landed())
            .filter_map(|p| {
                PlayerId::ALL
                    .into_iter()
                    .find(|player| {
                        let c = &self.players[player.index()].character;
                        (c.pos - p.pos).length_squared() < reach * reach
                    })
                    .map(|player| (player, p.id))
            })
            .collect()
    }

    /// Grant a powerup to a player and remove it from the floor
    pub fn pickup(&mut self, player: PlayerId, powerup: ActorId) -> WorldResult<PowerupKind> {
        let index = self
            .powerups
            .iter()
            .position(|p| p.id == powerup)
            .ok_or(WorldError::UnknownActor(powerup))?;
        let kind = self.powerups.remove(index).kind;

        let p = &mut self.players[player.index()];
        match kind {
            PowerupKind::PaintCan { colour } => p.palette.add_colour(colour),
            PowerupKind::Toolbox { tool } => p.tool = tool,
        }
        self.effects.push(Effect::Pickup { player, kind });
        Ok(kind)
    }

    pub fn actor_position(&self, actor: ActorId) -> Option<Vec2> {
        match PlayerId::from_actor(actor) {
            Some(player) => Some(self.players[player.index()].character.pos),
            None => self.powerups.iter().find(|p| p.id == actor).map(|p| p.pos),
        }
    }

    /// Overwrite an actor's position. Idempotent.
    pub fn set_actor_position(&mut self, actor: ActorId, pos: Vec2) -> WorldResult<()> {
        let pos = pos.clamp_to_floor();
        if let Some(player) = PlayerId::from_actor(actor) {
            self.players[player.index()].character.pos = pos;
            return Ok(());
        }
        let powerup = self
            .powerups
            .iter_mut()
            .find(|p| p.id == actor)
            .ok_or(WorldError::UnknownActor(actor))?;
        powerup.pos = pos;
        Ok(())
    }

    /// Positions of every actor, characters first
    pub fn actor_positions(&self) -> Vec<(ActorId, Vec2)> {
        PlayerId::ALL
            .iter()
            .map(|p| (p.actor(), self.players[p.index()].character.pos))
            .chain(self.powerups.iter().map(|p| (p.id, p.pos)))
            .collect()
    }

    pub fn update(&mut self, dt: f32) {
        for player in &mut self.players {
            let target = floor_pos_for(player.cursor);
            player.character.update(dt, target.x);
        }
        for powerup in &mut self.powerups {
            powerup.update(dt);
        }
    }

    /// Correct pixels and total pixels on the player's own artwork
    pub fn completeness(&self, player: PlayerId) -> (usize, usize) {
        self.artworks[usize::from(player.artwork())].completeness(&self.painting)
    }

    /// Compare both players' correct pixel counts
    pub fn outcome(&self) -> Outcome {
        let (red, _) = self.completeness(PlayerId::Red);
        let (blue, _) = self.completeness(PlayerId::Blue);
        match red.cmp(&blue) {
            std::cmp::Ordering::Greater => Outcome::Winner(PlayerId::Red),
            std::cmp::Ordering::Less => Outcome::Winner(PlayerId::Blue),
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn check_position(&self, pos: ArtworkPosition) -> WorldResult<()> {
        if pos.is_valid(self.painting.width(), self.painting.height(), ARTWORK_COUNT) {
            Ok(())
        } else {
            Err(WorldError::InvalidPosition(pos))
        }
    }
}
