//! Actors in floor space: player characters and their identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

use super::artwork::{ArtworkPosition, LEFT_ARTWORK, RIGHT_ARTWORK};

/// Floor-space x of each artwork's left edge
pub const ARTWORK_LEFT: [f32; 2] = [79.0, 602.0];

/// Floor-space width of one artwork pixel
pub const PIXEL_SIZE: f32 = 6.0;

/// Floor-space extent
pub const FLOOR_WIDTH: f32 = 1024.0;
pub const FLOOR_DEPTH: f32 = 300.0;

/// Depth at which characters stand in front of their artwork
pub const CHARACTER_HOME_Y: f32 = 150.0;

/// Character walking speed in floor units per second
pub const WALK_SPEED: f32 = 240.0;

/// Collision radius shared by all actors
pub const ACTOR_RADIUS: f32 = 10.0;

/// A floor-space vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            Self::new(self.x / len, self.y / len)
        } else {
            Self::ZERO
        }
    }

    /// Clamp to the floor rectangle
    pub fn clamp_to_floor(self) -> Self {
        Self::new(self.x.clamp(0.0, FLOOR_WIDTH), self.y.clamp(0.0, FLOOR_DEPTH))
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Identifier of any actor, shared by both copies of the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// The two players. Red hosts networked games; blue joins them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerId {
    Red = 0,
    Blue = 1,
}

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::Red, PlayerId::Blue];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn other(self) -> PlayerId {
        match self {
            PlayerId::Red => PlayerId::Blue,
            PlayerId::Blue => PlayerId::Red,
        }
    }

    /// The artwork this player is copying onto
    pub fn artwork(self) -> u8 {
        match self {
            PlayerId::Red => LEFT_ARTWORK,
            PlayerId::Blue => RIGHT_ARTWORK,
        }
    }

    /// Actor id of this player's character
    pub fn actor(self) -> ActorId {
        ActorId(self as u32)
    }

    pub fn from_actor(actor: ActorId) -> Option<PlayerId> {
        match actor.0 {
            0 => Some(PlayerId::Red),
            1 => Some(PlayerId::Blue),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerId::Red => write!(f, "red"),
            PlayerId::Blue => write!(f, "blue"),
        }
    }
}

/// Floor-space position beneath the centre of an artwork pixel
pub fn floor_pos_for(pos: ArtworkPosition) -> Vec2 {
    let left = ARTWORK_LEFT[usize::from(pos.artwork).min(ARTWORK_LEFT.len() - 1)];
    Vec2::new(left + (pos.x as f32 + 0.5) * PIXEL_SIZE, CHARACTER_HOME_Y)
}

/// A player's avatar on the studio floor
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub pos: Vec2,
    /// Seconds of stun remaining
    pub stun: f32,
    /// Seconds until the next attack is allowed
    pub attack_cooldown: f32,
}

impl Character {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            stun: 0.0,
            attack_cooldown: 0.0,
        }
    }

    pub fn is_stunned(&self) -> bool {
        self.stun > 0.0
    }

    pub fn can_attack(&self) -> bool {
        !self.is_stunned() && self.attack_cooldown <= 0.0
    }

    /// Advance timers and walk towards `target_x`
    pub fn update(&mut self, dt: f32, target_x: f32) {
        self.stun = (self.stun - dt).max(0.0);
        self.attack_cooldown = (self.attack_cooldown - dt).max(0.0);

        if self.is_stunned() {
            return;
        }

        let dx = target_x - self.pos.x;
        let step = WALK_SPEED * dt;
        self.pos.x += dx.clamp(-step, step);
        self.pos = self.pos.clamp_to_floor();
    }
}
