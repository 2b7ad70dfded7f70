//! Powerups dropped onto the studio floor
//!
//! Only the host runs a `PowerupFactory`; clients learn about powerups from
//! spawn messages and rebuild them with `Powerup::from_spawn`.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, PlayerId, Vec2, ARTWORK_LEFT, FLOOR_DEPTH, PIXEL_SIZE};
use super::artwork::{ColourId, Painting};
use super::tools::ToolKind;

/// Downward acceleration applied to falling powerups
pub const GRAVITY: f32 = 1000.0;

/// Altitude powerups are dropped from
pub const DROP_ALTITUDE: f32 = 800.0;

/// First id handed out to powerups; lower ids are reserved for characters
pub const FIRST_POWERUP_ID: u32 = 16;

/// What a powerup grants when picked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerupKind {
    /// Adds a colour to the player's palette
    PaintCan { colour: ColourId },
    /// Swaps the player's tool
    Toolbox { tool: ToolKind },
}

impl PowerupKind {
    /// Relative likelihood of this kind being dropped
    pub fn weight(&self) -> u32 {
        match self {
            PowerupKind::PaintCan { .. } => 3,
            PowerupKind::Toolbox { .. } => 1,
        }
    }
}

/// A powerup instance in the world
#[derive(Debug, Clone, PartialEq)]
pub struct Powerup {
    pub id: ActorId,
    pub kind: PowerupKind,
    pub pos: Vec2,
    /// Height above the floor
    pub alt: f32,
    /// Vertical velocity
    pub valt: f32,
}

impl Powerup {
    /// Construct a freshly dropped powerup from spawn data
    pub fn from_spawn(id: ActorId, kind: PowerupKind, pos: Vec2) -> Self {
        Self {
            id,
            kind,
            pos,
            alt: DROP_ALTITUDE,
            valt: 0.0,
        }
    }

    pub fn has_landed(&self) -> bool {
        self.alt <= 0.0
    }

    pub fn update(&mut self, dt: f32) {
        if self.alt > 0.0 {
            self.valt -= GRAVITY * dt;
            self.alt = (self.alt + self.valt * dt).max(0.0);
        } else {
            self.valt = 0.0;
            self.alt = 0.0;
        }
    }
}

/// Schedules and creates powerup drops on each side of the floor
#[derive(Debug)]
pub struct PowerupFactory {
    t: f32,
    next_drop: [f32; 2],
    next_id: u32,
}

impl PowerupFactory {
    /// Mean time between drops in seconds
    pub const DROP_MEAN: f32 = 30.0;
    /// Standard deviation of drop times
    pub const DROP_SD: f32 = 8.0;
    pub const MIN_DELAY: f32 = 5.0;

    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut factory = Self {
            t: 0.0,
            next_drop: [0.0; 2],
            next_id: FIRST_POWERUP_ID,
        };
        for side in PlayerId::ALL {
            factory.schedule_drop(side, rng);
        }
        factory
    }

    /// Time of the next scheduled drop on a side
    pub fn next_drop(&self, side: PlayerId) -> f32 {
        self.next_drop[side.index()]
    }

    fn schedule_drop<R: Rng + ?Sized>(&mut self, side: PlayerId, rng: &mut R) {
        let z: f32 = StandardNormal.sample(rng);
        let delay = (Self::DROP_MEAN + Self::DROP_SD * z).max(Self::MIN_DELAY);
        self.next_drop[side.index()] = self.t + delay;
    }

    /// Create a powerup on `side`'s half of the floor and reschedule that side
    pub fn drop<R: Rng + ?Sized>(&mut self, side: PlayerId, painting: &Painting, rng: &mut R) -> Powerup {
        let left = ARTWORK_LEFT[side.index()];
        let width = painting.width() as f32 * PIXEL_SIZE;
        let pos = Vec2::new(
            left + rng.gen::<f32>() * width,
            rng.gen::<f32>() * FLOOR_DEPTH,
        );

        let kind = choose_kind(painting, rng);
        let id = ActorId(self.next_id);
        self.next_id += 1;

        self.schedule_drop(side, rng);
        Powerup::from_spawn(id, kind, pos)
    }

    /// Advance the clock, returning any powerups that are due
    pub fn update<R: Rng + ?Sized>(&mut self, dt: f32, painting: &Painting, rng: &mut R) -> Vec<Powerup> {
        self.t += dt;
        let mut dropped = Vec::new();
        for side in PlayerId::ALL {
            if self.t > self.next_drop[side.index()] {
                dropped.push(self.drop(side, painting, rng));
            }
        }
        dropped
    }
}

fn choose_kind<R: Rng + ?Sized>(painting: &Painting, rng: &mut R) -> PowerupKind {
    let colour = rng.gen_range(0..painting.colours().len()) as ColourId;
    let tool = ToolKind::ALL[rng.gen_range(0..ToolKind::ALL.len())];
    let candidates = [PowerupKind::PaintCan { colour }, PowerupKind::Toolbox { tool }];

    let total: u32 = candidates.iter().map(PowerupKind::weight).sum();
    let mut roll = rng.gen_range(0..total);
    for kind in candidates {
        if roll < kind.weight() {
            return kind;
        }
        roll -= kind.weight();
    }
    candidates[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_powerup_falls_and_lands() {
        let mut powerup = Powerup::from_spawn(
            ActorId(FIRST_POWERUP_ID),
            PowerupKind::PaintCan { colour: 1 },
            Vec2::new(100.0, 100.0),
        );
        assert!(!powerup.has_landed());

        for _ in 0..120 {
            powerup.update(1.0 / 30.0);
        }
        assert!(powerup.has_landed());
        assert_eq!(powerup.valt, 0.0);
    }

    #[test]
    fn test_drop_schedule_respects_minimum() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let factory = PowerupFactory::new(&mut rng);
            for side in PlayerId::ALL {
                assert!(factory.next_drop(side) >= PowerupFactory::MIN_DELAY);
            }
        }
    }

    #[test]
    fn test_drop_delays_centre_on_the_mean() {
        let mut rng = StdRng::seed_from_u64(19);
        let n = 500;
        let total: f32 = (0..n)
            .map(|_| PowerupFactory::new(&mut rng).next_drop(PlayerId::Red))
            .sum();
        let mean = total / n as f32;
        assert!((mean - PowerupFactory::DROP_MEAN).abs() < 1.5, "mean delay {}", mean);
    }

    #[test]
    fn test_drops_land_on_the_right_side() {
        let painting = Painting::by_id("desert-island").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut factory = PowerupFactory::new(&mut rng);

        let red = factory.drop(PlayerId::Red, &painting, &mut rng);
        let blue = factory.drop(PlayerId::Blue, &painting, &mut rng);
        assert!(red.pos.x < ARTWORK_LEFT[1]);
        assert!(blue.pos.x >= ARTWORK_LEFT[1]);
        assert_ne!(red.id, blue.id);

        if let PowerupKind::PaintCan { colour } = red.kind {
            assert!(painting.has_colour(colour));
        }
    }

    #[test]
    fn test_update_drops_when_due() {
        let painting = Painting::by_id("sunset").unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut factory = PowerupFactory::new(&mut rng);

        assert!(factory.update(1.0, &painting, &mut rng).is_empty());

        let mut dropped = Vec::new();
        for _ in 0..200 {
            dropped.extend(factory.update(1.0, &painting, &mut rng));
        }
        assert!(dropped.len() >= 2);
        assert!(dropped.iter().all(|p| p.id.0 >= FIRST_POWERUP_ID));
    }
}
