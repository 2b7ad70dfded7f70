//! Decisions only the authoritative side makes
//!
//! Powerup drops, pickups and attack outcomes are decided here and applied
//! to the world immediately. Each decision comes back as the message that
//! replicates it.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::protocol::Message;
use crate::world::{PlayerId, PowerupFactory, World};

pub struct Referee {
    factory: PowerupFactory,
    rng: StdRng,
}

impl Referee {
    pub fn new(mut rng: StdRng) -> Self {
        let factory = PowerupFactory::new(&mut rng);
        Self { factory, rng }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Give each player a starting colour
    pub fn deal_colours(&mut self, world: &mut World) {
        for player in PlayerId::ALL {
            world.give_random_colour(player, &mut self.rng);
        }
    }

    /// Spawn any powerups that are due
    pub fn drop_powerups(&mut self, world: &mut World, dt: f32) -> Vec<Message> {
        let dropped = self.factory.update(dt, world.painting(), &mut self.rng);
        dropped
            .into_iter()
            .map(|powerup| {
                tracing::debug!("Dropping {:?} as {}", powerup.kind, powerup.id);
                let message = Message::PowerupSpawn {
                    id: powerup.id,
                    kind: powerup.kind,
                    pos: powerup.pos,
                };
                world.spawn_powerup(powerup);
                message
            })
            .collect()
    }

    /// Hand landed powerups to whoever is standing on them
    pub fn award_pickups(&mut self, world: &mut World) -> Vec<Message> {
        let mut messages = Vec::new();
        for (player, powerup) in world.detect_pickups() {
            match world.pickup(player, powerup) {
                Ok(kind) => {
                    tracing::debug!("The {} player collected {:?}", player, kind);
                    messages.push(Message::Pickup { player, powerup });
                }
                Err(e) => tracing::warn!("Pickup of {} failed: {}", powerup, e),
            }
        }
        messages
    }

    /// Decide whether `attacker`'s attack landed, applying the hit if so
    pub fn resolve_attack(&self, world: &mut World, attacker: PlayerId) -> Option<Message> {
        let hit = world.resolve_attack(attacker)?;
        if let Err(e) = world.apply_hit(&hit) {
            tracing::warn!("Could not apply hit: {}", e);
            return None;
        }
        tracing::debug!("The {} player hit {}", attacker, hit.actor);
        Some(Message::Hit {
            actor: hit.actor,
            vector: hit.vector,
            stun: hit.stun,
        })
    }
}
