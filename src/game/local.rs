//! Two players on one machine
//!
//! Both players drive the same world with no transport in between, so this
//! controller is its own referee and commits the result when time runs out.

use rand::rngs::StdRng;

use super::{Clock, GameController, LocalAction, Phase, Referee, Session};
use crate::config::GameSettings;
use crate::protocol::Message;
use crate::world::{Effect, Painting, PlayerId, World, WorldResult};

pub struct LocalController {
    session: Session,
    referee: Referee,
}

impl LocalController {
    pub fn new(settings: GameSettings) -> WorldResult<Self> {
        Self::with_referee(settings, Referee::from_entropy())
    }

    pub fn with_rng(settings: GameSettings, rng: StdRng) -> WorldResult<Self> {
        Self::with_referee(settings, Referee::new(rng))
    }

    fn with_referee(settings: GameSettings, mut referee: Referee) -> WorldResult<Self> {
        let painting = Painting::by_id(&settings.painting)?;
        let mut world = World::new(painting);
        referee.deal_colours(&mut world);

        let time_limit = settings.time_limit_secs;
        let mut session = Session::new(settings, "");
        session.install_world(world, time_limit);
        session.begin_countdown();
        Ok(Self { session, referee })
    }
}

impl GameController for LocalController {
    fn poll_network(&mut self) {}

    fn update(&mut self, dt: f32) {
        if self.session.advance(dt) == Clock::TimeUp {
            if let Some(outcome) = self.session.world().map(World::outcome) {
                self.session.finish(outcome);
            }
            return;
        }
        if self.session.phase() != Phase::Playing {
            return;
        }
        if let Some(world) = self.session.live_world() {
            self.referee.drop_powerups(world, dt);
            self.referee.award_pickups(world);
        }
    }

    fn on_local_input(&mut self, player: PlayerId, action: LocalAction) {
        if let Some(Message::Attack { .. }) = self.session.perform(player, action) {
            if let Some(world) = self.session.live_world() {
                self.referee.resolve_attack(world, player);
            }
        }
    }

    fn local_players(&self) -> &'static [PlayerId] {
        &PlayerId::ALL
    }

    fn world(&self) -> Option<&World> {
        self.session.world()
    }

    fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn status(&self) -> &str {
        self.session.status()
    }

    fn time_remaining(&self) -> Option<f32> {
        self.session.time_remaining()
    }

    fn drain_effects(&mut self) -> Vec<Effect> {
        self.session.drain_effects()
    }

    fn shutdown(&mut self) {
        tracing::info!("Local match closed");
    }
}
