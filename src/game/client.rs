//! Client side of a networked match
//!
//! The client plays blue. It builds its world from the host's match setup,
//! replays everything the host reports, and tells the host when its own
//! clock has run out so the host can commit the result.

use std::net::SocketAddr;

use super::{Clock, GameController, Handler, LocalAction, Phase, Session};
use crate::config::GameSettings;
use crate::network::{Connection, Transport};
use crate::protocol::{FailureKind, GameConfig, Message, NetFailure, Opcode};
use crate::world::{
    ActorId, ArtworkPosition, ColourId, Effect, Hit, Outcome, PaletteSnapshot, Painting, PlayerId,
    Powerup, PowerupKind, ToolKind, Vec2, World,
};

const LOCAL: PlayerId = PlayerId::Blue;
const REMOTE: PlayerId = PlayerId::Red;

/// Client state and its message handlers
pub struct ClientState {
    session: Session,
    outbox: Vec<Message>,
}

impl ClientState {
    fn new(settings: GameSettings) -> Self {
        Self {
            session: Session::new(settings, "Connecting..."),
            outbox: Vec::new(),
        }
    }

    fn world_for(&mut self, opcode: Opcode) -> Option<&mut World> {
        let world = self.session.live_world();
        if world.is_none() {
            tracing::warn!("Ignoring {:?} outside a match", opcode);
        }
        world
    }

    /// The world, if `player` is the one the host drives
    fn remote_world(&mut self, player: PlayerId, opcode: Opcode) -> Option<&mut World> {
        if player != REMOTE {
            tracing::warn!("Ignoring {:?} for the {} player from the host", opcode, player);
            return None;
        }
        self.world_for(opcode)
    }

    fn update(&mut self, dt: f32) {
        if self.session.advance(dt) == Clock::TimeUp {
            tracing::info!("Time up; telling the host");
            self.outbox.push(Message::EndGame { outcome: None });
        }

        if self.session.position_sync_due(dt) {
            if let Some(pos) = self
                .session
                .world()
                .and_then(|w| w.actor_position(LOCAL.actor()))
            {
                self.outbox.push(Message::Pos {
                    actors: vec![(LOCAL.actor(), pos)],
                });
            }
        }
    }

    fn on_local_input(&mut self, player: PlayerId, action: LocalAction) {
        if player != LOCAL {
            tracing::warn!("The client does not control the {} player", player);
            return;
        }
        if let Some(message) = self.session.perform(player, action) {
            self.outbox.push(message);
        }
    }

    fn setup_failed(&mut self, reason: impl std::fmt::Display) {
        let failure = NetFailure::new(
            FailureKind::Malformed,
            format!("Could not set up the match: {}", reason),
        );
        self.session.fail(&failure);
    }
}

impl Handler for ClientState {
    fn on_connect(&mut self, remote: SocketAddr) {
        self.session.set_phase(
            Phase::Configuring,
            format!("Connected to {}; waiting for the host", remote),
        );
    }

    fn on_game_config(&mut self, config: GameConfig) {
        if self.session.phase() != Phase::Configuring || self.session.world().is_some() {
            tracing::warn!("Ignoring repeated match setup");
            return;
        }

        let painting = match Painting::by_id(&config.painting) {
            Ok(painting) => painting,
            Err(e) => return self.setup_failed(e),
        };
        let world = match World::with_palettes(painting, &config.palettes) {
            Ok(world) => world,
            Err(e) => return self.setup_failed(e),
        };

        tracing::info!(
            "Match setup received: {} for {}s",
            config.painting,
            config.time_limit_secs
        );
        self.session.install_world(world, config.time_limit_secs);
        self.session
            .set_phase(Phase::Configuring, "Waiting for the host to start");
        self.outbox.push(Message::Start);
    }

    fn on_start(&mut self) {
        if self.session.phase() != Phase::Configuring || self.session.world().is_none() {
            tracing::warn!("Ignoring START in phase {}", self.session.phase());
            return;
        }
        self.session.begin_countdown();
    }

    fn on_palette_change(&mut self, player: PlayerId, palette: PaletteSnapshot) {
        if let Some(world) = self.remote_world(player, Opcode::PaletteChange) {
            if let Err(e) = world.apply_palette(player, &palette) {
                tracing::warn!("Bad palette from the host: {}", e);
            }
        }
    }

    fn on_tool_move(&mut self, player: PlayerId, pos: ArtworkPosition) {
        if let Some(world) = self.remote_world(player, Opcode::ToolMove) {
            if let Err(e) = world.set_tool_position(player, pos) {
                tracing::warn!("Bad tool move from the host: {}", e);
            }
        }
    }

    fn on_paint(&mut self, player: PlayerId, tool: ToolKind, pos: ArtworkPosition, colour: ColourId) {
        if let Some(world) = self.remote_world(player, Opcode::Paint) {
            if let Err(e) = world.apply_paint(player, tool, pos, colour) {
                tracing::warn!("Bad paint from the host: {}", e);
            }
        }
    }

    fn on_attack(&mut self, actor: ActorId, pos: Vec2) {
        if actor != REMOTE.actor() {
            tracing::warn!("Ignoring attack by {} from the host", actor);
            return;
        }
        if let Some(world) = self.world_for(Opcode::Attack) {
            if let Err(e) = world.apply_attack(actor, pos) {
                tracing::warn!("Bad attack from the host: {}", e);
            }
        }
    }

    fn on_hit(&mut self, actor: ActorId, vector: Vec2, stun: f32) {
        if let Some(world) = self.world_for(Opcode::Hit) {
            // May overwrite a tool move of ours still in flight to the host
            if let Err(e) = world.apply_hit(&Hit { actor, vector, stun }) {
                tracing::warn!("Bad hit from the host: {}", e);
            }
        }
    }

    fn on_powerup_spawn(&mut self, id: ActorId, kind: PowerupKind, pos: Vec2) {
        if let Some(world) = self.world_for(Opcode::PowerupSpawn) {
            tracing::debug!("Host dropped {:?} as {}", kind, id);
            world.spawn_powerup(Powerup::from_spawn(id, kind, pos));
        }
    }

    fn on_pickup(&mut self, player: PlayerId, powerup: ActorId) {
        if let Some(world) = self.world_for(Opcode::Pickup) {
            if let Err(e) = world.pickup(player, powerup) {
                tracing::warn!("Bad pickup from the host: {}", e);
            }
        }
    }

    fn on_pos(&mut self, actors: Vec<(ActorId, Vec2)>) {
        let Some(world) = self.session.live_world() else {
            return;
        };
        for (actor, pos) in actors {
            if actor == LOCAL.actor() {
                tracing::warn!("Ignoring host position for our own character");
                continue;
            }
            if let Err(e) = world.set_actor_position(actor, pos) {
                tracing::debug!("Skipping position for {}: {}", actor, e);
            }
        }
    }

    fn on_end_game(&mut self, outcome: Option<Outcome>) {
        match outcome {
            Some(outcome) if self.session.world().is_some() => self.session.finish(outcome),
            Some(_) => tracing::warn!("Ignoring a result before the match was set up"),
            None => tracing::warn!("The host sent ENDGAME without a result"),
        }
    }

    fn on_disconnect(&mut self) {
        self.session.fail(&NetFailure::new(
            FailureKind::Closed,
            "The host left the game",
        ));
    }

    fn on_error(&mut self, failure: NetFailure) {
        self.session.fail(&failure);
    }
}

/// Controller for the joining endpoint
pub struct ClientController<T: Transport = Connection> {
    pub(super) transport: T,
    state: ClientState,
}

impl<T: Transport> ClientController<T> {
    pub fn new(transport: T, settings: GameSettings) -> Self {
        Self {
            transport,
            state: ClientState::new(settings),
        }
    }

    fn flush(&mut self) {
        for message in self.state.outbox.drain(..) {
            self.transport.send(message);
        }
    }
}

impl<T: Transport> GameController for ClientController<T> {
    fn poll_network(&mut self) {
        super::drain(&mut self.transport, &mut self.state);
        self.flush();
    }

    fn update(&mut self, dt: f32) {
        self.state.update(dt);
        self.flush();
    }

    fn on_local_input(&mut self, player: PlayerId, action: LocalAction) {
        self.state.on_local_input(player, action);
        self.flush();
    }

    fn local_players(&self) -> &'static [PlayerId] {
        &[LOCAL]
    }

    fn world(&self) -> Option<&World> {
        self.state.session.world()
    }

    fn phase(&self) -> Phase {
        self.state.session.phase()
    }

    fn status(&self) -> &str {
        self.state.session.status()
    }

    fn time_remaining(&self) -> Option<f32> {
        self.state.session.time_remaining()
    }

    fn drain_effects(&mut self) -> Vec<Effect> {
        self.state.session.drain_effects()
    }

    fn shutdown(&mut self) {
        self.flush();
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;
    use crate::protocol::Frame;
    use crate::world::MAX_COLOURS;

    fn palette(colour: ColourId) -> PaletteSnapshot {
        let mut colours = vec![None; MAX_COLOURS];
        colours[0] = Some(colour);
        PaletteSnapshot {
            colours,
            selected: Some(0),
        }
    }

    fn game_config(painting: &str) -> Message {
        Message::GameConfig(GameConfig {
            painting: painting.to_string(),
            time_limit_secs: 60,
            palettes: [palette(0), palette(1)],
        })
    }

    /// A client talking to a scripted host end
    fn scripted() -> (ClientController<MemoryTransport>, MemoryTransport) {
        let (client_end, mut host_end) = MemoryTransport::pair();
        host_end.try_receive();
        let settings = GameSettings {
            countdown_secs: 1,
            ..Default::default()
        };
        (ClientController::new(client_end, settings), host_end)
    }

    fn playing() -> (ClientController<MemoryTransport>, MemoryTransport) {
        let (mut client, mut host) = scripted();
        host.send(game_config("mondrian"));
        host.send(Message::Start);
        client.poll_network();
        client.update(1.0);
        assert_eq!(client.phase(), Phase::Playing);
        while host.try_receive().is_some() {}
        (client, host)
    }

    #[test]
    fn test_game_config_builds_world_and_replies_start() {
        let (mut client, mut host) = scripted();
        client.poll_network();
        assert_eq!(client.phase(), Phase::Configuring);
        assert!(client.world().is_none());

        host.send(game_config("sunset"));
        client.poll_network();

        let world = client.world().unwrap();
        assert_eq!(world.painting().id(), "sunset");
        assert_eq!(world.palette(PlayerId::Blue).selected(), Some(1));
        assert_eq!(client.time_remaining(), None);
        assert_eq!(host.try_receive(), Some(Frame::Message(Message::Start)));
    }

    #[test]
    fn test_unknown_painting_fails_setup() {
        let (mut client, mut host) = scripted();
        host.send(game_config("the-scream"));
        client.poll_network();
        assert_eq!(client.phase(), Phase::Failed);
        assert!(client.status().contains("the-scream"));
        assert!(host.try_receive().is_none());
    }

    #[test]
    fn test_pos_apply_is_idempotent() {
        let (mut client, host) = playing();
        let pos = Message::Pos {
            actors: vec![(PlayerId::Red.actor(), Vec2::new(321.0, 123.0))],
        };

        host.send(pos.clone());
        client.poll_network();
        let once = client.world().unwrap().actor_positions();

        host.send(pos);
        client.poll_network();
        assert_eq!(client.world().unwrap().actor_positions(), once);
        assert_eq!(
            client.world().unwrap().actor_position(PlayerId::Red.actor()),
            Some(Vec2::new(321.0, 123.0))
        );
    }

    #[test]
    fn test_host_cannot_move_our_character() {
        let (mut client, host) = playing();
        let before = client.world().unwrap().actor_position(LOCAL.actor());
        host.send(Message::Pos {
            actors: vec![(LOCAL.actor(), Vec2::new(10.0, 10.0))],
        });
        client.poll_network();
        assert_eq!(client.world().unwrap().actor_position(LOCAL.actor()), before);
    }

    #[test]
    fn test_powerup_spawn_and_pickup() {
        let (mut client, host) = playing();
        let kind = PowerupKind::PaintCan { colour: 3 };
        host.send(Message::PowerupSpawn {
            id: ActorId(16),
            kind,
            pos: Vec2::new(200.0, 100.0),
        });
        client.poll_network();
        assert_eq!(client.world().unwrap().powerups().len(), 1);

        host.send(Message::Pickup {
            player: LOCAL,
            powerup: ActorId(16),
        });
        client.poll_network();
        let world = client.world().unwrap();
        assert!(world.powerups().is_empty());
        assert!(world.palette(LOCAL).colours().contains(&Some(3)));
    }

    #[test]
    fn test_local_attack_is_not_resolved() {
        let (mut client, mut host) = playing();
        client.on_local_input(LOCAL, LocalAction::Attack);
        assert!(matches!(
            host.try_receive(),
            Some(Frame::Message(Message::Attack { .. }))
        ));
        assert!(host.try_receive().is_none());
        assert!(!client.world().unwrap().is_stunned(REMOTE));
    }

    #[test]
    fn test_timer_expiry_sends_endgame_once() {
        let (mut client, mut host) = playing();
        for _ in 0..70 {
            client.update(1.0);
        }
        assert_eq!(client.phase(), Phase::AwaitingResult);

        let endings = std::iter::from_fn(|| host.try_receive())
            .filter(|f| matches!(f, Frame::Message(Message::EndGame { .. })))
            .count();
        assert_eq!(endings, 1);

        host.send(Message::EndGame {
            outcome: Some(Outcome::Draw),
        });
        client.poll_network();
        assert_eq!(client.phase(), Phase::Finished(Outcome::Draw));
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let (mut client, host) = playing();
        client.transport.inject(Frame::Unknown { opcode: 0x55 });
        host.send(Message::ToolMove {
            player: REMOTE,
            pos: ArtworkPosition::new(0, 5, 6),
        });
        client.poll_network();
        assert_eq!(
            client.world().unwrap().tool_position(REMOTE),
            ArtworkPosition::new(0, 5, 6)
        );
    }
}
