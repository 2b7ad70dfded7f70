//! Host side of a networked match
//!
//! The host plays red and is authoritative: it picks the painting and the
//! starting palettes, drops powerups, decides pickups and hits, and commits
//! the result once the client reports that its own clock has run out.

use rand::rngs::StdRng;
use std::net::SocketAddr;

use super::{Clock, GameController, Handler, LocalAction, Phase, Referee, Session};
use crate::config::GameSettings;
use crate::network::{Connection, Transport};
use crate::protocol::{FailureKind, GameConfig, Message, NetFailure, Opcode};
use crate::world::{
    ActorId, ArtworkPosition, ColourId, Effect, Outcome, PaletteSnapshot, Painting, PlayerId, ToolKind,
    Vec2, World,
};

/// The player whose input the host accepts
const LOCAL: PlayerId = PlayerId::Red;
/// The player the client controls
const REMOTE: PlayerId = PlayerId::Blue;

/// Host state and its message handlers
pub struct HostState {
    session: Session,
    referee: Referee,
    outbox: Vec<Message>,
}

impl HostState {
    fn new(settings: GameSettings, referee: Referee) -> Self {
        Self {
            session: Session::new(settings, "Waiting for a challenger"),
            referee,
            outbox: Vec::new(),
        }
    }

    /// The world, if `player` is the one the client is allowed to drive
    fn remote_world(&mut self, player: PlayerId, opcode: Opcode) -> Option<&mut World> {
        if player != REMOTE {
            tracing::warn!("Ignoring {:?} for the {} player from the client", opcode, player);
            return None;
        }
        let world = self.session.live_world();
        if world.is_none() {
            tracing::warn!("Ignoring {:?} outside a match", opcode);
        }
        world
    }

    fn configure(&mut self) {
        let settings = self.session.settings().clone();
        let painting = match Painting::by_id(&settings.painting) {
            Ok(painting) => painting,
            Err(e) => {
                self.session
                    .set_phase(Phase::Failed, format!("Could not set up the match: {}", e));
                return;
            }
        };

        let mut world = World::new(painting);
        self.referee.deal_colours(&mut world);

        let config = GameConfig {
            painting: settings.painting.clone(),
            time_limit_secs: settings.time_limit_secs,
            palettes: PlayerId::ALL.map(|p| world.palette(p).snapshot()),
        };
        tracing::info!(
            "Sending match setup: {} for {}s",
            config.painting,
            config.time_limit_secs
        );
        self.outbox.push(Message::GameConfig(config));
        self.session.install_world(world, settings.time_limit_secs);
    }

    /// Resolve an attack by `attacker` and replicate any hit
    fn referee_attack(&mut self, attacker: PlayerId) {
        if let Some(world) = self.session.live_world() {
            if let Some(hit) = self.referee.resolve_attack(world, attacker) {
                self.outbox.push(hit);
            }
        }
    }

    fn update(&mut self, dt: f32) {
        if self.session.advance(dt) == Clock::TimeUp {
            // The result is committed when the client's ENDGAME arrives
            self.session.set_phase(
                Phase::AwaitingResult,
                "Time up! Waiting for the remote player",
            );
        }
        if self.session.phase() != Phase::Playing {
            return;
        }

        let sync = self.session.position_sync_due(dt);
        let Some(world) = self.session.live_world() else {
            return;
        };
        self.outbox.extend(self.referee.drop_powerups(world, dt));
        self.outbox.extend(self.referee.award_pickups(world));

        if sync {
            let actors = world
                .actor_positions()
                .into_iter()
                .filter(|(id, _)| *id != REMOTE.actor())
                .collect();
            self.outbox.push(Message::Pos { actors });
        }
    }

    fn on_local_input(&mut self, player: PlayerId, action: LocalAction) {
        if player != LOCAL {
            tracing::warn!("The host does not control the {} player", player);
            return;
        }
        if let Some(message) = self.session.perform(player, action) {
            let attacked = matches!(message, Message::Attack { .. });
            self.outbox.push(message);
            if attacked {
                self.referee_attack(player);
            }
        }
    }
}

impl Handler for HostState {
    fn on_connect(&mut self, remote: SocketAddr) {
        if self.session.phase() != Phase::Connecting {
            tracing::warn!("Unexpected connection event from {}", remote);
            return;
        }
        self.session
            .set_phase(Phase::Configuring, format!("Connected to {}", remote));
        self.configure();
    }

    fn on_start(&mut self) {
        if self.session.phase() != Phase::Configuring || self.session.world().is_none() {
            tracing::warn!("Ignoring START in phase {}", self.session.phase());
            return;
        }
        self.outbox.push(Message::Start);
        self.session.begin_countdown();
    }

    fn on_palette_change(&mut self, player: PlayerId, palette: PaletteSnapshot) {
        if let Some(world) = self.remote_world(player, Opcode::PaletteChange) {
            if let Err(e) = world.apply_palette(player, &palette) {
                tracing::warn!("Bad palette from the client: {}", e);
            }
        }
    }

    fn on_tool_move(&mut self, player: PlayerId, pos: ArtworkPosition) {
        if let Some(world) = self.remote_world(player, Opcode::ToolMove) {
            if let Err(e) = world.set_tool_position(player, pos) {
                tracing::warn!("Bad tool move from the client: {}", e);
            }
        }
    }

    fn on_paint(&mut self, player: PlayerId, tool: ToolKind, pos: ArtworkPosition, colour: ColourId) {
        if let Some(world) = self.remote_world(player, Opcode::Paint) {
            if let Err(e) = world.apply_paint(player, tool, pos, colour) {
                tracing::warn!("Bad paint from the client: {}", e);
            }
        }
    }

    fn on_attack(&mut self, actor: ActorId, pos: Vec2) {
        if actor != REMOTE.actor() {
            tracing::warn!("Ignoring attack by {} from the client", actor);
            return;
        }
        let Some(world) = self.remote_world(REMOTE, Opcode::Attack) else {
            return;
        };
        if let Err(e) = world.apply_attack(actor, pos) {
            tracing::warn!("Bad attack from the client: {}", e);
            return;
        }
        self.referee_attack(REMOTE);
    }

    fn on_pos(&mut self, actors: Vec<(ActorId, Vec2)>) {
        let Some(world) = self.session.live_world() else {
            return;
        };
        for (actor, pos) in actors {
            if actor != REMOTE.actor() {
                tracing::warn!("Ignoring client position for {}", actor);
                continue;
            }
            if let Err(e) = world.set_actor_position(actor, pos) {
                tracing::warn!("Bad position from the client: {}", e);
            }
        }
    }

    fn on_end_game(&mut self, outcome: Option<Outcome>) {
        if outcome.is_some() {
            tracing::warn!("The client tried to declare a result; ignoring it");
        }
        if !matches!(self.session.phase(), Phase::Playing | Phase::AwaitingResult) {
            tracing::warn!("Ignoring ENDGAME in phase {}", self.session.phase());
            return;
        }
        let Some(world) = self.session.world() else {
            return;
        };

        let result = world.outcome();
        tracing::info!(
            "Client finished; red {:?} blue {:?}",
            world.completeness(PlayerId::Red),
            world.completeness(PlayerId::Blue)
        );
        self.outbox.push(Message::EndGame {
            outcome: Some(result),
        });
        self.session.finish(result);
    }

    fn on_disconnect(&mut self) {
        self.session.fail(&NetFailure::new(
            FailureKind::Closed,
            "The remote player left the game",
        ));
    }

    fn on_error(&mut self, failure: NetFailure) {
        self.session.fail(&failure);
    }
}

/// Controller for the hosting endpoint
pub struct HostController<T: Transport = Connection> {
    transport: T,
    state: HostState,
}

impl<T: Transport> HostController<T> {
    pub fn new(transport: T, settings: GameSettings) -> Self {
        Self::with_referee(transport, settings, Referee::from_entropy())
    }

    /// A host whose random choices come from `rng`
    pub fn with_rng(transport: T, settings: GameSettings, rng: StdRng) -> Self {
        Self::with_referee(transport, settings, Referee::new(rng))
    }

    fn with_referee(transport: T, settings: GameSettings, referee: Referee) -> Self {
        Self {
            transport,
            state: HostState::new(settings, referee),
        }
    }

    fn flush(&mut self) {
        for message in self.state.outbox.drain(..) {
            self.transport.send(message);
        }
    }
}

impl<T: Transport> GameController for HostController<T> {
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
    use crate::game::ClientController;
    use crate::network::MemoryTransport;
    use crate::protocol::Frame;
    use crate::world::MAX_COLOURS;
    use rand::SeedableRng;

    const DT: f32 = 0.1;

    fn settings() -> GameSettings {
        GameSettings {
            time_limit_secs: 2,
            countdown_secs: 1,
            ..Default::default()
        }
    }

    fn pair() -> (
        HostController<MemoryTransport>,
        ClientController<MemoryTransport>,
    ) {
        let (host_end, client_end) = MemoryTransport::pair();
        let host = HostController::with_rng(host_end, settings(), StdRng::seed_from_u64(7));
        let client = ClientController::new(client_end, settings());
        (host, client)
    }

    fn start_match() -> (
        HostController<MemoryTransport>,
        ClientController<MemoryTransport>,
    ) {
        let (mut host, mut client) = pair();
        for _ in 0..100 {
            host.tick(DT);
            client.tick(DT);
            if host.phase() == Phase::Playing && client.phase() == Phase::Playing {
                return (host, client);
            }
        }
        panic!("match never started");
    }

    fn only_colour(colour: ColourId) -> PaletteSnapshot {
        let mut colours = vec![None; MAX_COLOURS];
        colours[0] = Some(colour);
        PaletteSnapshot {
            colours,
            selected: Some(0),
        }
    }

    fn host_world(host: &mut HostController<MemoryTransport>) -> &mut World {
        host.state.session.live_world().unwrap()
    }

    #[test]
    fn test_setup_replicates_palettes() {
        let (host, client) = start_match();
        let (h, c) = (host.world().unwrap(), client.world().unwrap());
        assert_eq!(h.painting().id(), c.painting().id());
        for player in PlayerId::ALL {
            assert_eq!(h.palette(player), c.palette(player));
        }
        assert_eq!(client.time_remaining().map(f32::round), Some(2.0));
    }

    #[test]
    fn test_paint_converges_without_echo() {
        let (mut host, mut client) = start_match();
        host_world(&mut host).apply_palette(LOCAL, &only_colour(2)).unwrap();

        let start = host.world().unwrap().tool_position(LOCAL);
        host.on_local_input(LOCAL, LocalAction::Move { dx: 10 - start.x, dy: 12 - start.y });
        host.on_local_input(LOCAL, LocalAction::Paint);
        assert_eq!(host.world().unwrap().artwork(0).unwrap().pixel(10, 12), Some(2));

        client.poll_network();
        let artwork = client.world().unwrap().artwork(0).unwrap();
        assert_eq!(artwork.pixel(10, 12), Some(2));
        assert_eq!(client.world().unwrap().tool_position(LOCAL), ArtworkPosition::new(0, 10, 12));

        while let Some(frame) = host.transport.try_receive() {
            assert!(
                !matches!(frame, Frame::Message(Message::Paint { .. } | Message::ToolMove { .. })),
                "client echoed {:?}",
                frame
            );
        }
    }

    #[test]
    fn test_client_paint_reaches_host() {
        let (mut host, mut client) = start_match();
        let colour = client.world().unwrap().palette(REMOTE).selected().unwrap();

        client.on_local_input(REMOTE, LocalAction::Paint);
        let pos = client.world().unwrap().tool_position(REMOTE);
        host.poll_network();

        let artwork = host.world().unwrap().artwork(1).unwrap();
        assert_eq!(artwork.pixel(pos.x, pos.y), Some(colour));
    }

    #[test]
    fn test_host_waits_for_client_endgame() {
        let (mut host, mut client) = start_match();

        // Paint one correct pixel so red wins
        let target = host.world().unwrap().painting().pixel(30, 20).unwrap();
        host_world(&mut host).apply_palette(LOCAL, &only_colour(target)).unwrap();
        let start = host.world().unwrap().tool_position(LOCAL);
        host.on_local_input(LOCAL, LocalAction::Move { dx: 30 - start.x, dy: 20 - start.y });
        host.on_local_input(LOCAL, LocalAction::Paint);

        for _ in 0..40 {
            host.tick(DT);
        }
        assert_eq!(host.phase(), Phase::AwaitingResult);

        let mut ended = false;
        for _ in 0..40 {
            client.tick(DT);
            host.poll_network();
            if let Phase::Finished(outcome) = host.phase() {
                assert_eq!(outcome, Outcome::Winner(PlayerId::Red));
                ended = true;
                break;
            }
        }
        assert!(ended, "host never finalized");

        client.poll_network();
        assert_eq!(client.phase(), Phase::Finished(Outcome::Winner(PlayerId::Red)));
    }

    #[test]
    fn test_paint_after_host_time_up_counts() {
        let (mut host, mut client) = start_match();
        for _ in 0..40 {
            host.tick(DT);
        }
        assert_eq!(host.phase(), Phase::AwaitingResult);

        // Blue still has time on its clock and paints one correct pixel
        let (dx, dy) = {
            let world = client.world().unwrap();
            let colour = world.palette(REMOTE).selected().unwrap();
            let painting = world.painting();
            let (x, y) = (0..painting.height())
                .flat_map(|y| (0..painting.width()).map(move |x| (x, y)))
                .find(|&(x, y)| painting.pixel(x, y) == Some(colour))
                .expect("every colour appears in the painting");
            let start = world.tool_position(REMOTE);
            (x as i32 - start.x, y as i32 - start.y)
        };
        assert_eq!(client.phase(), Phase::Playing);
        client.on_local_input(REMOTE, LocalAction::Move { dx, dy });
        client.on_local_input(REMOTE, LocalAction::Paint);

        let mut ended = false;
        for _ in 0..60 {
            client.tick(DT);
            host.poll_network();
            if let Phase::Finished(outcome) = host.phase() {
                assert_eq!(outcome, Outcome::Winner(PlayerId::Blue));
                ended = true;
                break;
            }
        }
        assert!(ended, "host never finalized");
        assert!(host.world().unwrap().completeness(PlayerId::Blue).0 >= 1);
    }

    #[test]
    fn test_host_ignores_its_own_timer() {
        let (mut host, _client) = start_match();
        for _ in 0..100 {
            host.tick(DT);
        }
        assert_eq!(host.phase(), Phase::AwaitingResult);
        assert!(host.status().contains("Waiting"));
    }

    #[test]
    fn test_remote_attack_resolved_by_host() {
        let (mut host, mut client) = start_match();
        let world = host_world(&mut host);
        world.set_actor_position(LOCAL.actor(), Vec2::new(500.0, 150.0)).unwrap();

        // The client attacks from right beside red
        host.transport.inject(Frame::Message(Message::Attack {
            actor: REMOTE.actor(),
            pos: Vec2::new(490.0, 150.0),
        }));
        host.poll_network();
        assert!(host.world().unwrap().is_stunned(LOCAL));

        client.poll_network();
        assert!(client.world().unwrap().is_stunned(LOCAL));
    }

    #[test]
    fn test_client_cannot_drive_host_player() {
        let (mut host, _client) = start_match();
        let before = host.world().unwrap().tool_position(LOCAL);
        host.transport.inject(Frame::Message(Message::ToolMove {
            player: LOCAL,
            pos: ArtworkPosition::new(0, 1, 1),
        }));
        host.poll_network();
        assert_eq!(host.world().unwrap().tool_position(LOCAL), before);
    }

    #[test]
    fn test_error_freezes_match() {
        let (mut host, _client) = start_match();
        host.transport.inject(Frame::Message(Message::Err(NetFailure::new(
            FailureKind::Transport,
            "Network error: connection reset",
        ))));
        host.transport.inject(Frame::Message(Message::EndGame { outcome: None }));

        host.poll_network();
        assert_eq!(host.phase(), Phase::Failed);
        assert_eq!(host.status(), "Network error: connection reset");

        let left = host.time_remaining();
        host.tick(DT);
        host.on_local_input(LOCAL, LocalAction::Paint);
        assert_eq!(host.phase(), Phase::Failed);
        assert_eq!(host.time_remaining(), left);
    }

    #[test]
    fn test_disconnect_fails_session() {
        let (mut host, mut client) = start_match();
        client.shutdown();
        host.poll_network();
        assert_eq!(host.phase(), Phase::Failed);
        assert!(host.status().contains("left"));
    }

    #[test]
    fn test_position_sync_split() {
        let (mut host, mut client) = start_match();
        while host.transport.try_receive().is_some() {}
        while client.transport.try_receive().is_some() {}

        for _ in 0..5 {
            host.update(DT);
            client.update(DT);
        }

        let host_sent: Vec<Frame> = std::iter::from_fn(|| client.transport.try_receive()).collect();
        let client_sent: Vec<Frame> = std::iter::from_fn(|| host.transport.try_receive()).collect();

        let actors = |frames: &[Frame]| -> Vec<ActorId> {
            frames
                .iter()
                .filter_map(|f| match f {
                    Frame::Message(Message::Pos { actors }) => Some(actors.iter().map(|(id, _)| *id)),
                    _ => None,
                })
                .flatten()
                .collect()
        };

        let from_host = actors(&host_sent);
        assert!(from_host.contains(&PlayerId::Red.actor()));
        assert!(!from_host.contains(&PlayerId::Blue.actor()));
        assert_eq!(actors(&client_sent), vec![PlayerId::Blue.actor()]);
    }
}
