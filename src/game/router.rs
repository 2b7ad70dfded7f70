//! Opcode dispatch
//!
//! Maps each inbound frame to one typed handler call. Handlers a side does
//! not implement fall through to `on_unhandled`, which logs and drops the
//! message.

use std::net::SocketAddr;

use crate::network::Transport;
use crate::protocol::{Frame, GameConfig, Message, NetFailure, Opcode};
use crate::world::{ActorId, ArtworkPosition, ColourId, Outcome, PaletteSnapshot, PlayerId, PowerupKind, ToolKind, Vec2};

/// Receives dispatched messages on one side of a match
pub trait Handler {
    fn on_connect(&mut self, remote: SocketAddr);

    fn on_game_config(&mut self, _config: GameConfig) {
        self.on_unhandled(Opcode::GameConfig);
    }

    fn on_start(&mut self) {
        self.on_unhandled(Opcode::Start);
    }

    fn on_palette_change(&mut self, _player: PlayerId, _palette: PaletteSnapshot) {
        self.on_unhandled(Opcode::PaletteChange);
    }

    fn on_tool_move(&mut self, _player: PlayerId, _pos: ArtworkPosition) {
        self.on_unhandled(Opcode::ToolMove);
    }

    fn on_paint(&mut self, _player: PlayerId, _tool: ToolKind, _pos: ArtworkPosition, _colour: ColourId) {
        self.on_unhandled(Opcode::Paint);
    }

    fn on_attack(&mut self, _actor: ActorId, _pos: Vec2) {
        self.on_unhandled(Opcode::Attack);
    }

    fn on_hit(&mut self, _actor: ActorId, _vector: Vec2, _stun: f32) {
        self.on_unhandled(Opcode::Hit);
    }

    fn on_powerup_spawn(&mut self, _id: ActorId, _kind: PowerupKind, _pos: Vec2) {
        self.on_unhandled(Opcode::PowerupSpawn);
    }

    fn on_pickup(&mut self, _player: PlayerId, _powerup: ActorId) {
        self.on_unhandled(Opcode::Pickup);
    }

    fn on_pos(&mut self, _actors: Vec<(ActorId, Vec2)>) {
        self.on_unhandled(Opcode::Pos);
    }

    fn on_end_game(&mut self, _outcome: Option<Outcome>) {
        self.on_unhandled(Opcode::EndGame);
    }

    fn on_disconnect(&mut self);

    fn on_error(&mut self, failure: NetFailure);

    /// A known message this side has no use for
    fn on_unhandled(&mut self, opcode: Opcode) {
        tracing::warn!("No handler for {:?}; dropping it", opcode);
    }
}

/// Call the handler for one frame
pub fn dispatch<H: Handler + ?Sized>(handler: &mut H, frame: Frame) {
    let message = match frame {
        Frame::Message(message) => message,
        Frame::Unknown { opcode } => {
            tracing::warn!("Unknown opcode {:#04x}; dropping it", opcode);
            return;
        }
    };

    tracing::trace!("Dispatching {:?}", message.opcode());
    match message {
        Message::Connect { remote } => handler.on_connect(remote),
        Message::Version { .. } => handler.on_unhandled(Opcode::Version),
        Message::GameConfig(config) => handler.on_game_config(config),
        Message::Start => handler.on_start(),
        Message::PaletteChange { player, palette } => handler.on_palette_change(player, palette),
        Message::ToolMove { player, pos } => handler.on_tool_move(player, pos),
        Message::Paint {
            player,
            tool,
            pos,
            colour,
        } => handler.on_paint(player, tool, pos, colour),
        Message::Attack { actor, pos } => handler.on_attack(actor, pos),
        Message::Hit { actor, vector, stun } => handler.on_hit(actor, vector, stun),
        Message::PowerupSpawn { id, kind, pos } => handler.on_powerup_spawn(id, kind, pos),
        Message::Pickup { player, powerup } => handler.on_pickup(player, powerup),
        Message::Pos { actors } => handler.on_pos(actors),
        Message::EndGame { outcome } => handler.on_end_game(outcome),
        Message::Disconnect => handler.on_disconnect(),
        Message::Err(failure) => handler.on_error(failure),
    }
}

/// Dispatch everything currently queued, in order of receipt.
///
/// Stops after an error event. Returns the number of frames dispatched.
pub fn drain<T, H>(transport: &mut T, handler: &mut H) -> usize
where
    T: Transport + ?Sized,
    H: Handler + ?Sized,
{
    let mut count = 0;
    while let Some(frame) = transport.try_receive() {
        let fatal = matches!(frame, Frame::Message(Message::Err(_)));
        dispatch(handler, frame);
        count += 1;
        if fatal {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;
    use crate::protocol::FailureKind;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        unhandled: Vec<Opcode>,
    }

    impl Handler for Recorder {
        fn on_connect(&mut self, _remote: SocketAddr) {
            self.seen.push("connect".into());
        }

        fn on_start(&mut self) {
            self.seen.push("start".into());
        }

        fn on_tool_move(&mut self, player: PlayerId, pos: ArtworkPosition) {
            self.seen.push(format!("move {} {},{}", player, pos.x, pos.y));
        }

        fn on_disconnect(&mut self) {
            self.seen.push("disconnect".into());
        }

        fn on_error(&mut self, failure: NetFailure) {
            self.seen.push(format!("error {}", failure));
        }

        fn on_unhandled(&mut self, opcode: Opcode) {
            self.unhandled.push(opcode);
        }
    }

    #[test]
    fn test_dispatch_preserves_order() {
        let (mut a, b) = MemoryTransport::pair();
        b.send(Message::Start);
        b.send(Message::ToolMove {
            player: PlayerId::Blue,
            pos: ArtworkPosition::new(1, 3, 4),
        });
        b.send(Message::Disconnect);

        let mut recorder = Recorder::default();
        assert_eq!(drain(&mut a, &mut recorder), 4);
        assert_eq!(recorder.seen, vec!["connect", "start", "move blue 3,4", "disconnect"]);
    }

    #[test]
    fn test_unknown_and_unhandled_are_skipped() {
        let (mut a, b) = MemoryTransport::pair();
        a.inject(Frame::Unknown { opcode: 0x7f });
        b.send(Message::EndGame { outcome: None });
        b.send(Message::Start);

        let mut recorder = Recorder::default();
        drain(&mut a, &mut recorder);
        assert_eq!(recorder.seen, vec!["connect", "start"]);
        assert_eq!(recorder.unhandled, vec![Opcode::EndGame]);
    }

    #[test]
    fn test_nothing_dispatched_after_error() {
        let (mut a, b) = MemoryTransport::pair();
        a.inject(Frame::Message(Message::Err(NetFailure::new(
            FailureKind::Transport,
            "Network error: reset",
        ))));
        b.send(Message::Start);

        let mut recorder = Recorder::default();
        assert_eq!(drain(&mut a, &mut recorder), 2);
        assert_eq!(drain(&mut a, &mut recorder), 0);
        assert_eq!(recorder.seen, vec!["connect", "error Network error: reset"]);
    }
}
