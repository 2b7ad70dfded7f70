//! Game module - Host, client and local controllers for a match
//!
//! A controller owns one copy of the world and the session clock. Networked
//! controllers also own a transport: each tick they drain the inbound queue
//! through the router, advance the simulation, then flush the outbox of
//! messages produced along the way.
//!
//! Local input is applied to the world first and replicated second, so the
//! player who acted never waits on the network.

mod client;
mod host;
mod local;
mod referee;
mod router;

pub use client::*;
pub use host::*;
pub use local::*;
pub use referee::*;
pub use router::*;

use std::fmt;

use crate::config::GameSettings;
use crate::protocol::{Message, NetFailure};
use crate::world::{Effect, Outcome, PlayerId, World};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the transport to connect
    Connecting,
    /// Connected; exchanging the match setup
    Configuring,
    /// Both sides ready, counting down to play
    Countdown,
    Playing,
    /// Local time is up; waiting for the end-of-game exchange
    AwaitingResult,
    Finished(Outcome),
    /// The connection failed; the match is frozen
    Failed,
}

impl Phase {
    /// Whether the world still accepts gameplay events
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Phase::Configuring | Phase::Countdown | Phase::Playing | Phase::AwaitingResult
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connecting => write!(f, "connecting"),
            Phase::Configuring => write!(f, "configuring"),
            Phase::Countdown => write!(f, "countdown"),
            Phase::Playing => write!(f, "playing"),
            Phase::AwaitingResult => write!(f, "awaiting result"),
            Phase::Finished(_) => write!(f, "finished"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Something a local player asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Move { dx: i32, dy: i32 },
    Paint,
    NextColour,
    Attack,
}

/// The interface the game loop drives
pub trait GameController {
    /// Drain and dispatch everything the peer has sent
    fn poll_network(&mut self);

    /// Advance the simulation by `dt` seconds
    fn update(&mut self, dt: f32);

    /// A local player pressed something
    fn on_local_input(&mut self, player: PlayerId, action: LocalAction);

    /// Players whose input this controller accepts
    fn local_players(&self) -> &'static [PlayerId];

    fn world(&self) -> Option<&World>;

    fn phase(&self) -> Phase;

    /// Short status line for the player
    fn status(&self) -> &str;

    /// Seconds of play left, once the match has started
    fn time_remaining(&self) -> Option<f32>;

    /// Take the renderer feedback queued since the last call
    fn drain_effects(&mut self) -> Vec<Effect>;

    /// End the session, saying goodbye to the peer if there is one
    fn shutdown(&mut self);

    /// One fixed-rate iteration of the game loop
    fn tick(&mut self, dt: f32) {
        self.poll_network();
        self.update(dt);
    }
}

/// What the session clock did during an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Idle,
    Running,
    /// The local timer just ran out
    TimeUp,
}

/// State shared by every controller: world, phase, status and timers
#[derive(Debug)]
pub struct Session {
    settings: GameSettings,
    world: Option<World>,
    phase: Phase,
    status: String,
    countdown: f32,
    time_limit: f32,
    time_left: f32,
    pos_timer: f32,
}

impl Session {
    pub fn new(settings: GameSettings, status: impl Into<String>) -> Self {
        Self {
            time_limit: settings.time_limit_secs as f32,
            settings,
            world: None,
            phase: Phase::Connecting,
            status: status.into(),
            countdown: 0.0,
            time_left: 0.0,
            pos_timer: 0.0,
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    /// The world, while it still accepts changes
    pub fn live_world(&mut self) -> Option<&mut World> {
        if self.phase.is_live() {
            self.world.as_mut()
        } else {
            None
        }
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.world.as_mut().map(World::drain_effects).unwrap_or_default()
    }

    pub fn time_remaining(&self) -> Option<f32> {
        match self.phase {
            Phase::Playing | Phase::AwaitingResult | Phase::Finished(_) => Some(self.time_left.max(0.0)),
            Phase::Countdown => Some(self.time_limit),
            _ => None,
        }
    }

    pub fn set_phase(&mut self, phase: Phase, status: impl Into<String>) {
        if phase != self.phase {
            tracing::info!("Phase {} -> {}", self.phase, phase);
        }
        self.phase = phase;
        self.status = status.into();
    }

    /// Adopt a freshly built world and the match length
    pub fn install_world(&mut self, world: World, time_limit_secs: u32) {
        self.world = Some(world);
        self.time_limit = time_limit_secs as f32;
    }

    pub fn begin_countdown(&mut self) {
        self.countdown = self.settings.countdown_secs as f32;
        self.time_left = self.time_limit;
        self.pos_timer = 0.0;
        self.set_phase(Phase::Countdown, format!("Get ready! {}", self.settings.countdown_secs));
    }

    /// Run the countdown and match clock, updating the world while playing
    pub fn advance(&mut self, dt: f32) -> Clock {
        match self.phase {
            Phase::Countdown => {
                self.countdown -= dt;
                if self.countdown <= 0.0 {
                    self.set_phase(Phase::Playing, "Paint!");
                } else {
                    self.status = format!("Get ready! {}", self.countdown.ceil() as u32);
                }
                Clock::Running
            }
            Phase::Playing => {
                if let Some(world) = self.world.as_mut() {
                    world.update(dt);
                }
                self.time_left -= dt;
                if self.time_left <= 0.0 {
                    self.time_left = 0.0;
                    tracing::info!("Time up");
                    self.set_phase(Phase::AwaitingResult, "Time up! Waiting for the result");
                    Clock::TimeUp
                } else {
                    Clock::Running
                }
            }
            _ => Clock::Idle,
        }
    }

    /// Whether a position correction is due this update
    pub fn position_sync_due(&mut self, dt: f32) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.pos_timer += dt;
        let interval = self.settings.position_sync_interval();
        if self.pos_timer >= interval {
            self.pos_timer -= interval;
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self, outcome: Outcome) {
        let status = match outcome {
            Outcome::Winner(player) => format!("The {} player wins!", player),
            Outcome::Draw => "It's a draw!".to_string(),
        };
        tracing::info!("Match finished: {}", status);
        self.set_phase(Phase::Finished(outcome), status);
    }

    /// Freeze the match after a network failure
    pub fn fail(&mut self, failure: &NetFailure) {
        if let Phase::Finished(_) = self.phase {
            tracing::debug!("Ignoring failure after the match ended: {}", failure);
            return;
        }
        tracing::error!("{}", failure);
        self.set_phase(Phase::Failed, failure.message.clone());
    }

    /// Apply a local action to the world, returning the message that
    /// replicates it
    pub fn perform(&mut self, player: PlayerId, action: LocalAction) -> Option<Message> {
        if self.phase != Phase::Playing {
            return None;
        }
        let world = self.world.as_mut()?;
        if world.is_stunned(player) && action != LocalAction::NextColour {
            return None;
        }

        match action {
            LocalAction::Move { dx, dy } => {
                let pos = world.move_tool(player, dx, dy);
                Some(Message::ToolMove { player, pos })
            }
            LocalAction::Paint => {
                let stroke = world.paint(player)?;
                Some(Message::Paint {
                    player,
                    tool: stroke.tool,
                    pos: stroke.pos,
                    colour: stroke.colour,
                })
            }
            LocalAction::NextColour => {
                let palette = world.next_colour(player);
                Some(Message::PaletteChange { player, palette })
            }
            LocalAction::Attack => {
                if !world.start_attack(player) {
                    return None;
                }
                Some(Message::Attack {
                    actor: player.actor(),
                    pos: world.player(player).character.pos,
                })
            }
        }
    }
}
