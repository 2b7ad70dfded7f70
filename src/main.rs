//! Art Attack - Two-player competitive painting
//!
//! Headless driver: hosts, joins or runs a local match at a fixed tick rate.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use artattack::config::{generate_sample_config, Config};
use artattack::game::{
    ClientController, GameController, HostController, LocalAction, LocalController, Phase,
};
use artattack::network;
use artattack::protocol::{PROTOCOL_VERSION, REVISION};
use artattack::world::Painting;

/// Art Attack - race your opponent to copy a painting
#[derive(Parser)]
#[command(name = "artattack")]
#[command(version)]
#[command(about = "Two-player competitive painting over the network", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Host a match, optionally on PORT
    #[arg(long, value_name = "PORT", num_args = 0..=1, conflicts_with = "connect")]
    serve: Option<Option<u16>>,

    /// Join a match hosted at HOST[:PORT]
    #[arg(long, value_name = "HOST[:PORT]")]
    connect: Option<String>,

    /// Painting to copy (host and local games)
    #[arg(long)]
    painting: Option<String>,

    /// Match length in seconds (host and local games)
    #[arg(long, value_name = "SECS")]
    time_limit: Option<u32>,

    /// Play randomly on behalf of the local player(s)
    #[arg(long)]
    autoplay: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print a sample configuration file and exit
    #[arg(long, conflicts_with = "print_config")]
    sample_config: bool,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        Config::load_default().unwrap_or_default()
    };

    if cli.verbose {
        config.general.verbose = true;
    }
    if let Some(painting) = cli.painting {
        config.game.painting = painting;
    }
    if let Some(time_limit) = cli.time_limit {
        config.game.time_limit_secs = time_limit;
    }
    if let Some(Some(port)) = cli.serve {
        config.network.port = port;
    }

    if cli.sample_config {
        println!("{}", generate_sample_config()?);
        return Ok(());
    }
    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }
    if let Some(path) = &cli.save_config {
        config.save(path)?;
        println!("Configuration written to: {}", path.display());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    tracing::info!("Art Attack v{} ({})", PROTOCOL_VERSION, REVISION);

    let mut controller: Box<dyn GameController> = if cli.serve.is_some() {
        Painting::by_id(&config.game.painting)?;
        let connection = network::listen(&config.network)?;
        println!("Hosting on port {}; waiting for a challenger.", config.network.port);
        Box::new(HostController::new(connection, config.game.clone()))
    } else if let Some(remote) = &cli.connect {
        let (host, port) = network::parse_remote(remote, config.network.port)?;
        let connection = network::connect(&host, port, &config.network)?;
        println!("Joining {}:{}.", host, port);
        Box::new(ClientController::new(connection, config.game.clone()))
    } else {
        println!("Local two-player match on '{}'.", config.game.painting);
        Box::new(LocalController::new(config.game.clone())?)
    };
    println!("Press Ctrl+C to leave.\n");

    run(controller.as_mut(), config.game.tick_interval(), cli.autoplay).await;

    println!("\n{}", controller.status());
    if let Some(world) = controller.world() {
        for player in controller.local_players() {
            let (correct, total) = world.completeness(*player);
            println!("  {} player: {}/{} pixels", player, correct, total);
        }
    }

    Ok(())
}

/// Drive the controller until the match ends or the user interrupts
async fn run(controller: &mut dyn GameController, tick: Duration, autoplay: bool) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let dt = tick.as_secs_f32();

    let mut rng = rand::thread_rng();
    let mut last_status = String::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                }
                println!("\nLeaving the match...");
                break;
            }
        }

        if autoplay {
            for &player in controller.local_players() {
                if let Some(action) = random_action(&mut rng) {
                    controller.on_local_input(player, action);
                }
            }
        }
        controller.tick(dt);

        // No renderer here; the log stands in for one
        for effect in controller.drain_effects() {
            tracing::debug!("{:?}", effect);
        }

        if controller.status() != last_status {
            last_status = controller.status().to_string();
            tracing::info!("[{}] {}", controller.phase(), last_status);
        }

        if matches!(controller.phase(), Phase::Finished(_) | Phase::Failed) {
            break;
        }
    }

    controller.shutdown();
}

/// What a bored player might press this tick
fn random_action<R: Rng>(rng: &mut R) -> Option<LocalAction> {
    match rng.gen_range(0..20) {
        0..=5 => Some(LocalAction::Move {
            dx: rng.gen_range(-1..=1),
            dy: rng.gen_range(-1..=1),
        }),
        6..=8 => Some(LocalAction::Paint),
        9 => Some(LocalAction::NextColour),
        10 => Some(LocalAction::Attack),
        _ => None,
    }
}
