//! Tubestorm entry point
//!
//! Headless demo shell: synthesizes the asset pack procedurally, wires
//! null audio/display devices and a scripted pilot to the gameplay core,
//! and runs a bounded session. A real port supplies its own collaborators
//! behind the same seams.

use std::sync::Arc;

use tubestorm::GameSettings;
use tubestorm::assets::{AssetKind, AssetLoadError, AssetLoader, CelData, MeshData};
use tubestorm::audio::NullAudio;
use tubestorm::display::{NullDisplay, rgb15};
use tubestorm::fixed::fx;
use tubestorm::input::{DeviceState, InputCollector, button};
use tubestorm::sim::PlaySession;
use tubestorm::timer::SystemClock;

/// Levels whose tubes wrap into a closed ring.
const WRAPPING_LEVELS: [u32; 7] = [5, 7, 10, 13, 14, 18, 20];

/// Procedural stand-in for the game disc: tube levels, billboard and ship
/// meshes, flat-colored cels.
struct DemoAssets;

impl AssetLoader for DemoAssets {
    fn load(&self, path: &str, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
        match kind {
            AssetKind::Mesh => {
                if path.ends_with("Player") {
                    return Ok(MeshData::ship().to_bytes());
                }
                if path.ends_with("Billboard") {
                    return Ok(MeshData::billboard().to_bytes());
                }
                let number: u32 = path
                    .trim_start_matches("Assets/Levels/Level")
                    .parse()
                    .map_err(|_| AssetLoadError::new(path, kind, "unrecognized mesh path"))?;
                let closed = WRAPPING_LEVELS.contains(&number);
                // Corridor count varies a little with the level number
                let sides = 12 + (number as usize % 3) * 2;
                Ok(MeshData::tube(sides, fx(2), fx(4), closed).to_bytes())
            }
            AssetKind::Cel => {
                // Hash the path into a stable color so enemy kinds differ
                let hash = path.bytes().fold(7u16, |acc, b| {
                    acc.wrapping_mul(31).wrapping_add(b as u16)
                });
                let color = rgb15(hash % 32, (hash >> 5) % 32, (hash >> 10) % 32);
                Ok(CelData::solid(32, 32, color).to_bytes())
            }
            _ => Err(AssetLoadError::new(path, kind, "not part of the demo pack")),
        }
    }
}

/// Scripted pilot: sweeps the rim and holds fire, occasionally jumping.
struct DemoPilot {
    tick: u32,
}

impl InputCollector for DemoPilot {
    fn poll(&mut self) -> DeviceState {
        self.tick = self.tick.wrapping_add(1);

        let mut buttons = button::FIRE;
        // Sweep one way, then the other
        if (self.tick / 90) % 2 == 0 {
            buttons |= button::RIGHT;
        } else {
            buttons |= button::LEFT;
        }
        if self.tick % 400 == 0 {
            buttons |= button::JUMP;
        }

        DeviceState {
            buttons,
            ..Default::default()
        }
    }
}

fn main() {
    env_logger::init();
    log::info!("Tubestorm (headless demo) starting");

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0x7061756c);

    let mut session = match PlaySession::new(
        Arc::new(DemoAssets),
        tubestorm::assets::new_disc_lock(),
        Box::new(NullAudio::default()),
        Box::new(DemoPilot { tick: 0 }),
        Box::new(SystemClock::new()),
        GameSettings::default(),
        seed,
    ) {
        Ok(session) => session,
        Err(err) => {
            // Arcade-style: a failed startup load is fatal
            log::error!("{err}");
            std::process::exit(1);
        }
    };

    let mut display = NullDisplay::default();
    if let Err(err) = session.run(&mut display, Some(20_000)) {
        log::error!("{err}");
        std::process::exit(1);
    }

    log::info!(
        "demo finished: {} frames, level {}, score {}, {} lives left",
        display.frames_presented,
        session.current_level,
        session.score,
        session.player.lives
    );
}
