//! Gameplay simulation
//!
//! Everything that runs inside the tick loop: the object/transform model,
//! camera and projection, the scene accumulator, corridor topology, level
//! management, enemies, bullets, the player and the play state machine.
//! Only the main tick thread touches this state; the one background worker
//! (level loading) communicates through the level manager's channel.

pub mod bullet;
pub mod camera;
pub mod corridor;
pub mod enemy;
pub mod level;
pub mod object;
pub mod play;
pub mod player;
pub mod scene;

pub use bullet::{BulletPool, MAX_BULLETS};
pub use camera::{Camera, Projector};
pub use corridor::{CorridorProps, corridor_angle, corridor_props, next_corridor, prev_corridor,
    snap_to_corridor};
pub use enemy::{EnemyKind, EnemyPool, EnemyState, MAX_ENEMIES, MAX_SPIKES, SpikePool};
pub use level::{Level, LevelManager, MAX_LEVELS};
pub use object::Object;
pub use play::{Phase, PlaySession};
pub use player::Player;
pub use scene::{MAX_POLY_RASTER, Scene, SceneFull};
