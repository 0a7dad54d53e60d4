//! Enemy behavior engine
//!
//! A fixed pool of six enemy slots, eight archetypes dispatched by kind
//! tag, and the small movement primitives they compose: rim walks, bounce,
//! payload drops, ring rolls and side steps. Spikes live here too, next to
//! the Spiker that drops them.
//!
//! Lifecycle per slot: Inactive -> Active -> Destroying -> Inactive. A
//! destroying enemy stays visible through one zapped-animation cycle; the
//! cycle's -1 terminator releases the slot.

use rand::Rng;
use rand_pcg::Pcg32;

use crate::assets::{AssetKind, AssetLoadError, AssetLoader, CelData, DiscLock, MeshData};
use crate::consts::{LEVEL_ZNEAR, LEVEL_ZFAR, CAM_NEAR};
use crate::display::{Cel, CelImage, Color, Line, rgb15};
use crate::fixed::{Fx, FxVec3, ONE, dot, fx, mul, normalize, squared_dist};
use crate::sim::camera::{Camera, Projector};
use crate::sim::corridor::{corridor_props, snap_to_corridor};
use crate::sim::level::Level;
use crate::sim::object::Object;
use crate::sim::player::Player;
use crate::sim::scene::Scene;
use crate::timer::SimpleTimer;

/// Max simultaneous enemies.
pub const MAX_ENEMIES: usize = 6;
/// Max simultaneous spikes.
pub const MAX_SPIKES: usize = 5;
pub const MAX_ENEMY_TYPES: usize = 8;

const MAX_ANIM_CYCLE: usize = 10;
const ANIM_STEP_MS: u32 = 180;
const PULSAR_COLOR: Color = 924;
const ENEMY_BILLBOARD_SIZE: u32 = 32;
const ENEMY_BILLBOARD_SCALE: Fx = 42598;
/// Ring-roll step, 3 angle units per tick.
const ROLL_STEP: Fx = 196608;
/// Roll arrival window for dot(up, target normal): [-1.0, -0.9905].
const ROLL_ALIGN_MIN: Fx = -64880;
/// Side-step corridor switch threshold, 16.16-squared units.
const SIDE_STEP_SNAP_DIST: Fx = 1048612;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyKind {
    Missile,
    Flipper,
    Tanker,
    Spiker,
    Fuseball,
    Pulsar,
    Ftanker,
    Ptanker,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; MAX_ENEMY_TYPES] = [
        EnemyKind::Missile,
        EnemyKind::Flipper,
        EnemyKind::Tanker,
        EnemyKind::Spiker,
        EnemyKind::Fuseball,
        EnemyKind::Pulsar,
        EnemyKind::Ftanker,
        EnemyKind::Ptanker,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EnemyKind::Missile => "Missile",
            EnemyKind::Flipper => "Flipper",
            EnemyKind::Tanker => "Tanker",
            EnemyKind::Spiker => "Spiker",
            EnemyKind::Fuseball => "Fuseball",
            EnemyKind::Pulsar => "Pulsar",
            EnemyKind::Ftanker => "Ftanker",
            EnemyKind::Ptanker => "Ptanker",
        }
    }

    /// Max alive at once per kind.
    pub fn max_count(self) -> u32 {
        match self {
            EnemyKind::Missile => 99,
            EnemyKind::Flipper => 2,
            _ => 1,
        }
    }

    /// First level this kind may spawn on.
    pub fn unlock_level(self) -> u32 {
        match self {
            EnemyKind::Missile | EnemyKind::Flipper => 1,
            EnemyKind::Tanker => 3,
            EnemyKind::Spiker => 4,
            EnemyKind::Fuseball => 11,
            EnemyKind::Pulsar => 17,
            EnemyKind::Ftanker => 33,
            EnemyKind::Ptanker => 41,
        }
    }

    /// Points for a kill.
    pub fn score(self) -> u32 {
        match self {
            EnemyKind::Missile => 55,
            EnemyKind::Flipper => 150,
            EnemyKind::Tanker => 100,
            EnemyKind::Spiker => 50,
            EnemyKind::Fuseball => 250,
            EnemyKind::Pulsar => 200,
            EnemyKind::Ftanker => 150,
            EnemyKind::Ptanker => 150,
        }
    }

    fn frame_count(self) -> usize {
        match self {
            EnemyKind::Flipper | EnemyKind::Spiker | EnemyKind::Pulsar => 1,
            _ => 3,
        }
    }

    fn frame_cycle(self) -> [i32; MAX_ANIM_CYCLE] {
        match self {
            EnemyKind::Flipper | EnemyKind::Spiker | EnemyKind::Pulsar => {
                [0, -1, -1, -1, -1, -1, -1, -1, -1, -1]
            }
            EnemyKind::Fuseball => [0, 1, 2, -1, -1, -1, -1, -1, -1, -1],
            _ => [0, 1, 2, 1, -1, -1, -1, -1, -1, -1],
        }
    }

    /// Secondary enemy spawned when this kind dies with a payload.
    fn payload_kind(self) -> Option<EnemyKind> {
        match self {
            EnemyKind::Tanker => Some(EnemyKind::Flipper),
            EnemyKind::Ftanker => Some(EnemyKind::Fuseball),
            EnemyKind::Ptanker => Some(EnemyKind::Pulsar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyState {
    Active,
    Destroying,
    Inactive,
}

/// Ring traversal direction for rolling and side-stepping kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Cw,
    Ccw,
}

pub struct Enemy {
    pub state: EnemyState,
    pub kind: EnemyKind,
    pub obj: Object,
    pub health: i32,
    pub corridor: usize,
    /// Speed class: walk step is dt << speed.
    pub speed: u32,
    pub frame_index: usize,
    // Shared per-kind scratch fields; meaning varies by archetype.
    pub traversal: Traversal,
    pub vector: FxVec3,
    pub logical_flag: bool,
    pub next_corridor: usize,
    pub ticks: i32,
}

impl Enemy {
    fn new(obj: Object) -> Self {
        Self {
            state: EnemyState::Inactive,
            kind: EnemyKind::Missile,
            obj,
            health: 0,
            corridor: 0,
            speed: 0,
            frame_index: 0,
            traversal: Traversal::Cw,
            vector: FxVec3::ZERO,
            logical_flag: false,
            next_corridor: 0,
            ticks: 0,
        }
    }

    /// Walk -z toward the near rim; true once clamped on it.
    fn mb_near_walk(&mut self, dt: Fx) -> bool {
        self.obj.pos.z -= dt << self.speed;
        if self.obj.pos.z <= LEVEL_ZNEAR {
            self.obj.pos.z = LEVEL_ZNEAR;
            return true;
        }
        false
    }

    /// Walk +z toward the far rim; true once clamped on it.
    fn mb_far_walk(&mut self, dt: Fx) -> bool {
        self.obj.pos.z += dt << self.speed;
        if self.obj.pos.z >= LEVEL_ZFAR {
            self.obj.pos.z = LEVEL_ZFAR;
            return true;
        }
        false
    }

    /// Walk -z past the rim toward the camera; true within a fixed offset
    /// of the camera plane.
    fn mb_cam_walk(&mut self, dt: Fx, camera_z: Fx) -> bool {
        self.obj.pos.z -= dt << self.speed;
        self.obj.pos.z <= camera_z + fx(2)
    }

    /// Alternate near and far walks forever, toggling on the logical flag.
    fn mb_bounce(&mut self, dt: Fx) -> bool {
        if self.logical_flag {
            if self.mb_near_walk(dt) {
                self.logical_flag = false;
            }
        } else if self.mb_far_walk(dt) {
            self.logical_flag = true;
        }
        false
    }

    /// Walk -z until the tick countdown expires or the rim clamps; used to
    /// pick the spike drop point.
    fn mb_payload(&mut self, dt: Fx) -> bool {
        self.obj.pos.z -= dt << self.speed;
        self.ticks -= 1;
        if self.ticks < 0 {
            return true;
        }
        if self.obj.pos.z < LEVEL_ZNEAR {
            self.obj.pos.z = LEVEL_ZNEAR;
            return true;
        }
        false
    }

    /// Roll around the current corridor's near-edge pivot toward the
    /// adjacent corridor. Arrival is an up-vector/target-normal dot product
    /// landing in the aligned window; strip boundaries flip the traversal
    /// direction.
    fn mb_roll(&mut self, level: &Level) -> bool {
        let corridor_count = level.corridor_count() as i32;

        if self.logical_flag {
            // Pick the next corridor over
            let mut target = match self.traversal {
                Traversal::Cw => {
                    let c = self.corridor as i32 - 1;
                    if c < 0 {
                        self.traversal = Traversal::Ccw;
                        self.corridor as i32 + 1
                    } else {
                        c
                    }
                }
                Traversal::Ccw => {
                    let c = self.corridor as i32 + 1;
                    if c >= corridor_count {
                        self.traversal = Traversal::Cw;
                        self.corridor as i32 - 1
                    } else {
                        c
                    }
                }
            };
            target = target.clamp(0, corridor_count - 1);

            let normal = level.obj.polygons[target as usize].normal;
            self.vector = FxVec3::new(normal.x, normal.y, 0);
            self.next_corridor = target as usize;
            self.logical_flag = false;
        }

        let Some(props) = corridor_props(&level.obj, self.corridor) else {
            return false;
        };

        match self.traversal {
            Traversal::Cw => self.obj.rotate_pivot_z(props.edge_a, -ROLL_STEP),
            Traversal::Ccw => self.obj.rotate_pivot_z(props.edge_b, ROLL_STEP),
        }

        // Up vector across the billboard (vertices 4 and 1) against the
        // stored target-corridor normal
        let (lut0, lut3) = {
            let poly = &self.obj.polygons[0];
            (poly.lut[0], poly.lut[3])
        };
        let verts = self.obj.verts.borrow();
        let mut up = FxVec3::new(
            verts[lut3].x - verts[lut0].x,
            verts[lut3].y - verts[lut0].y,
            0,
        );
        drop(verts);
        normalize(&mut up);

        let dp = dot(up, self.vector);
        if (-ONE..=ROLL_ALIGN_MIN).contains(&dp) {
            self.corridor = self.next_corridor;
            snap_to_corridor(&mut self.obj, &level.obj, self.corridor, LEVEL_ZNEAR);
            self.logical_flag = true;
            return true;
        }
        false
    }

    /// Lateral travel along the near edge toward the adjacent corridor's
    /// rim vertex; switches corridor once within the snap distance.
    fn mb_side_step(&mut self, dt: Fx, level: &Level) -> bool {
        let corridor_count = level.corridor_count() as i32;

        if self.logical_flag {
            let Some(props) = corridor_props(&level.obj, self.corridor) else {
                return false;
            };
            self.vector = match self.traversal {
                Traversal::Cw => FxVec3::new(
                    props.edge_a.x - props.edge_b.x,
                    props.edge_a.y - props.edge_b.y,
                    0,
                ),
                Traversal::Ccw => FxVec3::new(
                    props.edge_b.x - props.edge_a.x,
                    props.edge_b.y - props.edge_a.y,
                    0,
                ),
            };
            normalize(&mut self.vector);
            self.logical_flag = false;
        }

        let Some(props) = corridor_props(&level.obj, self.corridor) else {
            return false;
        };
        let target_vertex = match self.traversal {
            Traversal::Cw => props.edge_a,
            Traversal::Ccw => props.edge_b,
        };

        let here = FxVec3::new(self.obj.pos.x, self.obj.pos.y, 0);
        let there = FxVec3::new(target_vertex.x, target_vertex.y, 0);

        if squared_dist(here, there) <= SIDE_STEP_SNAP_DIST {
            self.obj.pos.x = target_vertex.x;
            self.obj.pos.y = target_vertex.y;
            self.logical_flag = true;

            match self.traversal {
                Traversal::Cw => {
                    let next = self.corridor as i32 - 1;
                    if next < 0 {
                        self.traversal = Traversal::Ccw;
                    } else {
                        self.corridor = next as usize;
                    }
                }
                Traversal::Ccw => {
                    let next = self.corridor as i32 + 1;
                    if next >= corridor_count {
                        self.traversal = Traversal::Cw;
                    } else {
                        self.corridor = next as usize;
                    }
                }
            }
            true
        } else {
            let speed = (dt << self.speed) >> 3;
            self.obj.pos.x += mul(self.vector.x, speed);
            self.obj.pos.y += mul(self.vector.y, speed);
            false
        }
    }
}

/// A growing corridor hazard dropped by a Spiker.
#[derive(Debug, Clone, Copy)]
pub struct Spike {
    pub active: bool,
    pub corridor: usize,
    pub begin: FxVec3,
    pub end: FxVec3,
}

impl Spike {
    const INACTIVE: Spike = Spike {
        active: false,
        corridor: 0,
        begin: FxVec3::ZERO,
        end: FxVec3::ZERO,
    };
}

pub struct SpikePool {
    pub spikes: [Spike; MAX_SPIKES],
    active_count: u32,
}

impl Default for SpikePool {
    fn default() -> Self {
        Self::new()
    }
}

impl SpikePool {
    pub fn new() -> Self {
        Self {
            spikes: [Spike::INACTIVE; MAX_SPIKES],
            active_count: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.active_count
    }

    pub fn is_full(&self) -> bool {
        self.active_count as usize >= MAX_SPIKES
    }

    pub fn has_spike_on(&self, corridor: usize) -> bool {
        self.spikes.iter().any(|s| s.active && s.corridor == corridor)
    }

    /// Seed a spike reaching from the far rim down to the drop point.
    pub fn activate(&mut self, end_pos: FxVec3, corridor: usize) {
        for spike in &mut self.spikes {
            if !spike.active {
                spike.active = true;
                spike.corridor = corridor;
                spike.begin = FxVec3::new(end_pos.x, end_pos.y, LEVEL_ZFAR);
                spike.end = end_pos;
                self.active_count += 1;
                return;
            }
        }
        log::warn!("no free spike slot; drop ignored");
    }

    /// Bullet hit: shorten by one unit; fully eroded spikes are collected.
    pub fn damage(&mut self, index: usize) {
        let spike = &mut self.spikes[index];
        if !spike.active {
            return;
        }
        spike.end.z += ONE;
        if spike.end.z >= spike.begin.z {
            spike.active = false;
            self.active_count -= 1;
        }
    }

    pub fn clear(&mut self) {
        self.spikes = [Spike::INACTIVE; MAX_SPIKES];
        self.active_count = 0;
    }

    /// Projected line segments for the overlay pass, near-clamped.
    pub fn lines(&self, camera: &Camera, proj: &Projector) -> Vec<Line> {
        let color = rgb15(0, 0, 31);
        let mut lines = Vec::new();
        for spike in self.spikes.iter().filter(|s| s.active) {
            let mut begin_cam = camera.to_camera(spike.begin);
            begin_cam.z = begin_cam.z.max(CAM_NEAR);
            let mut end_cam = camera.to_camera(spike.end);
            end_cam.z = end_cam.z.max(CAM_NEAR);
            lines.push(Line {
                from: proj.point_to_screen(begin_cam, true),
                to: proj.point_to_screen(end_cam, true),
                color,
            });
        }
        lines
    }
}

/// Animation frames plus the cycle table; -1 terminates the cycle.
struct CelAnim {
    frames: Vec<Cel>,
    cycle: [i32; MAX_ANIM_CYCLE],
}

pub struct EnemyAnims {
    per_kind: Vec<CelAnim>,
    zapped: CelAnim,
}

impl EnemyAnims {
    /// Load every archetype's frame set plus the shared zapped cycle.
    pub fn load(loader: &dyn AssetLoader, disc: &DiscLock) -> Result<Self, AssetLoadError> {
        let load_cel = |path: &str| -> Result<Cel, AssetLoadError> {
            let bytes = {
                let _guard = disc.lock().expect("disc lock poisoned");
                loader.load(path, AssetKind::Cel)?
            };
            let data = CelData::from_bytes(path, &bytes)?;
            Ok(Cel {
                image: std::sync::Arc::new(CelImage {
                    width: data.width,
                    height: data.height,
                    pixels: data.pixels,
                }),
                palette: data.palette,
            })
        };

        let mut per_kind = Vec::with_capacity(MAX_ENEMY_TYPES);
        for kind in EnemyKind::ALL {
            let mut frames = Vec::with_capacity(kind.frame_count());
            for j in 1..=kind.frame_count() {
                let name = kind.name();
                frames.push(load_cel(&format!("Assets/Graphics/{name}/{name}{j}.cel"))?);
            }
            per_kind.push(CelAnim {
                frames,
                cycle: kind.frame_cycle(),
            });
        }

        let mut zapped_frames = Vec::with_capacity(3);
        for j in 1..=3 {
            zapped_frames.push(load_cel(&format!("Assets/Graphics/Effects/Zapped{j}.cel"))?);
        }
        let mut zapped_cycle = [-1; MAX_ANIM_CYCLE];
        zapped_cycle[..5].copy_from_slice(&[2, 1, 0, 1, 2]);

        Ok(Self {
            per_kind,
            zapped: CelAnim {
                frames: zapped_frames,
                cycle: zapped_cycle,
            },
        })
    }

    fn for_state(&self, kind: EnemyKind, state: EnemyState) -> &CelAnim {
        if state == EnemyState::Active {
            &self.per_kind[kind.index()]
        } else {
            &self.zapped
        }
    }
}

/// What one enemy's update asked the pool to do afterward.
enum Action {
    None,
    Destroy { payload: bool },
    SpawnMissile,
}

/// Tick outcome surfaced to the play state machine.
#[derive(Debug, Default)]
pub struct EnemyEvents {
    /// Index of the first enemy that hit the player this tick.
    pub player_hit: Option<usize>,
}

pub struct EnemyPool {
    pub enemies: Vec<Enemy>,
    counts: [u32; MAX_ENEMY_TYPES],
    active_total: u32,
    spawn_cursor: usize,
    anim_timer: SimpleTimer,
    anims: EnemyAnims,
    /// Enemy that grabbed the player, dragged along in the Grabbed phase.
    pub killshot: Option<usize>,
}

impl EnemyPool {
    pub fn new(billboard: &MeshData, anims: EnemyAnims) -> Self {
        let enemies = (0..MAX_ENEMIES)
            .map(|_| {
                let mut obj = Object::from_mesh(
                    billboard,
                    &Cel::coded(ENEMY_BILLBOARD_SIZE, ENEMY_BILLBOARD_SIZE),
                );
                obj.scale(ENEMY_BILLBOARD_SCALE);
                obj.freeze_pristine();
                obj.bsphere_radius = obj.calc_bsphere_radius();
                Enemy::new(obj)
            })
            .collect();

        Self {
            enemies,
            counts: [0; MAX_ENEMY_TYPES],
            active_total: 0,
            spawn_cursor: 0,
            anim_timer: SimpleTimer::new(ANIM_STEP_MS),
            anims,
            killshot: None,
        }
    }

    pub fn count_of(&self, kind: EnemyKind) -> u32 {
        self.counts[kind.index()]
    }

    pub fn active_total(&self) -> u32 {
        self.active_total
    }

    pub fn reset_anim_timer(&mut self, now_ms: u32) {
        self.anim_timer.reset(now_ms);
    }

    /// Return every slot to the pool without death animations.
    pub fn clear(&mut self) {
        for enemy in &mut self.enemies {
            enemy.state = EnemyState::Inactive;
        }
        self.counts = [0; MAX_ENEMY_TYPES];
        self.active_total = 0;
        self.killshot = None;
    }

    /// Super zapper: every active enemy starts its death cycle at once.
    pub fn zap_all(&mut self, now_ms: u32) {
        for enemy in &mut self.enemies {
            if enemy.state == EnemyState::Active {
                enemy.state = EnemyState::Destroying;
                enemy.frame_index = 0;
            }
        }
        self.anim_timer.reset(now_ms);
    }

    /// Allocate a slot and place the enemy on its corridor. Silently drops
    /// the request when the pool is full, or when a Spiker finds the spike
    /// pool full (no-op-on-full backpressure).
    pub fn spawn(
        &mut self,
        kind: EnemyKind,
        corridor: usize,
        world_z: Fx,
        level: &Level,
        spikes: &SpikePool,
        rng: &mut Pcg32,
    ) {
        let Some(index) = self
            .enemies
            .iter()
            .position(|e| e.state == EnemyState::Inactive)
        else {
            return;
        };

        if kind == EnemyKind::Spiker && spikes.is_full() {
            return;
        }

        let enemy = &mut self.enemies[index];
        enemy.kind = kind;
        enemy.frame_index = 0;
        let anim = &self.anims.per_kind[kind.index()];
        enemy.obj.polygons[0].cel = anim.frames[anim.cycle[0] as usize].clone();

        enemy.corridor = corridor;
        snap_to_corridor(&mut enemy.obj, &level.obj, corridor, world_z);

        match kind {
            EnemyKind::Missile => {
                enemy.health = 1;
                enemy.speed = 2;
            }
            EnemyKind::Flipper => {
                enemy.health = 1;
                enemy.speed = 2;
                enemy.traversal = if rng.random_range(0..2u32) == 1 {
                    Traversal::Ccw
                } else {
                    Traversal::Cw
                };
                enemy.logical_flag = true;
            }
            EnemyKind::Tanker | EnemyKind::Ftanker | EnemyKind::Ptanker => {
                enemy.health = 1;
                enemy.speed = 1;
            }
            EnemyKind::Spiker => {
                enemy.health = 1;
                enemy.speed = 1;
                enemy.ticks = rng.random_range(0..50) + 80;
                enemy.logical_flag = false;
            }
            EnemyKind::Fuseball => {
                enemy.health = 1;
                enemy.speed = 1;
                enemy.logical_flag = true;
                enemy.ticks = 100;
                enemy.traversal = if rng.random_range(0..2u32) == 1 {
                    Traversal::Ccw
                } else {
                    Traversal::Cw
                };
                // Start on a rim vertex rather than the corridor center
                if let Some(props) = corridor_props(&level.obj, corridor) {
                    let vertex = if rng.random_range(0..2u32) == 1 {
                        props.edge_a
                    } else {
                        props.edge_b
                    };
                    enemy.obj.pos.x = vertex.x;
                    enemy.obj.pos.y = vertex.y;
                }
            }
            EnemyKind::Pulsar => {
                enemy.health = 1;
                enemy.speed = 1;
                enemy.ticks = rng.random_range(0..100) + 200;
                enemy.logical_flag = true;
            }
        }

        self.counts[kind.index()] += 1;
        self.active_total += 1;
        enemy.state = EnemyState::Active;
    }

    /// Release a slot; Pulsars restore their corridor, payload carriers
    /// spawn their cargo at the spot they died.
    pub fn destroy(
        &mut self,
        index: usize,
        payload: bool,
        level: &mut Level,
        spikes: &SpikePool,
        rng: &mut Pcg32,
    ) {
        let enemy = &mut self.enemies[index];
        debug_assert!(enemy.state != EnemyState::Inactive);

        let kind = enemy.kind;
        let corridor = enemy.corridor;
        let world_z = enemy.obj.pos.z;

        if kind == EnemyKind::Pulsar {
            level.reset_corridor_palette(corridor);
        }

        self.counts[kind.index()] = self.counts[kind.index()].saturating_sub(1);
        self.active_total = self.active_total.saturating_sub(1);
        enemy.state = EnemyState::Inactive;

        if payload
            && let Some(cargo) = kind.payload_kind()
        {
            self.spawn(cargo, corridor, world_z, level, spikes, rng);
        }
    }

    /// Pick a starting corridor. Spikers reject corridors already holding
    /// a spike or an active enemy; if sampling keeps missing, fall back to
    /// a scan, and block the spawn when nothing is free.
    fn pick_corridor(
        &self,
        kind: EnemyKind,
        level: &Level,
        spikes: &SpikePool,
        rng: &mut Pcg32,
    ) -> Option<usize> {
        let count = level.corridor_count();
        if kind != EnemyKind::Spiker {
            return Some(rng.random_range(0..count));
        }

        let occupied = |corridor: usize| {
            spikes.has_spike_on(corridor)
                || self
                    .enemies
                    .iter()
                    .any(|e| e.state == EnemyState::Active && e.corridor == corridor)
        };

        for _ in 0..count * 2 {
            let corridor = rng.random_range(0..count);
            if !occupied(corridor) {
                return Some(corridor);
            }
        }
        (0..count).find(|&c| !occupied(c))
    }

    /// Round-robin spawner: the cursor's kind spawns if under its cap and
    /// unlocked at this level, else a filler Missile spawns; either way the
    /// cursor advances, keeping the cadence steady.
    pub fn spawn_next(
        &mut self,
        level: &Level,
        spikes: &SpikePool,
        current_level: u32,
        rng: &mut Pcg32,
    ) {
        if self.active_total >= MAX_ENEMIES as u32 {
            return;
        }

        let cursor_kind = EnemyKind::ALL[self.spawn_cursor];
        let kind = if self.counts[self.spawn_cursor] < cursor_kind.max_count()
            && current_level >= cursor_kind.unlock_level()
        {
            cursor_kind
        } else {
            EnemyKind::Missile
        };
        self.spawn_cursor = (self.spawn_cursor + 1) % MAX_ENEMY_TYPES;

        let Some(corridor) = self.pick_corridor(kind, level, spikes, rng) else {
            log::debug!("no free corridor for {}; spawn dropped", kind.name());
            return;
        };
        self.spawn(kind, corridor, LEVEL_ZFAR, level, spikes, rng);
    }

    /// Advance animation frames and run each active enemy's archetype
    /// update. Death cycles that reach their terminator release the slot.
    #[allow(clippy::too_many_arguments)]
    pub fn update_all(
        &mut self,
        dt: Fx,
        now_ms: u32,
        level: &mut Level,
        spikes: &mut SpikePool,
        player: &Player,
        camera_z: Fx,
        rng: &mut Pcg32,
    ) -> EnemyEvents {
        let mut events = EnemyEvents::default();

        let animate = self.anim_timer.is_ready(now_ms);
        if animate {
            self.anim_timer.reset(now_ms);
        }

        for i in 0..self.enemies.len() {
            if self.enemies[i].state == EnemyState::Inactive {
                continue;
            }

            // Animation frame walk; the -1 sentinel wraps the cycle, and
            // finishing a death cycle frees the slot.
            let mut finished_death = false;
            {
                let enemy = &mut self.enemies[i];
                let anim = self.anims.for_state(enemy.kind, enemy.state);
                if anim.cycle[enemy.frame_index] < 0 {
                    enemy.frame_index = 0;
                }
                let frame = anim.cycle[enemy.frame_index] as usize;
                enemy.obj.polygons[0].cel = anim.frames[frame].clone();

                if animate {
                    enemy.frame_index += 1;
                    if anim.cycle[enemy.frame_index] < 0 {
                        enemy.frame_index = 0;
                        if enemy.state == EnemyState::Destroying {
                            finished_death = true;
                        }
                    }
                }
            }
            if finished_death {
                self.destroy(i, false, level, spikes, rng);
                continue;
            }

            if self.enemies[i].state != EnemyState::Active {
                continue;
            }

            let (action, hit) = update_one(
                &mut self.enemies[i],
                dt,
                level,
                spikes,
                player,
                camera_z,
                rng,
            );

            if hit && events.player_hit.is_none() {
                events.player_hit = Some(i);
            }

            match action {
                Action::None => {}
                Action::Destroy { payload } => {
                    self.destroy(i, payload, level, spikes, rng);
                }
                Action::SpawnMissile => {
                    if self.active_total + 1 < MAX_ENEMIES as u32 {
                        let corridor = self.enemies[i].corridor;
                        let z = self.enemies[i].obj.pos.z;
                        self.spawn(EnemyKind::Missile, corridor, z, level, spikes, rng);
                    }
                }
            }
        }

        events
    }

    /// Submit every on-screen enemy to the scene.
    pub fn add_to_scene(&mut self, scene: &mut Scene, camera: &Camera, proj: &Projector) {
        for enemy in &mut self.enemies {
            if enemy.state != EnemyState::Inactive {
                // Overflow drops the enemy for a frame; same soft
                // backpressure as every other pool
                let _ = scene.add(&mut enemy.obj, camera, proj, true);
            }
        }
    }
}

fn check_player_collision(enemy: &Enemy, player: &Player) -> bool {
    player.active && enemy.obj.is_colliding(&player.obj, true)
}

/// One archetype update step. Returns the follow-up action for the pool
/// and whether the player was hit.
fn update_one(
    enemy: &mut Enemy,
    dt: Fx,
    level: &mut Level,
    spikes: &mut SpikePool,
    player: &Player,
    camera_z: Fx,
    rng: &mut Pcg32,
) -> (Action, bool) {
    let mut hit = false;

    let action = match enemy.kind {
        EnemyKind::Flipper => {
            // Flippers only check for the kill in the aligned pause between
            // rolls; checking mid-roll made rim duels unwinnable.
            if enemy.mb_near_walk(dt) {
                if enemy.logical_flag && check_player_collision(enemy, player) {
                    hit = true;
                }
                enemy.mb_roll(level);
            }
            Action::None
        }

        EnemyKind::Missile => {
            if enemy.obj.pos.z <= LEVEL_ZNEAR && check_player_collision(enemy, player) {
                hit = true;
            }
            if enemy.mb_cam_walk(dt, camera_z) {
                Action::Destroy { payload: false }
            } else {
                Action::None
            }
        }

        EnemyKind::Tanker | EnemyKind::Ftanker | EnemyKind::Ptanker => {
            if enemy.mb_near_walk(dt) {
                Action::Destroy { payload: true }
            } else {
                Action::None
            }
        }

        EnemyKind::Spiker => {
            enemy.obj.rotate_quad_z(ROLL_STEP);
            if !enemy.logical_flag {
                if enemy.mb_payload(dt) {
                    enemy.logical_flag = true;
                    spikes.activate(enemy.obj.pos, enemy.corridor);
                    return (Action::SpawnMissile, hit);
                }
                Action::None
            } else if enemy.mb_far_walk(dt) {
                Action::Destroy { payload: false }
            } else {
                Action::None
            }
        }

        EnemyKind::Pulsar => {
            if enemy.ticks > 0 {
                enemy.mb_bounce(dt);
            }

            let before = enemy.ticks;
            enemy.ticks -= 1;
            if before < -170 {
                // Shock window over; rearm
                enemy.ticks = rng.random_range(0..100) + 200;
                level.reset_corridor_palette(enemy.corridor);
            } else if enemy.ticks < -100 {
                // Shocking: strobe the corridor every other tick
                if enemy.ticks % 2 != 0 {
                    level.set_corridor_color(enemy.corridor, PULSAR_COLOR);
                } else {
                    level.reset_corridor_palette(enemy.corridor);
                }

                if player.active
                    && player.corridor == enemy.corridor
                    && player.obj.pos.z == LEVEL_ZNEAR
                {
                    hit = true;
                    level.set_corridor_color(enemy.corridor, PULSAR_COLOR);
                }
            }
            Action::None
        }

        EnemyKind::Fuseball => {
            if enemy.obj.pos.z <= LEVEL_ZNEAR {
                enemy.mb_side_step(dt, level);
                if check_player_collision(enemy, player) {
                    hit = true;
                }
            } else if enemy.ticks > 0 {
                enemy.mb_near_walk(dt);
                enemy.ticks -= 1;
            } else {
                enemy.mb_side_step(dt, level);
                enemy.mb_near_walk(dt);
            }
            enemy.obj.rotate_quad_z(229376);
            Action::None
        }
    };

    (action, hit)
}
