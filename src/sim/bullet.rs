//! Player bullets
//!
//! A five-slot pool, rate limited, with slight volley offsets so rapid
//! fire fans out. Each tick every live bullet resolves against at most one
//! spike and one enemy on its corridor; when both are in range only the
//! nearer one is hit, so a single bullet can never take out two targets.

use rand_pcg::Pcg32;

use crate::assets::MeshData;
use crate::consts::{BULLET_SPEED, LEVEL_ZFAR, LEVEL_ZNEAR};
use crate::display::{Cel, rgb15};
use crate::fixed::{Fx, FxVec3, cos, div, fx, mul, sin, squared_dist};
use crate::sim::camera::{Camera, Projector};
use crate::sim::corridor::corridor_props;
use crate::sim::enemy::{EnemyKind, EnemyPool, EnemyState, SpikePool};
use crate::sim::level::Level;
use crate::sim::object::Object;
use crate::sim::player::Player;
use crate::sim::scene::Scene;
use crate::timer::SimpleTimer;

/// Max bullets on screen at a time.
pub const MAX_BULLETS: usize = 5;
/// Minimum milliseconds between shots.
const BULLET_RATE_MS: u32 = 115;
const BULLET_SCALE: Fx = 6553;
/// Z slack when matching bullets against enemies.
const HIT_Z_RANGE: Fx = 16384;
/// XY box for rim-hugging Flippers and Fuseballs.
const RIM_HIT_RANGE: Fx = 12000;
/// Fuseballs are only hittable this close to the corridor center.
const FUSEBALL_HIT_DIST: Fx = 1000;

pub struct Bullet {
    pub active: bool,
    pub corridor: usize,
    pub obj: Object,
}

/// An enemy kill this tick, for scoring and the explosion burst.
pub struct BulletImpact {
    pub kind: EnemyKind,
    pub world: FxVec3,
}

pub struct BulletPool {
    pub bullets: Vec<Bullet>,
    volley: [(Fx, Fx); MAX_BULLETS],
    volley_index: usize,
    rate_timer: SimpleTimer,
}

impl BulletPool {
    pub fn new(billboard: &MeshData) -> Self {
        let mut proto = Object::from_mesh(billboard, &Cel::solid(8, 8, rgb15(31, 31, 0)));
        proto.scale(BULLET_SCALE);
        proto.freeze_pristine();
        proto.bsphere_radius = proto.calc_bsphere_radius();

        let bullets = (0..MAX_BULLETS)
            .map(|_| Bullet {
                active: false,
                corridor: 0,
                obj: proto.deep_copy(),
            })
            .collect();

        // Small elliptical spread cycled shot-to-shot
        let mut volley = [(0, 0); MAX_BULLETS];
        let mut angle = 0;
        let angle_inc = div(crate::fixed::ANG_256, fx(MAX_BULLETS as i32));
        for entry in &mut volley {
            *entry = (mul(cos(angle), 6000), mul(sin(angle), 9000));
            angle += angle_inc;
        }

        Self {
            bullets,
            volley,
            volley_index: 0,
            rate_timer: SimpleTimer::new(BULLET_RATE_MS),
        }
    }

    pub fn clear(&mut self) {
        for bullet in &mut self.bullets {
            bullet.active = false;
        }
    }

    /// Phase-entry reset: volley restarts and the rate limiter rearms.
    pub fn reset(&mut self, now_ms: u32) {
        self.volley_index = 0;
        self.rate_timer.reset(now_ms);
    }

    /// Fire one bullet from the player's position, if the rate limiter
    /// allows and a slot is free. Hard mode fires from a smaller pool.
    /// Returns true when a bullet actually launched.
    pub fn fire(&mut self, player: &Player, hard_mode: bool, now_ms: u32) -> bool {
        if !player.active {
            return false;
        }
        if !self.rate_timer.is_ready(now_ms) {
            return false;
        }

        let pool_size = if hard_mode {
            MAX_BULLETS - 2
        } else {
            MAX_BULLETS
        };

        let mut fired = false;
        for bullet in self.bullets.iter_mut().take(pool_size) {
            if !bullet.active {
                bullet.obj.pos = player.obj.pos;
                bullet.obj.pos.x += self.volley[self.volley_index].0;
                bullet.obj.pos.y += self.volley[self.volley_index].1;
                bullet.corridor = player.corridor;
                bullet.active = true;

                self.volley_index = (self.volley_index + 1) % MAX_BULLETS;
                fired = true;
                break;
            }
        }

        self.rate_timer.reset(now_ms);
        fired
    }

    /// Advance bullets and resolve hits. Kills are returned for scoring;
    /// spike damage is applied silently.
    pub fn update(
        &mut self,
        dt: Fx,
        player_active: bool,
        enemies: &mut EnemyPool,
        spikes: &mut SpikePool,
        level: &mut Level,
        rng: &mut Pcg32,
    ) -> Vec<BulletImpact> {
        let mut impacts = Vec::new();

        for bullet_index in 0..self.bullets.len() {
            if !self.bullets[bullet_index].active {
                continue;
            }

            if player_active {
                let bullet_pos = self.bullets[bullet_index].obj.pos;
                let bullet_corridor = self.bullets[bullet_index].corridor;

                // At most one candidate spike: the first on this corridor,
                // and only if the bullet has reached its tip
                let mut corridor_spike = None;
                for (i, spike) in spikes.spikes.iter().enumerate() {
                    if spike.active && spike.corridor == bullet_corridor {
                        if bullet_pos.z >= spike.end.z {
                            corridor_spike = Some((i, spike.end.z));
                        }
                        break;
                    }
                }

                // At most one candidate enemy
                let mut corridor_enemy = None;
                for (i, enemy) in enemies.enemies.iter().enumerate() {
                    if enemy.state != EnemyState::Active {
                        continue;
                    }

                    let rim_hugger = matches!(enemy.kind, EnemyKind::Flipper | EnemyKind::Fuseball)
                        && enemy.obj.pos.z == LEVEL_ZNEAR;
                    if rim_hugger {
                        // Rim duels use a loose xy box instead of corridors
                        if bullet_pos.z <= LEVEL_ZNEAR + 32768 {
                            let delta_x = (enemy.obj.pos.x - bullet_pos.x).abs();
                            let delta_y = (enemy.obj.pos.y - bullet_pos.y).abs();
                            if delta_x < RIM_HIT_RANGE && delta_y < RIM_HIT_RANGE {
                                corridor_enemy = Some((i, enemy.obj.pos.z));
                                break;
                            }
                        }
                    } else if bullet_corridor == enemy.corridor
                        && bullet_pos.z >= enemy.obj.pos.z - HIT_Z_RANGE
                        && bullet_pos.z <= enemy.obj.pos.z + HIT_Z_RANGE
                    {
                        if enemy.kind == EnemyKind::Fuseball {
                            // Unhittable while riding a corridor joint
                            if let Some(props) = corridor_props(&level.obj, enemy.corridor) {
                                let at = FxVec3::new(
                                    enemy.obj.pos.x,
                                    enemy.obj.pos.y,
                                    props.midpoint.z,
                                );
                                if squared_dist(at, props.midpoint) < FUSEBALL_HIT_DIST {
                                    corridor_enemy = Some((i, enemy.obj.pos.z));
                                    break;
                                }
                            }
                        } else {
                            corridor_enemy = Some((i, enemy.obj.pos.z));
                            break;
                        }
                    }
                }

                // Both in range: the nearer one takes the hit
                if let (Some((_, enemy_z)), Some((_, spike_z))) = (corridor_enemy, corridor_spike) {
                    if enemy_z <= spike_z {
                        corridor_spike = None;
                    } else {
                        corridor_enemy = None;
                    }
                }

                if let Some((spike_index, _)) = corridor_spike {
                    spikes.damage(spike_index);
                    self.bullets[bullet_index].active = false;
                } else if let Some((enemy_index, _)) = corridor_enemy {
                    let enemy = &mut enemies.enemies[enemy_index];
                    enemy.health -= 1;
                    if enemy.health <= 0 {
                        impacts.push(BulletImpact {
                            kind: enemy.kind,
                            world: enemy.obj.pos,
                        });
                        enemies.destroy(enemy_index, true, level, spikes, rng);
                    }
                    self.bullets[bullet_index].active = false;
                }
            }

            let bullet = &mut self.bullets[bullet_index];
            if bullet.active {
                bullet.obj.pos.z += mul(BULLET_SPEED, dt);
                if bullet.obj.pos.z >= LEVEL_ZFAR + 16384 {
                    bullet.active = false;
                }
            }
        }

        impacts
    }

    pub fn add_to_scene(&mut self, scene: &mut Scene, camera: &Camera, proj: &Projector) {
        for bullet in &mut self.bullets {
            if bullet.active {
                let _ = scene.add(&mut bullet.obj, camera, proj, true);
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.bullets.iter().filter(|b| b.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::EnemyAnims;
    use rand::SeedableRng;

    struct StubAssets;

    impl crate::assets::AssetLoader for StubAssets {
        fn load(
            &self,
            _path: &str,
            _kind: crate::assets::AssetKind,
        ) -> Result<Vec<u8>, crate::assets::AssetLoadError> {
            Ok(crate::assets::CelData::solid(32, 32, rgb15(0, 31, 0)).to_bytes())
        }
    }

    fn parts() -> (BulletPool, EnemyPool, SpikePool, Level, Player, Pcg32) {
        let mut rng = Pcg32::seed_from_u64(21);
        let level = Level::from_mesh(1, &MeshData::tube(16, fx(4), fx(4), true), true, &mut rng);
        let anims = EnemyAnims::load(&StubAssets, &crate::assets::new_disc_lock()).unwrap();
        let mut player = Player::new(&MeshData::ship());
        player.active = true;
        player.corridor = 2;
        player.obj.set_pos(0, 0, LEVEL_ZNEAR);
        (
            BulletPool::new(&MeshData::billboard()),
            EnemyPool::new(&MeshData::billboard(), anims),
            SpikePool::new(),
            level,
            player,
            rng,
        )
    }

    #[test]
    fn test_rate_limit_allows_one_bullet_per_window() {
        let (mut bullets, _, _, _, player, _) = parts();
        bullets.reset(0);

        // Five trigger pulls inside the 115ms window
        let mut fired = 0;
        for t in [200, 210, 240, 280, 310] {
            if bullets.fire(&player, false, t) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(bullets.active_count(), 1);

        // Next window opens
        assert!(bullets.fire(&player, false, 330));
        assert_eq!(bullets.active_count(), 2);
    }

    #[test]
    fn test_inactive_player_cannot_fire() {
        let (mut bullets, _, _, _, mut player, _) = parts();
        bullets.reset(0);
        player.active = false;
        assert!(!bullets.fire(&player, false, 500));
        assert_eq!(bullets.active_count(), 0);
    }

    #[test]
    fn test_hard_mode_shrinks_pool() {
        let (mut bullets, _, _, _, player, _) = parts();
        bullets.reset(0);
        let mut t = 200;
        for _ in 0..MAX_BULLETS {
            bullets.fire(&player, true, t);
            t += 200;
        }
        assert_eq!(bullets.active_count(), MAX_BULLETS - 2);
    }

    #[test]
    fn test_bullet_travels_and_expires() {
        let (mut bullets, mut enemies, mut spikes, mut level, player, mut rng) = parts();
        bullets.reset(0);
        bullets.fire(&player, false, 200);

        let mut ticks = 0;
        while bullets.active_count() > 0 && ticks < 2000 {
            bullets.update(1049, true, &mut enemies, &mut spikes, &mut level, &mut rng);
            ticks += 1;
        }
        assert_eq!(bullets.active_count(), 0, "bullet never left the level");
        assert!(ticks > 10, "bullet expired implausibly fast");
    }

    #[test]
    fn test_bullet_kills_enemy_on_same_corridor() {
        let (mut bullets, mut enemies, mut spikes, mut level, player, mut rng) = parts();
        enemies.spawn(EnemyKind::Tanker, 2, fx(1), &level, &spikes, &mut rng);
        bullets.reset(0);
        bullets.fire(&player, false, 200);

        let mut impacts = Vec::new();
        for _ in 0..2000 {
            impacts.extend(bullets.update(
                1049,
                true,
                &mut enemies,
                &mut spikes,
                &mut level,
                &mut rng,
            ));
            if !impacts.is_empty() {
                break;
            }
        }
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].kind, EnemyKind::Tanker);
        // Destroy-with-payload: the tanker left a flipper behind
        assert_eq!(enemies.count_of(EnemyKind::Flipper), 1);
        assert_eq!(bullets.active_count(), 0);
    }

    #[test]
    fn test_nearer_target_wins_never_both() {
        let (mut bullets, mut enemies, mut spikes, mut level, player, mut rng) = parts();
        // Spike tip at z=1, enemy behind it at z=2, both on corridor 2
        let props = corridor_props(&level.obj, 2).unwrap();
        spikes.activate(FxVec3::new(props.midpoint.x, props.midpoint.y, fx(1)), 2);
        enemies.spawn(EnemyKind::Spiker, 2, fx(2), &level, &spikes, &mut rng);
        enemies.enemies[0].obj.pos.z = fx(2);

        bullets.reset(0);
        bullets.fire(&player, false, 200);

        let enemy_health_before = enemies.enemies[0].health;
        let spike_end_before = spikes.spikes[0].end.z;
        for _ in 0..2000 {
            bullets.update(1049, true, &mut enemies, &mut spikes, &mut level, &mut rng);
            if bullets.active_count() == 0 {
                break;
            }
        }

        // The spike is nearer: it takes the hit, the enemy is untouched
        assert!(spikes.spikes[0].end.z > spike_end_before);
        assert_eq!(enemies.enemies[0].health, enemy_health_before);
    }

    #[test]
    fn test_volley_offsets_cycle() {
        let (mut bullets, _, _, _, player, _) = parts();
        bullets.reset(0);
        let mut t = 200;
        let mut positions = Vec::new();
        for _ in 0..3 {
            bullets.fire(&player, false, t);
            t += 200;
            positions.push(
                bullets
                    .bullets
                    .iter()
                    .filter(|b| b.active)
                    .map(|b| (b.obj.pos.x, b.obj.pos.y))
                    .collect::<Vec<_>>(),
            );
        }
        let last = positions.last().unwrap();
        // Three live bullets at three distinct offsets
        assert_eq!(last.len(), 3);
        assert!(last[0] != last[1] && last[1] != last[2]);
    }
}
