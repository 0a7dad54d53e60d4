//! Player ship
//!
//! The ship rides the near rim of its corridor. Steering drags the two
//! wing-root vertices sideways until they cross a distance threshold, then
//! the ship hops to the neighboring corridor and re-snaps; the dragged
//! mesh doubles as the lean animation. Wrapping tubes step across the
//! seam, open strips clamp at their boundary corridors.

use rand::Rng;
use rand_pcg::Pcg32;

use crate::assets::MeshData;
use crate::consts::LEVEL_ZNEAR;
use crate::display::{Cel, rgb15};
use crate::fixed::{ANG_128, Fx, FxVec3, cos, mul, sin, squared_dist};
use crate::sim::camera::Camera;
use crate::sim::corridor::{corridor_angle, corridor_props, next_corridor, prev_corridor};
use crate::sim::level::Level;
use crate::sim::object::{Object, VertexBuffer};

pub const MAX_LIVES: u32 = 5;

// Axis flags for partial snaps.
pub const X_AXIS: u32 = 1;
pub const Y_AXIS: u32 = 2;
pub const Z_AXIS: u32 = 4;

const PLAYER_SCALE: Fx = 26215;
/// How far the lean meshes shift the wing roots.
const LEAN_SHIFT: Fx = 10000;
/// Squared wing-root travel that triggers a corridor step.
const CORRIDOR_STEP_DIST: Fx = 3600;
/// The polygon whose first two vertices are the steering wing roots.
const STEER_POLY: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lean {
    Neutral,
    Left,
    Right,
}

pub struct Player {
    pub obj: Object,
    pub active: bool,
    pub velocity_z: Fx,
    pub lives: u32,
    pub corridor: usize,
    /// Z rotation applied by the last snap (already negated).
    pub rotation_angle: Fx,
    /// Steering acceleration, grows while the stick is held.
    pub move_vel: Fx,
    lean_left: VertexBuffer,
    lean_right: VertexBuffer,
    active_lean: Lean,
}

impl Player {
    pub fn new(mesh: &MeshData) -> Self {
        let mut obj = Object::from_mesh(mesh, &Cel::solid(16, 16, rgb15(31, 31, 0)));
        obj.calc_normals();
        obj.scale(PLAYER_SCALE);
        obj.freeze_pristine();
        obj.bsphere_radius = obj.calc_bsphere_radius();

        // Lean meshes: wing roots pre-shifted sideways
        let steer_lut = obj.polygons[STEER_POLY].lut;
        let mut lean_left = obj.pristine.clone();
        trans_vertex_xy_by(&mut lean_left[steer_lut[0]], LEAN_SHIFT, -ANG_128);
        trans_vertex_xy_by(&mut lean_left[steer_lut[1]], LEAN_SHIFT, -ANG_128);
        let mut lean_right = obj.pristine.clone();
        trans_vertex_xy_by(&mut lean_right[steer_lut[0]], LEAN_SHIFT, 0);
        trans_vertex_xy_by(&mut lean_right[steer_lut[1]], LEAN_SHIFT, 0);

        Self {
            obj,
            active: false,
            velocity_z: 0,
            lives: 3,
            corridor: 0,
            rotation_angle: 0,
            move_vel: 0,
            lean_left,
            lean_right,
            active_lean: Lean::Neutral,
        }
    }

    /// New-life placement: random corridor, neutral lean, full snap.
    pub fn reset(&mut self, level: &Level, camera: &mut Camera, rng: &mut Pcg32) {
        self.corridor = rng.random_range(0..level.corridor_count());
        self.velocity_z = 0;
        self.move_vel = 0;
        self.active_lean = Lean::Neutral;
        self.active = true;
        self.snap(level, X_AXIS | Y_AXIS | Z_AXIS, camera);
    }

    /// Re-seat the ship on its corridor along the flagged axes, restore the
    /// active lean mesh and apply the corridor rotation. Camera targets
    /// follow the snapped position.
    pub fn snap(&mut self, level: &Level, axis_flags: u32, camera: &mut Camera) {
        let Some(props) = corridor_props(&level.obj, self.corridor) else {
            return;
        };

        if axis_flags & X_AXIS != 0 {
            self.obj.pos.x = props.midpoint.x;
            camera.set_target_x(self.obj.pos.x);
        }
        if axis_flags & Y_AXIS != 0 {
            self.obj.pos.y = props.midpoint.y;
            camera.set_target_y(self.obj.pos.y, level.wrap);
        }
        if axis_flags & Z_AXIS != 0 {
            self.obj.pos.z = LEVEL_ZNEAR;
        }

        // Reset to the lean mesh, then rotate onto the wall
        let lean_verts = match self.active_lean {
            Lean::Neutral => &self.obj.pristine,
            Lean::Left => &self.lean_left,
            Lean::Right => &self.lean_right,
        };
        self.obj.verts.borrow_mut().copy_from_slice(lean_verts);

        let angle = corridor_angle(&level.obj, self.corridor);
        if angle != 0 {
            self.obj.rotate(FxVec3::new(0, 0, -angle));
            self.rotation_angle = -angle;
        } else {
            self.rotation_angle = 0;
        }
    }

    /// One steering impulse. Drags the wing roots along the rim; once they
    /// travel far enough the ship steps to the neighboring corridor (or
    /// clamps against an open strip's boundary) and re-snaps.
    pub fn steer(
        &mut self,
        toward_next: bool,
        step_amount: Fx,
        level: &Level,
        camera: &mut Camera,
    ) {
        let angle = if toward_next {
            -self.rotation_angle
        } else {
            -self.rotation_angle + ANG_128
        };

        let steer_lut = self.obj.polygons[STEER_POLY].lut;
        {
            let mut verts = self.obj.verts.borrow_mut();
            trans_vertex_xy_by(&mut verts[steer_lut[0]], step_amount, angle);
            trans_vertex_xy_by(&mut verts[steer_lut[1]], step_amount, angle);
        }

        let dragged_world = self.obj.verts.borrow()[steer_lut[0]] + self.obj.pos;
        let dist = squared_dist(self.obj.pos, dragged_world);
        if dist <= CORRIDOR_STEP_DIST {
            return;
        }

        let count = level.corridor_count();
        if toward_next {
            self.active_lean = Lean::Left;
            match next_corridor(self.corridor, count, level.wrap) {
                Some(corridor) => self.corridor = corridor,
                None => {
                    // Invalid move past the strip boundary
                    self.active_lean = Lean::Right;
                }
            }
        } else {
            self.active_lean = Lean::Right;
            match prev_corridor(self.corridor, count, level.wrap) {
                Some(corridor) => self.corridor = corridor,
                None => {
                    self.active_lean = Lean::Left;
                }
            }
        }

        self.snap(level, X_AXIS | Y_AXIS, camera);
    }
}

/// Shift a vertex in the xy plane by a distance along a 256-unit angle.
pub fn trans_vertex_xy_by(vertex: &mut FxVec3, amount: Fx, angle: Fx) {
    vertex.x += mul(amount, cos(angle));
    vertex.y += mul(amount, sin(angle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use crate::fixed::{ONE, fx};

    fn test_level(closed: bool) -> Level {
        let mut rng = Pcg32::seed_from_u64(11);
        Level::from_mesh(1, &MeshData::tube(16, fx(4), fx(4), closed), closed, &mut rng)
    }

    fn parts(closed: bool) -> (Player, Level, Camera, Pcg32) {
        (
            Player::new(&MeshData::ship()),
            test_level(closed),
            Camera::default(),
            Pcg32::seed_from_u64(5),
        )
    }

    #[test]
    fn test_reset_snaps_to_rim() {
        let (mut player, level, mut camera, mut rng) = parts(true);
        player.reset(&level, &mut camera, &mut rng);
        assert!(player.active);
        assert_eq!(player.obj.pos.z, LEVEL_ZNEAR);
        let props = corridor_props(&level.obj, player.corridor).unwrap();
        assert_eq!(player.obj.pos.x, props.midpoint.x);
        assert_eq!(player.obj.pos.y, props.midpoint.y);
    }

    #[test]
    fn test_steer_steps_to_next_corridor() {
        let (mut player, level, mut camera, mut rng) = parts(true);
        player.reset(&level, &mut camera, &mut rng);
        let start = player.corridor;

        // Keep dragging until the threshold trips
        for _ in 0..500 {
            player.steer(true, 2000, &level, &mut camera);
            if player.corridor != start {
                break;
            }
        }
        assert_eq!(player.corridor, (start + 1) % level.corridor_count());
        // Snap re-seated the ship on the new corridor
        let props = corridor_props(&level.obj, player.corridor).unwrap();
        assert_eq!(player.obj.pos.x, props.midpoint.x);
    }

    #[test]
    fn test_steer_wraps_on_closed_tube() {
        let (mut player, level, mut camera, _) = parts(true);
        player.active = true;
        player.corridor = level.corridor_count() - 1;
        player.snap(&level, X_AXIS | Y_AXIS | Z_AXIS, &mut camera);

        for _ in 0..500 {
            player.steer(true, 2000, &level, &mut camera);
            if player.corridor != level.corridor_count() - 1 {
                break;
            }
        }
        assert_eq!(player.corridor, 0);
    }

    #[test]
    fn test_steer_clamps_on_open_strip() {
        let (mut player, level, mut camera, _) = parts(false);
        player.active = true;
        player.corridor = level.corridor_count() - 1;
        player.snap(&level, X_AXIS | Y_AXIS | Z_AXIS, &mut camera);

        for _ in 0..500 {
            player.steer(true, 2000, &level, &mut camera);
        }
        // Still parked on the boundary corridor
        assert_eq!(player.corridor, level.corridor_count() - 1);

        player.corridor = 0;
        player.snap(&level, X_AXIS | Y_AXIS, &mut camera);
        for _ in 0..500 {
            player.steer(false, 2000, &level, &mut camera);
        }
        assert_eq!(player.corridor, 0);
    }

    #[test]
    fn test_partial_snap_leaves_other_axes() {
        let (mut player, level, mut camera, mut rng) = parts(true);
        player.reset(&level, &mut camera, &mut rng);
        player.obj.pos.z = LEVEL_ZNEAR - fx(1);

        player.snap(&level, X_AXIS | Y_AXIS, &mut camera);
        // Z untouched without the flag
        assert_eq!(player.obj.pos.z, LEVEL_ZNEAR - fx(1));
        player.snap(&level, Z_AXIS, &mut camera);
        assert_eq!(player.obj.pos.z, LEVEL_ZNEAR);
    }

    #[test]
    fn test_trans_vertex_directions() {
        let mut v = FxVec3::ZERO;
        trans_vertex_xy_by(&mut v, fx(1), 0);
        assert_eq!(v.x, ONE);
        assert_eq!(v.y, 0);

        let mut v = FxVec3::ZERO;
        trans_vertex_xy_by(&mut v, fx(1), -ANG_128);
        assert_eq!(v.x, -ONE);
    }

    #[test]
    fn test_lean_meshes_shift_wing_roots() {
        let (player, ..) = parts(true);
        let lut = player.obj.polygons[STEER_POLY].lut;
        assert!(player.lean_left[lut[0]].x < player.obj.pristine[lut[0]].x);
        assert!(player.lean_right[lut[0]].x > player.obj.pristine[lut[0]].x);
        // Non-steering vertices are untouched
        assert_eq!(player.lean_left[lut[2]], player.obj.pristine[lut[2]]);
    }
}
