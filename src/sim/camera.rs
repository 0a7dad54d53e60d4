//! Camera and projection
//!
//! The camera is a world position only; the game never rolls or pitches
//! along the tube axis. Projection is simple perspective with two paths: an
//! exact divide, and an inverse-depth lookup table that trades a little
//! precision to drop the division from the per-vertex hot path.

use crate::consts::{CAM_BASE_Z_OFFSET, LEVEL_ZNEAR};
use crate::display::Point;
use crate::fixed::{FRAC_BITS, Fx, FxVec3, ONE, div, mul};
use crate::sim::object::Polygon;

// View distance is 2^8
const VIEW_DIST_SHIFT: u32 = 8;
const Z_LUT_SIZE: usize = 2048;
// Inward x offset and wrap-dependent y offset applied to targets so the
// camera frames the corridor rather than centering on it.
const CAM_X_OFFSET: Fx = 13107;
const CAM_Y_OFFSET: Fx = 32768;
const CAM_SPEED: Fx = 131072;

/// |camera z| in [0, 16) quantized to a table bucket: z / 16 * 2048.
#[inline]
fn cam_z_to_lut(z: Fx) -> i32 {
    (z << 7) >> FRAC_BITS
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Camera {
    pub pos: FxVec3,
    target_x: Fx,
    target_y: Fx,
}

impl Camera {
    /// Chase the target on x/y at CAM_SPEED, clamping at the target; z is
    /// locked to the player's depth above the rim.
    pub fn update(&mut self, dt: Fx, player_z: Fx) {
        if self.pos.x < self.target_x {
            self.pos.x = (self.pos.x + mul(CAM_SPEED, dt)).min(self.target_x);
        } else if self.pos.x > self.target_x {
            self.pos.x = (self.pos.x - mul(CAM_SPEED, dt)).max(self.target_x);
        }

        if self.pos.y < self.target_y {
            self.pos.y = (self.pos.y + mul(CAM_SPEED, dt)).min(self.target_y);
        } else if self.pos.y > self.target_y {
            self.pos.y = (self.pos.y - mul(CAM_SPEED, dt)).max(self.target_y);
        }

        self.pos.z = CAM_BASE_Z_OFFSET + (player_z - LEVEL_ZNEAR);
    }

    /// Target x, pulled toward the tube axis for a better view angle.
    pub fn set_target_x(&mut self, x: Fx) {
        self.target_x = x;
        if self.target_x > 0 {
            self.target_x -= CAM_X_OFFSET;
        } else if self.target_x < 0 {
            self.target_x += CAM_X_OFFSET;
        }
    }

    /// Target y; wrapping tubes pull toward the axis, open strips push the
    /// camera above the trough.
    pub fn set_target_y(&mut self, y: Fx, level_wraps: bool) {
        self.target_y = y;
        if level_wraps {
            if self.target_y >= 0 {
                self.target_y -= CAM_Y_OFFSET;
            } else {
                self.target_y += CAM_Y_OFFSET;
            }
        } else {
            self.target_y += CAM_Y_OFFSET;
        }
    }

    pub fn reset_play(&mut self) {
        self.pos = FxVec3::new(0, 0, CAM_BASE_Z_OFFSET);
        self.target_x = 0;
        self.target_y = 0;
    }

    pub fn zero(&mut self) {
        self.pos = FxVec3::ZERO;
        self.target_x = 0;
        self.target_y = 0;
    }

    /// World point to camera space.
    #[inline]
    pub fn to_camera(&self, point: FxVec3) -> FxVec3 {
        point - self.pos
    }
}

/// Screen projector with the precomputed inverse-depth table.
pub struct Projector {
    inv_depth: Box<[Fx; Z_LUT_SIZE]>,
    half_w: i32,
    half_h: i32,
    half_w_f16: Fx,
    half_h_f16: Fx,
}

impl Projector {
    pub fn new(display_width: u32, display_height: u32) -> Self {
        let mut inv_depth = Box::new([0; Z_LUT_SIZE]);
        let mut value = 512;
        for entry in inv_depth.iter_mut() {
            *entry = div(ONE, value);
            value += 512;
        }
        let half_w = (display_width / 2) as i32;
        let half_h = (display_height / 2) as i32;
        Self {
            inv_depth,
            half_w,
            half_h,
            half_w_f16: half_w << FRAC_BITS,
            half_h_f16: half_h << FRAC_BITS,
        }
    }

    /// Reciprocal of |z| via the table, sign of z reapplied.
    #[inline]
    fn inv_z(&self, z: Fx) -> Fx {
        let index = cam_z_to_lut(z.abs()).clamp(0, Z_LUT_SIZE as i32 - 1);
        let value = self.inv_depth[index as usize];
        if z < 0 { -value } else { value }
    }

    /// Camera-space point to whole-pixel screen coordinates.
    pub fn point_to_screen(&self, point: FxVec3, use_inv_lut: bool) -> Point {
        if use_inv_lut {
            let inv = self.inv_z(point.z);
            Point::new(
                (mul(point.x << VIEW_DIST_SHIFT, inv) >> FRAC_BITS) + self.half_w,
                (mul(-point.y << VIEW_DIST_SHIFT, inv) >> FRAC_BITS) + self.half_h,
            )
        } else {
            let z = if point.z == 0 { 1 } else { point.z };
            Point::new(
                (div(point.x << VIEW_DIST_SHIFT, z) >> FRAC_BITS) + self.half_w,
                (div(-point.y << VIEW_DIST_SHIFT, z) >> FRAC_BITS) + self.half_h,
            )
        }
    }

    /// Project a polygon's cached camera-space corners into 16.16 screen
    /// coordinates.
    pub fn poly_to_screen(&self, poly: &mut Polygon, use_inv_lut: bool) {
        for i in 0..4 {
            let cam = poly.camera[i];
            if use_inv_lut {
                let inv = self.inv_z(cam.z);
                poly.screen[i] = Point::new(
                    mul(cam.x << VIEW_DIST_SHIFT, inv) + self.half_w_f16,
                    mul(-cam.y << VIEW_DIST_SHIFT, inv) + self.half_h_f16,
                );
            } else {
                let z = if cam.z == 0 { 1 } else { cam.z };
                poly.screen[i] = Point::new(
                    div(cam.x << VIEW_DIST_SHIFT, z) + self.half_w_f16,
                    div(-cam.y << VIEW_DIST_SHIFT, z) + self.half_h_f16,
                );
            }
        }
    }
}

/// Fill a polygon's world and camera caches and its average depth.
pub fn poly_to_world_cam(poly: &mut Polygon, verts: &[FxVec3], obj_pos: FxVec3, camera: &Camera) {
    for i in 0..4 {
        let world = verts[poly.lut[i]] + obj_pos;
        poly.world[i] = world;
        poly.camera[i] = world - camera.pos;
    }
    poly.avgz =
        (poly.camera[0].z + poly.camera[1].z + poly.camera[2].z + poly.camera[3].z) >> 2;
}

/// Like `poly_to_world_cam`, but pseudo-clips against the near plane:
/// camera z below `near` is pinned to `near` (the vertex is kept). Returns
/// false only when all four vertices were pinned, i.e. the polygon is
/// entirely behind the plane. Only correct for axis-aligned quads.
pub fn poly_to_world_cam_clip(
    poly: &mut Polygon,
    verts: &[FxVec3],
    obj_pos: FxVec3,
    camera: &Camera,
    near: Fx,
) -> bool {
    let mut pinned = 0;
    for i in 0..4 {
        let world = verts[poly.lut[i]] + obj_pos;
        poly.world[i] = world;
        poly.camera[i] = world - camera.pos;
        if poly.camera[i].z < near {
            poly.camera[i].z = near;
            pinned += 1;
        }
    }
    if pinned == 4 {
        return false;
    }
    poly.avgz =
        (poly.camera[0].z + poly.camera[1].z + poly.camera[2].z + poly.camera[3].z) >> 2;
    true
}
