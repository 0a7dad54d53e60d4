//! Object/transform model
//!
//! An object is a world position plus an indexed vertex buffer shared by
//! one or more quad polygons. Vertex buffers may be shared between objects
//! (`SharedVerts`): rotating one sharer rotates them all, by contract. Each
//! object also keeps a pristine copy of its vertices so accumulated 16.16
//! rotation error can be reset after a full spin.

use std::cell::RefCell;
use std::rc::Rc;

use crate::assets::MeshData;
use crate::display::{Cel, Point};
use crate::fixed::{
    self, Fx, FxVec3, Mat3, cross, identity, mat_mul, mul, normalize, sqrt, square, transform,
    transform_many,
};

/// Vertex positions, local space, 16.16.
pub type VertexBuffer = Vec<FxVec3>;

/// Reference-counted shared vertex buffer. Mutating rotations applied
/// through any holder are visible to all holders.
pub type SharedVerts = Rc<RefCell<VertexBuffer>>;

/// One quad polygon: 4 indices into the parent object's vertex buffer plus
/// per-frame transform caches and an owned rendering cel.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub lut: [usize; 4],
    pub normal: FxVec3,
    pub world: [FxVec3; 4],
    pub camera: [FxVec3; 4],
    /// Projected corners, 16.16 screen units.
    pub screen: [Point; 4],
    /// Average camera-space depth, cached for the painter's sort.
    pub avgz: Fx,
    pub cel: Cel,
}

impl Polygon {
    fn new(lut: [usize; 4], cel: Cel) -> Self {
        Self {
            lut,
            normal: FxVec3::ZERO,
            world: [FxVec3::ZERO; 4],
            camera: [FxVec3::ZERO; 4],
            screen: [Point::default(); 4],
            avgz: 0,
            cel,
        }
    }
}

#[derive(Debug)]
pub struct Object {
    /// World position, 16.16.
    pub pos: FxVec3,
    pub verts: SharedVerts,
    /// Untransformed vertex copy for rotation-drift resets.
    pub pristine: VertexBuffer,
    pub polygons: Vec<Polygon>,
    /// Max vertex distance from local origin; cached after load/scale.
    pub bsphere_radius: Fx,
}

impl Object {
    /// Build from mesh data; every polygon starts with a copy of the given
    /// cel (bitmap shared, palette owned).
    pub fn from_mesh(mesh: &MeshData, cel: &Cel) -> Self {
        let verts: VertexBuffer = mesh
            .verts
            .iter()
            .map(|v| FxVec3::new(v[0], v[1], v[2]))
            .collect();
        let polygons = mesh
            .polys
            .iter()
            .map(|lut| Polygon::new(*lut, cel.share_image()))
            .collect();
        let mut obj = Self {
            pos: FxVec3::ZERO,
            verts: Rc::new(RefCell::new(verts.clone())),
            pristine: verts,
            polygons,
            bsphere_radius: 0,
        };
        obj.bsphere_radius = obj.calc_bsphere_radius();
        obj
    }

    /// Deep copy: own vertex buffer and polygons; cel bitmaps stay shared
    /// with the source, palettes are copied.
    pub fn deep_copy(&self) -> Self {
        let verts = self.verts.borrow().clone();
        Self {
            pos: self.pos,
            verts: Rc::new(RefCell::new(verts.clone())),
            pristine: verts,
            polygons: self.polygons.clone(),
            bsphere_radius: self.bsphere_radius,
        }
    }

    /// Copy that shares this object's live vertex buffer. Rotations applied
    /// to either object move both; see module docs.
    pub fn sharing_verts(&self) -> Self {
        Self {
            pos: self.pos,
            verts: Rc::clone(&self.verts),
            pristine: self.pristine.clone(),
            polygons: self.polygons.clone(),
            bsphere_radius: self.bsphere_radius,
        }
    }

    /// Restore vertices from the pristine copy.
    pub fn reset_verts(&mut self) {
        self.verts.borrow_mut().copy_from_slice(&self.pristine);
    }

    /// Re-snapshot the pristine copy from the live vertices (after scaling
    /// at load time).
    pub fn freeze_pristine(&mut self) {
        self.pristine = self.verts.borrow().clone();
    }

    pub fn set_pos(&mut self, x: Fx, y: Fx, z: Fx) {
        self.pos = FxVec3::new(x, y, z);
    }

    pub fn translate(&mut self, delta: FxVec3) {
        self.pos += delta;
    }

    /// Uniform multiplicative scale over all vertices.
    pub fn scale(&mut self, factor: Fx) {
        for v in self.verts.borrow_mut().iter_mut() {
            v.x = mul(v.x, factor);
            v.y = mul(v.y, factor);
            v.z = mul(v.z, factor);
        }
    }

    pub fn scale_x(&mut self, factor: Fx) {
        for v in self.verts.borrow_mut().iter_mut() {
            v.x = mul(v.x, factor);
        }
    }

    pub fn scale_y(&mut self, factor: Fx) {
        for v in self.verts.borrow_mut().iter_mut() {
            v.y = mul(v.y, factor);
        }
    }

    /// Rotate all vertices in the shared buffer. Per-axis matrices are
    /// built only for non-zero angles and composed X, then Y, then Z.
    /// This touches every object sharing the buffer.
    pub fn rotate(&mut self, angles: FxVec3) {
        fn compose(rotation: Option<Mat3>, m: Mat3) -> Option<Mat3> {
            Some(match rotation {
                Some(r) => mat_mul(&r, &m),
                None => m,
            })
        }

        let mut rotation: Option<Mat3> = None;
        if angles.x != 0 {
            let cs = fixed::cos(angles.x);
            let sn = fixed::sin(angles.x);
            let mut rx = identity();
            rx[1][1] = cs;
            rx[1][2] = -sn;
            rx[2][1] = sn;
            rx[2][2] = cs;
            rotation = compose(rotation, rx);
        }
        if angles.y != 0 {
            let cs = fixed::cos(angles.y);
            let sn = fixed::sin(angles.y);
            let mut ry = identity();
            ry[0][0] = cs;
            ry[0][2] = sn;
            ry[2][0] = -sn;
            ry[2][2] = cs;
            rotation = compose(rotation, ry);
        }
        if angles.z != 0 {
            rotation = compose(rotation, fixed::rotation_z(angles.z));
        }

        if let Some(rotation) = rotation {
            transform_many(&mut self.verts.borrow_mut(), &rotation);
        }
    }

    /// Single-z-axis rotation of the first four vertices; billboard spin
    /// fast path.
    pub fn rotate_quad_z(&mut self, angle: Fx) {
        let rotz = fixed::rotation_z(angle);
        let mut verts = self.verts.borrow_mut();
        debug_assert!(verts.len() >= 4);
        transform_many(&mut verts[..4], &rotz);
    }

    /// Rotate the whole object around an arbitrary world-space pivot on the
    /// z axis. Three steps, in order: vertices to world space minus pivot,
    /// rotate (vertices and the object center), then back to local space
    /// around the moved center.
    pub fn rotate_pivot_z(&mut self, pivot: FxVec3, angle: Fx) {
        let rotz = fixed::rotation_z(angle);

        {
            let mut verts = self.verts.borrow_mut();
            for v in verts.iter_mut() {
                let world = *v + self.pos - pivot;
                *v = transform(world, &rotz) + pivot;
            }
        }

        // Rotate the center to keep the object intact
        let center = transform(self.pos - pivot, &rotz);
        self.pos = center + pivot;

        let mut verts = self.verts.borrow_mut();
        for v in verts.iter_mut() {
            *v -= self.pos;
        }
    }

    /// Max vertex distance from the local origin.
    pub fn calc_bsphere_radius(&self) -> Fx {
        self.verts
            .borrow()
            .iter()
            .map(|v| sqrt(square(v.x) + square(v.y) + square(v.z)))
            .max()
            .unwrap_or(0)
    }

    /// Face normal from the first three LUT vertices, CCW winding.
    pub fn calc_poly_normal(&mut self, poly_index: usize) {
        let verts = self.verts.borrow();
        let poly = &self.polygons[poly_index];
        let p1 = verts[poly.lut[0]];
        let p2 = verts[poly.lut[1]];
        let p3 = verts[poly.lut[2]];
        drop(verts);

        let vec1 = p2 - p1;
        let vec2 = p3 - p2;
        let mut normal = cross(vec2, vec1);
        normalize(&mut normal);
        self.polygons[poly_index].normal = normal;
    }

    pub fn calc_normals(&mut self) {
        for i in 0..self.polygons.len() {
            self.calc_poly_normal(i);
        }
    }

    /// Bounding-sphere collision: sum-of-radii test in world space. `half`
    /// halves both radii first (tighter player/enemy hits).
    pub fn is_colliding(&self, other: &Object, half: bool) -> bool {
        let d = other.pos - self.pos;
        let mut r1 = self.bsphere_radius;
        let mut r2 = other.bsphere_radius;
        if half {
            r1 >>= 1;
            r2 >>= 1;
        }
        let squared_dist = square(d.x) + square(d.y) + square(d.z);
        square(r1 + r2) >= squared_dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{ANG_64, ONE, fx};

    fn billboard() -> Object {
        Object::from_mesh(&MeshData::billboard(), &Cel::coded(8, 8))
    }

    #[test]
    fn test_bsphere_radius() {
        let obj = billboard();
        // Corner at (1,1,0) -> radius sqrt(2) ~ 1.414
        let expected = sqrt(fx(2));
        assert_eq!(obj.bsphere_radius, expected);
    }

    #[test]
    fn test_scale_updates_verts() {
        let mut obj = billboard();
        obj.scale(ONE / 2);
        assert_eq!(obj.verts.borrow()[0], FxVec3::new(-ONE / 2, ONE / 2, 0));
        // Pristine copy unaffected until frozen
        assert_eq!(obj.pristine[0], FxVec3::new(-fx(1), fx(1), 0));
        obj.freeze_pristine();
        assert_eq!(obj.pristine[0], FxVec3::new(-ONE / 2, ONE / 2, 0));
    }

    #[test]
    fn test_per_axis_scale_and_translate() {
        let mut obj = billboard();
        obj.scale_x(ONE / 2);
        obj.scale_y(fx(2));
        let v = obj.verts.borrow()[2];
        assert_eq!(v, FxVec3::new(ONE / 2, -fx(2), 0));

        obj.translate(FxVec3::new(fx(1), 0, -fx(3)));
        assert_eq!(obj.pos, FxVec3::new(fx(1), 0, -fx(3)));
    }

    #[test]
    fn test_shared_verts_rotate_moves_all_sharers() {
        let mut a = billboard();
        let b = a.sharing_verts();
        a.rotate(FxVec3::new(0, 0, ANG_64));
        // b sees the rotation through the shared buffer
        let v = b.verts.borrow()[0];
        assert_ne!(v, FxVec3::new(-fx(1), fx(1), 0));
        assert_eq!(v, a.verts.borrow()[0]);
    }

    #[test]
    fn test_deep_copy_is_isolated() {
        let mut a = billboard();
        let b = a.deep_copy();
        a.rotate(FxVec3::new(0, 0, ANG_64));
        assert_eq!(b.verts.borrow()[0], FxVec3::new(-fx(1), fx(1), 0));
    }

    #[test]
    fn test_reset_verts_undoes_rotation_drift() {
        let mut obj = billboard();
        // 16 quarter turns accumulate rounding error
        for _ in 0..16 {
            obj.rotate(FxVec3::new(0, 0, ANG_64));
        }
        obj.reset_verts();
        assert_eq!(obj.verts.borrow()[0], FxVec3::new(-fx(1), fx(1), 0));
    }

    #[test]
    fn test_rotate_pivot_z_moves_center() {
        let mut obj = billboard();
        obj.set_pos(fx(2), 0, 0);
        // Half turn around the origin lands the center at -2
        obj.rotate_pivot_z(FxVec3::ZERO, crate::fixed::ANG_128);
        assert!((obj.pos.x + fx(2)).abs() < 16, "pos.x = {}", obj.pos.x);
        assert!(obj.pos.y.abs() < 16);
        // Local vertices stay centered on the object
        let v0 = obj.verts.borrow()[0];
        assert!(v0.x.abs() <= fx(1) + 16 && v0.y.abs() <= fx(1) + 16);
    }

    #[test]
    fn test_is_colliding_sum_of_radii() {
        let mut a = billboard();
        let mut b = billboard();
        a.set_pos(0, 0, 0);
        // Radii are sqrt(2) each; total ~2.83
        b.set_pos(fx(2), 0, 0);
        assert!(a.is_colliding(&b, false));
        // Half mode shrinks the reach below the distance
        assert!(!a.is_colliding(&b, true));
        b.set_pos(fx(5), 0, 0);
        assert!(!a.is_colliding(&b, false));
    }

    #[test]
    fn test_normal_of_camera_facing_quad() {
        let mut obj = billboard();
        obj.calc_normals();
        let n = obj.polygons[0].normal;
        // Flat quad in the xy plane: the normal is pure z
        assert_eq!(n.x, 0);
        assert_eq!(n.y, 0);
        assert_eq!(n.z.abs(), ONE);
    }
}
